pub mod catalog;
pub mod daemon;
pub mod error;
pub mod model;
pub mod sync;
