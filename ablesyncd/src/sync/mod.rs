pub mod analyzer;
pub mod executor;
pub mod handlers;
pub mod paths;
pub mod pipeline;
pub mod project_folder;
pub mod queue;
pub mod reconcile;
pub mod recovery;
pub mod scheduler;
pub mod storage;
pub mod tracking;
pub mod transfer;
pub mod walker;
