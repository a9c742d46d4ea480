mod client;
mod keys;

pub use client::{AccessLink, FileAccess, StorageClient, StorageError};
pub use keys::{audio_file_directory, audio_file_name, backup_directory, object_key};
