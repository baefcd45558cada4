//! Storage Module.
//!
//! Plain file persistence for node-local state. Writes go through a
//! temporary file and a rename so a crash never leaves a torn file behind.

pub mod raw_files;

use thiserror::Error;

/// Errors related to storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File not found.
    #[error("file not found")]
    NotFound,
    /// Path has no parent directory or file name.
    #[error("invalid path")]
    InvalidPath,
    /// File exceeds the read limit.
    #[error("file is {0} bytes, over the read limit")]
    TooLarge(u64),
    /// Stored bytes could not be decoded.
    #[error("corrupt data: {0}")]
    Corruption(String),
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(err),
        }
    }
}
