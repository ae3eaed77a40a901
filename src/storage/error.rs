use std::io;
use thiserror::Error;

/// Storage-level errors for the shared object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Shared object not found: {object_type}/{name}")]
    NotFound { object_type: String, name: String },

    #[error("Shared object store is read-only")]
    ReadOnly,

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid shared objects document: {0}")]
    Parse(#[from] toml::de::Error),
}
