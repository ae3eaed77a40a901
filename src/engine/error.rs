use thiserror::Error;

use super::error_handling::RecordError;
use crate::channel::ChannelError;
use crate::domain::ValueError;
use crate::io::IoError;
use crate::storage::StorageError;

/// Stage-level errors. Returned from a stage operation they are fatal for
/// the run.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid stage configuration: {0}")]
    Config(String),

    #[error("Initialisation failed: {0}")]
    Init(String),

    #[error("No input wired from stage '{0}'")]
    MissingInput(String),

    #[error("No output wired to stage '{0}'")]
    UnknownTarget(String),

    #[error("Schema of input '{0}' is unknown")]
    UnknownSchema(String),

    #[error("Too many rejected rows: {rejected} rejected, limit {limit}")]
    TooManyRejected { rejected: u64, limit: String },

    #[error("Record error without an error hop: {0}")]
    UnhandledRecordError(RecordError),

    #[error("Stage panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
