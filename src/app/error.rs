use std::io;
use thiserror::Error;

use crate::domain::ValueError;
use crate::engine::StageError;
use crate::io::IoError;
use crate::storage::StorageError;
use crate::streaming::PipelineError;

/// Top-level application errors unifying all layer errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV IO error: {0}")]
    CsvIo(#[from] IoError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}
