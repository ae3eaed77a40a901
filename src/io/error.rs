use std::io;
use thiserror::Error;

use crate::domain::ValueError;

/// IO-level errors for CSV reading and writing
#[derive(Error, Debug)]
pub enum IoError {
    #[error("CSV async parsing error: {0}")]
    CsvAsync(#[from] csv_async::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Line {line}: expected {expected} fields, found {actual}")]
    FieldCount {
        line: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),
}
