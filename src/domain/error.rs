use thiserror::Error;

use super::value::ValueType;

/// Domain-level errors raised by value conversion, comparison and schema building
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Cannot convert '{raw}' to {target}")]
    Conversion { raw: String, target: ValueType },

    #[error("Type mismatch on field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: ValueType,
        found: &'static str,
    },

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Row has {actual} values but schema has {expected} fields")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("Arithmetic overflow")]
    Overflow,
}
