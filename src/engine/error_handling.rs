use std::fmt;

use serde::Deserialize;
use tracing::error;

use super::counters::StageCounters;
use super::error::StageError;
use crate::domain::{FieldMeta, Row, Schema, Value, ValueType};

/// A recoverable failure scoped to one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub code: String,
    pub description: String,
    /// Names of the offending fields, if known
    pub fields: Vec<String>,
}

impl RecordError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

/// Error redirection settings of a stage with an error hop.
///
/// The error-field names pick the columns appended to rejected rows; an
/// empty name leaves that column out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorHandling {
    pub enabled: bool,
    /// Fatal once more than this many rows are rejected (0 = unlimited)
    pub max_errors: u64,
    /// Fatal once the rejected percentage exceeds this (0 = unlimited)
    pub max_percent_errors: u64,
    /// Rows that must be read before the percentage is checked
    pub min_rows_for_percent: u64,
    pub count_field: String,
    pub descriptions_field: String,
    pub fields_field: String,
    pub codes_field: String,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            enabled: true,
            max_errors: 0,
            max_percent_errors: 0,
            min_rows_for_percent: 0,
            count_field: "error_count".to_string(),
            descriptions_field: "error_description".to_string(),
            fields_field: "error_fields".to_string(),
            codes_field: "error_code".to_string(),
        }
    }
}

impl ErrorHandling {
    fn error_columns(&self) -> [(&str, ValueType); 4] {
        [
            (self.count_field.as_str(), ValueType::Integer),
            (self.descriptions_field.as_str(), ValueType::String),
            (self.fields_field.as_str(), ValueType::String),
            (self.codes_field.as_str(), ValueType::String),
        ]
    }

    /// Schema of rows on the error hop: the input schema plus the error columns
    pub fn error_schema(&self, input: &Schema) -> Schema {
        let mut extra = Schema::new();
        for (name, value_type) in self.error_columns() {
            if !name.is_empty() && extra.index_of(name).is_none() {
                // Names were just checked, so push cannot fail here.
                let _ = extra.push(FieldMeta::new(name, value_type));
            }
        }
        input.merge(&extra)
    }

    /// Copy of `row` with the error columns appended
    pub fn error_row(&self, row: &Row, err: &RecordError) -> Row {
        let values = [
            Value::Integer(1),
            Value::String(err.description.clone()),
            Value::String(err.fields.join(",")),
            Value::String(err.code.clone()),
        ];
        let mut seen: Vec<&str> = Vec::new();
        let extra = self
            .error_columns()
            .into_iter()
            .zip(values)
            .filter(|((name, _), _)| {
                if name.is_empty() || seen.contains(name) {
                    return false;
                }
                seen.push(*name);
                true
            })
            .map(|(_, value)| value)
            .collect::<Vec<_>>();
        row.extended(extra)
    }

    /// Fail once the rejected rows exceed the configured absolute or
    /// percentage limits.
    pub fn verify_rejection_rates(&self, counters: &StageCounters) -> Result<(), StageError> {
        let rejected = counters.lines_rejected;

        if self.max_errors > 0 && rejected > self.max_errors {
            error!(rejected, max = self.max_errors, "Too many rejected rows");
            return Err(StageError::TooManyRejected {
                rejected,
                limit: format!("{} rows", self.max_errors),
            });
        }

        if self.max_percent_errors > 0
            && rejected > 0
            && (self.min_rows_for_percent == 0 || counters.lines_read >= self.min_rows_for_percent)
        {
            let pct = match counters.lines_read {
                0 => 100,
                read => 100 * rejected / read,
            };
            if pct > self.max_percent_errors {
                error!(
                    pct,
                    rejected,
                    read = counters.lines_read,
                    "Maximum rejected percentage reached"
                );
                return Err(StageError::TooManyRejected {
                    rejected,
                    limit: format!("{}%", self.max_percent_errors),
                });
            }
        }

        Ok(())
    }
}
