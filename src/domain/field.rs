use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::error::ValueError;
use super::value::{DEFAULT_DATE_FORMAT, Value, ValueType};

/// How values of a field are held while they travel between stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Values are materialised typed values
    #[default]
    Normal,
    /// Values are raw source bytes converted on first use
    Lazy,
}

/// Descriptor of one field in a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub storage: StorageType,
    /// Conversion mask, currently a chrono date format
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub descending: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            length: None,
            precision: None,
            origin: None,
            storage: StorageType::Normal,
            format: None,
            case_insensitive: false,
            descending: false,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn descending(mut self, enabled: bool) -> Self {
        self.descending = enabled;
        self
    }

    /// Resolve a value to its typed form, converting lazily held raw bytes
    /// through this field's type and mask.
    pub fn resolve<'a>(&self, value: &'a Value) -> Result<&'a Value, ValueError> {
        match value {
            Value::Lazy(lazy) => lazy.materialize(self.value_type, self.format.as_deref()),
            other => Ok(other),
        }
    }

    /// Owned typed form of a value, used when a stage must emit normal storage
    pub fn to_normal(&self, value: Value) -> Result<Value, ValueError> {
        match value {
            Value::Lazy(lazy) => lazy
                .materialize(self.value_type, self.format.as_deref())
                .cloned(),
            other => Ok(other),
        }
    }

    /// Compare two values of this field
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering, ValueError> {
        self.compare_with(a, self, b)
    }

    /// Compare a value of this field with a value described by another field.
    ///
    /// Each side is resolved with its own descriptor; ordering rules
    /// (case sensitivity, direction) come from `self`.
    pub fn compare_with(
        &self,
        a: &Value,
        other: &FieldMeta,
        b: &Value,
    ) -> Result<Ordering, ValueError> {
        let a = self.resolve(a)?;
        let b = other.resolve(b)?;

        let cmp = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare_present(a, b)?,
        };

        Ok(if self.descending { cmp.reverse() } else { cmp })
    }

    fn compare_present(&self, a: &Value, b: &Value) -> Result<Ordering, ValueError> {
        match (self.value_type, a, b) {
            (ValueType::String, Value::String(x), Value::String(y)) => {
                if self.case_insensitive {
                    Ok(x.to_lowercase().cmp(&y.to_lowercase()))
                } else {
                    Ok(x.cmp(y))
                }
            }
            (ValueType::Integer, Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
            (ValueType::Number, Value::Number(x), Value::Number(y)) => Ok(x.total_cmp(y)),
            (ValueType::BigNumber, Value::BigNumber(x), Value::BigNumber(y)) => Ok(x.cmp(y)),
            (ValueType::Date, Value::Date(x), Value::Date(y)) => Ok(x.cmp(y)),
            (ValueType::Boolean, Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
            (ValueType::Binary, Value::Binary(x), Value::Binary(y)) => {
                Ok(x.len().cmp(&y.len()).then_with(|| x.cmp(y)))
            }
            (expected, x, y) => {
                let found = if x.type_name() == expected.name() {
                    y.type_name()
                } else {
                    x.type_name()
                };
                Err(ValueError::TypeMismatch {
                    field: self.name.clone(),
                    expected,
                    found,
                })
            }
        }
    }

    /// Render a value as text for output sinks. Null renders empty.
    pub fn format_value(&self, value: &Value) -> Result<String, ValueError> {
        let value = self.resolve(value)?;
        Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            Value::BigNumber(n) => n.to_string(),
            Value::Date(d) => d
                .format(self.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))
                .to_string(),
            Value::Boolean(b) => (if *b { "Y" } else { "N" }).to_string(),
            Value::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Value::Lazy(lazy) => String::from_utf8_lossy(lazy.raw()).into_owned(),
        })
    }
}
