use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::big_number::BigNumber;
use super::error::ValueError;

/// Date mask used when a field does not carry its own conversion mask
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

const FALLBACK_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Logical type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Number,
    #[serde(alias = "bigdecimal", alias = "big-decimal")]
    BigNumber,
    Date,
    Boolean,
    Binary,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Number => "Number",
            Self::BigNumber => "BigNumber",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Binary => "Binary",
        }
    }

    /// Convert a raw source representation into a value of this type.
    ///
    /// An empty raw value is null for every type.
    pub fn convert_raw(&self, raw: &[u8], mask: Option<&str>) -> Result<Value, ValueError> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }

        let conversion_error = || ValueError::Conversion {
            raw: String::from_utf8_lossy(raw).into_owned(),
            target: *self,
        };
        let text = || non_blank(raw).map_err(|_| conversion_error());

        match self {
            Self::String => Ok(Value::String(String::from_utf8_lossy(raw).into_owned())),
            Self::Binary => Ok(Value::Binary(raw.to_vec())),
            Self::Integer => match text()? {
                Some(t) => t
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| conversion_error()),
                None => Ok(Value::Null),
            },
            Self::Number => match text()? {
                Some(t) => t
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| conversion_error()),
                None => Ok(Value::Null),
            },
            Self::BigNumber => match text()? {
                Some(t) => t.parse::<BigNumber>().map(Value::BigNumber),
                None => Ok(Value::Null),
            },
            Self::Date => match text()? {
                Some(t) => parse_date(t, mask)
                    .map(Value::Date)
                    .ok_or_else(conversion_error),
                None => Ok(Value::Null),
            },
            Self::Boolean => match text()? {
                Some(t) => match t.to_ascii_uppercase().as_str() {
                    "Y" | "YES" | "TRUE" | "1" => Ok(Value::Boolean(true)),
                    "N" | "NO" | "FALSE" | "0" => Ok(Value::Boolean(false)),
                    _ => Err(conversion_error()),
                },
                None => Ok(Value::Null),
            },
        }
    }
}

fn non_blank(raw: &[u8]) -> Result<Option<&str>, std::str::Utf8Error> {
    let text = std::str::from_utf8(raw)?.trim();
    Ok((!text.is_empty()).then_some(text))
}

fn parse_date(text: &str, mask: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(mask) = mask {
        return NaiveDateTime::parse_from_str(text, mask)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, mask)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            });
    }

    std::iter::once(DEFAULT_DATE_FORMAT)
        .chain(FALLBACK_DATETIME_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "bignumber" | "bigdecimal" | "big-decimal" => Ok(Self::BigNumber),
            "date" => Ok(Self::Date),
            "boolean" => Ok(Self::Boolean),
            "binary" => Ok(Self::Binary),
            _ => Err(ValueError::Conversion {
                raw: s.to_string(),
                target: Self::String,
            }),
        }
    }
}

/// Raw source bytes whose typed form is produced on first use and cached.
#[derive(Debug, Clone)]
pub struct LazyValue {
    raw: Arc<[u8]>,
    converted: OnceCell<Box<Value>>,
}

impl LazyValue {
    pub fn new(raw: impl Into<Arc<[u8]>>) -> Self {
        Self {
            raw: raw.into(),
            converted: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Converted value, if a previous materialisation already ran
    pub fn cached(&self) -> Option<&Value> {
        self.converted.get().map(|value| &**value)
    }

    /// Convert with the given type and mask, caching the result
    pub fn materialize(
        &self,
        value_type: ValueType,
        mask: Option<&str>,
    ) -> Result<&Value, ValueError> {
        self.converted
            .get_or_try_init(|| value_type.convert_raw(&self.raw, mask).map(Box::new))
            .map(|value| &**value)
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// A single field value.
///
/// `Null` is an ordinary logically-null value; the end of a stream is
/// signalled by the channel, never by a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    BigNumber(BigNumber),
    Date(NaiveDateTime),
    Boolean(bool),
    Binary(Vec<u8>),
    Lazy(LazyValue),
}

impl Value {
    pub fn lazy(raw: impl AsRef<[u8]>) -> Self {
        Self::Lazy(LazyValue::new(raw.as_ref()))
    }

    /// Null check that does not force lazy conversion: an empty raw value is null
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Lazy(lazy) => match lazy.cached() {
                Some(value) => value.is_null(),
                None => lazy.raw().is_empty(),
            },
            _ => false,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::String(_) => "String",
            Self::Integer(_) => "Integer",
            Self::Number(_) => "Number",
            Self::BigNumber(_) => "BigNumber",
            Self::Date(_) => "Date",
            Self::Boolean(_) => "Boolean",
            Self::Binary(_) => "Binary",
            Self::Lazy(_) => "Lazy",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<BigNumber> for Value {
    fn from(value: BigNumber) -> Self {
        Self::BigNumber(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
