use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use csv_async::{AsyncReaderBuilder, ByteRecord};
use futures::io::AsyncRead;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::compat::TokioAsyncReadCompatExt;

use super::error::IoError;
use crate::domain::{Row, Schema, StorageType, Value};

/// Delimited text layout shared by the CSV reader and writer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    pub delimiter: String,
    pub header: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            header: true,
        }
    }
}

impl CsvFormat {
    /// The delimiter as a single byte
    pub fn delimiter_byte(&self) -> Result<u8, IoError> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ if self.delimiter == "\\t" => Ok(b'\t'),
            _ => Err(IoError::InvalidDelimiter(self.delimiter.clone())),
        }
    }
}

/// Async stream of raw byte records from delimited input
pub struct CsvRecordReader {
    inner: Pin<Box<dyn Stream<Item = Result<ByteRecord, IoError>> + Send>>,
}

impl CsvRecordReader {
    /// Create a new record stream from an async reader
    pub fn new<R>(reader: R, format: &CsvFormat) -> Result<Self, IoError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let csv_reader = AsyncReaderBuilder::new()
            .delimiter(format.delimiter_byte()?)
            .has_headers(format.header)
            .flexible(true)
            .create_reader(reader);

        let stream = csv_reader
            .into_byte_records()
            .map(|result| -> Result<ByteRecord, IoError> {
                let mut record = result?;
                record.trim();
                Ok(record)
            });

        Ok(Self {
            inner: Box::pin(stream),
        })
    }

    /// Open a file and create a record stream over it
    pub async fn from_file(path: impl AsRef<Path>, format: &CsvFormat) -> Result<Self, IoError> {
        let file = File::open(path.as_ref()).await?;
        Self::new(file.compat(), format)
    }
}

impl Stream for CsvRecordReader {
    type Item = Result<ByteRecord, IoError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Turn a raw record into a row of `schema`.
///
/// Fields declared with lazy storage keep the raw bytes and convert on first
/// use; the others are converted immediately.
pub fn record_to_row(record: &ByteRecord, schema: &Schema) -> Result<Row, IoError> {
    if record.len() != schema.len() {
        return Err(IoError::FieldCount {
            line: record.position().map(|p| p.line()).unwrap_or(0),
            expected: schema.len(),
            actual: record.len(),
        });
    }

    let mut values = Vec::with_capacity(schema.len());
    for (field, raw) in schema.fields().iter().zip(record.iter()) {
        let value = match field.storage {
            StorageType::Lazy if raw.is_empty() => Value::Null,
            StorageType::Lazy => Value::lazy(raw),
            StorageType::Normal => field
                .value_type
                .convert_raw(raw, field.format.as_deref())?,
        };
        values.push(value);
    }
    Ok(Row::new(values))
}
