use std::path::Path;

use csv_async::{AsyncWriter, AsyncWriterBuilder};
use futures::io::AsyncWrite;
use tokio::fs::File;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::csv_reader::CsvFormat;
use super::error::IoError;
use crate::domain::{Row, Schema};

/// Writes rows as delimited text, one record per row
pub struct CsvRowWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    inner: AsyncWriter<W>,
    rows_written: u64,
}

impl CsvRowWriter<Compat<File>> {
    /// Create (or truncate) a file and write to it
    pub async fn create(path: impl AsRef<Path>, format: &CsvFormat) -> Result<Self, IoError> {
        let file = File::create(path.as_ref()).await?;
        Self::new(file.compat_write(), format)
    }
}

impl<W> CsvRowWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, format: &CsvFormat) -> Result<Self, IoError> {
        let inner = AsyncWriterBuilder::new()
            .delimiter(format.delimiter_byte()?)
            .has_headers(false)
            .create_writer(writer);
        Ok(Self {
            inner,
            rows_written: 0,
        })
    }

    /// Write the field names as a header record
    pub async fn write_header(&mut self, schema: &Schema) -> Result<(), IoError> {
        self.inner.write_record(schema.names()).await?;
        Ok(())
    }

    /// Render and write one row using each field's output format
    pub async fn write_row(&mut self, schema: &Schema, row: &Row) -> Result<(), IoError> {
        schema.check_row(row)?;
        let rendered = schema
            .fields()
            .iter()
            .zip(row.values())
            .map(|(field, value)| field.format_value(value))
            .collect::<Result<Vec<_>, _>>()?;
        self.inner.write_record(&rendered).await?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush buffered records to the underlying writer
    pub async fn finish(mut self) -> Result<u64, IoError> {
        self.inner.flush().await?;
        Ok(self.rows_written)
    }
}
