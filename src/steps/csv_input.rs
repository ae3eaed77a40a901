use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use csv_async::ByteRecord;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info};

use super::location::resolve_path;
use crate::domain::{FieldMeta, Row, Schema, StorageType, Value, ValueType};
use crate::engine::{ProcessOutcome, RecordError, Stage, StageContext, StageError};
use crate::io::{CsvFormat, CsvRecordReader, IoError, record_to_row};
use crate::storage::SharedObjects;
use crate::streaming::StageSpec;

fn default_lazy() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvInputConfig {
    pub file: String,
    /// Name of a `file-location` shared object holding the directory
    #[serde(default)]
    pub location: Option<String>,
    pub fields: Vec<FieldMeta>,
    /// Keep raw bytes and convert on first use
    #[serde(default = "default_lazy")]
    pub lazy_conversion: bool,
    #[serde(flatten)]
    pub format: CsvFormat,
}

/// Reads a delimited file into rows
pub struct CsvInput {
    path: PathBuf,
    format: CsvFormat,
    schema: Arc<Schema>,
    /// Every field as text, for rows that do not fit the schema
    rejection_schema: Arc<Schema>,
    reader: Option<CsvRecordReader>,
}

impl CsvInput {
    pub fn new(config: CsvInputConfig, path: PathBuf) -> Result<Self, StageError> {
        let storage = if config.lazy_conversion {
            StorageType::Lazy
        } else {
            StorageType::Normal
        };
        let schema = Schema::from_fields(
            config
                .fields
                .iter()
                .cloned()
                .map(|f| f.with_storage(storage)),
        )?;
        let rejection_schema = Schema::from_fields(
            config
                .fields
                .iter()
                .map(|f| FieldMeta::new(f.name.clone(), ValueType::String)),
        )?;
        // validated here so a bad delimiter is a configuration error
        config.format.delimiter_byte()?;

        Ok(Self {
            path,
            format: config.format,
            schema: Arc::new(schema),
            rejection_schema: Arc::new(rejection_schema),
            reader: None,
        })
    }

    pub fn create(
        spec: &StageSpec,
        shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, StageError> {
        let config: CsvInputConfig = spec.config_as()?;
        let path = resolve_path(&config.file, config.location.as_deref(), shared)?;
        Ok(Box::new(Self::new(config, path)?))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// The raw fields as text, cut or padded to the schema width
    fn raw_row(&self, record: &ByteRecord) -> Row {
        let width = self.rejection_schema.len();
        let mut values: Vec<Value> = record
            .iter()
            .take(width)
            .map(|raw| Value::String(String::from_utf8_lossy(raw).into_owned()))
            .collect();
        values.resize(width, Value::Null);
        Row::new(values)
    }
}

#[async_trait]
impl Stage for CsvInput {
    fn kind(&self) -> &'static str {
        "csv-input"
    }

    async fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let reader = CsvRecordReader::from_file(&self.path, &self.format).await?;
        self.reader = Some(reader);

        let schema = Arc::new(self.schema.with_origin(ctx.name()));
        ctx.declare_output_schema(&schema)?;
        ctx.declare_rejection_schema(self.rejection_schema.clone());
        self.schema = schema;
        info!(stage = %ctx.name(), path = %self.path.display(), "Reading file");
        Ok(())
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(StageError::Init("file not opened".to_string()));
        };
        let record = match reader.next().await {
            Some(record) => record?,
            None => {
                debug!(stage = %ctx.name(), lines = ctx.counters().lines_input, "End of file");
                return Ok(ProcessOutcome::Finished);
            }
        };
        ctx.counters_mut().lines_input += 1;

        match record_to_row(&record, &self.schema) {
            Ok(row) => {
                ctx.put_row(&self.schema, row).await?;
                Ok(ProcessOutcome::Continue)
            }
            Err(IoError::FieldCount {
                line,
                expected,
                actual,
            }) => Ok(ProcessOutcome::Rejected(
                self.raw_row(&record),
                RecordError::new(
                    "CSV001",
                    format!("line {}: expected {} fields, found {}", line, expected, actual),
                ),
            )),
            Err(IoError::Value(e)) => Ok(ProcessOutcome::Rejected(
                self.raw_row(&record),
                RecordError::new("CSV002", e.to_string()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn dispose(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        self.reader = None;
        Ok(())
    }
}
