use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{FieldMeta, Row, Schema, StorageType, Value};
use crate::engine::{ProcessOutcome, Stage, StageContext, StageError};
use crate::storage::SharedObjects;
use crate::streaming::StageSpec;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataGridConfig {
    pub fields: Vec<FieldMeta>,
    /// Rows as text, one entry per field; an empty entry is null
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// Emits a fixed set of rows held in its configuration
pub struct DataGrid {
    schema: Arc<Schema>,
    rows: std::vec::IntoIter<Row>,
}

impl DataGrid {
    pub fn new(config: DataGridConfig) -> Result<Self, StageError> {
        let schema = Schema::from_fields(
            config
                .fields
                .into_iter()
                .map(|f| f.with_storage(StorageType::Lazy)),
        )?;

        let mut rows = Vec::with_capacity(config.rows.len());
        for (line, texts) in config.rows.iter().enumerate() {
            if texts.len() != schema.len() {
                return Err(StageError::Config(format!(
                    "row {} has {} values, expected {}",
                    line + 1,
                    texts.len(),
                    schema.len()
                )));
            }
            let mut values = Vec::with_capacity(texts.len());
            for (field, text) in schema.fields().iter().zip(texts) {
                if text.is_empty() {
                    values.push(Value::Null);
                    continue;
                }
                // fail at build time rather than on first use downstream
                field
                    .value_type
                    .convert_raw(text.as_bytes(), field.format.as_deref())?;
                values.push(Value::lazy(text));
            }
            rows.push(Row::new(values));
        }

        Ok(Self {
            schema: Arc::new(schema),
            rows: rows.into_iter(),
        })
    }

    pub fn create(
        spec: &StageSpec,
        _shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, StageError> {
        let config: DataGridConfig = spec.config_as()?;
        Ok(Box::new(Self::new(config)?))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[async_trait]
impl Stage for DataGrid {
    fn kind(&self) -> &'static str {
        "data-grid"
    }

    async fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let schema = Arc::new(self.schema.with_origin(ctx.name()));
        ctx.declare_output_schema(&schema)?;
        self.schema = schema;
        Ok(())
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        match self.rows.next() {
            Some(row) => {
                ctx.put_row(&self.schema, row).await?;
                Ok(ProcessOutcome::Continue)
            }
            None => Ok(ProcessOutcome::Finished),
        }
    }
}
