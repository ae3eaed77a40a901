use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::compat::Compat;
use tracing::{info, warn};

use super::location::resolve_path;
use crate::engine::{ProcessOutcome, Stage, StageContext, StageError};
use crate::io::{CsvFormat, CsvRowWriter, IoError};
use crate::storage::SharedObjects;
use crate::streaming::StageSpec;

#[derive(Debug, Clone, Deserialize)]
pub struct CsvOutputConfig {
    pub file: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub format: CsvFormat,
}

/// Writes incoming rows to a delimited file and passes them on.
///
/// Rows go to `<file>.partial`; `dispose` moves it into place when the run
/// had no errors and was not stopped, and deletes it otherwise.
pub struct CsvOutput {
    path: PathBuf,
    partial: PathBuf,
    format: CsvFormat,
    writer: Option<CsvRowWriter<Compat<File>>>,
    header_done: bool,
}

impl CsvOutput {
    pub fn new(config: CsvOutputConfig, path: PathBuf) -> Result<Self, StageError> {
        config.format.delimiter_byte()?;
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        Ok(Self {
            path,
            partial: PathBuf::from(partial),
            format: config.format,
            writer: None,
            header_done: false,
        })
    }

    pub fn create(
        spec: &StageSpec,
        shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, StageError> {
        let config: CsvOutputConfig = spec.config_as()?;
        let path = resolve_path(&config.file, config.location.as_deref(), shared)?;
        Ok(Box::new(Self::new(config, path)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_header(&mut self, ctx: &StageContext) -> Result<(), StageError> {
        if self.header_done || !self.format.header {
            self.header_done = true;
            return Ok(());
        }
        let (Some(writer), Some(schema)) = (self.writer.as_mut(), ctx.any_input_schema()) else {
            return Ok(());
        };
        writer.write_header(&schema).await?;
        self.header_done = true;
        Ok(())
    }
}

#[async_trait]
impl Stage for CsvOutput {
    fn kind(&self) -> &'static str {
        "csv-output"
    }

    async fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let writer = CsvRowWriter::create(&self.partial, &self.format).await?;
        self.writer = Some(writer);
        info!(stage = %ctx.name(), path = %self.partial.display(), "Writing file");
        Ok(())
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        let Some(row) = ctx.get_row().await else {
            if let Some(schema) = ctx.any_input_schema() {
                ctx.declare_output_schema(&schema)?;
            }
            return Ok(ProcessOutcome::Finished);
        };
        let schema = ctx
            .any_input_schema()
            .ok_or_else(|| StageError::UnknownSchema(ctx.name().to_string()))?;

        self.write_header(ctx).await?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write_row(&schema, &row).await?;
            ctx.counters_mut().lines_output += 1;
        }
        ctx.put_row(&schema, row).await?;
        Ok(ProcessOutcome::Continue)
    }

    async fn dispose(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        // header still goes out for an empty input
        let header = self.write_header(ctx).await;
        let Some(writer) = self.writer.take() else {
            return header;
        };
        let flushed = writer.finish().await;

        if header.is_ok() && flushed.is_ok() && ctx.errors() == 0 && !ctx.is_stopped() {
            tokio::fs::rename(&self.partial, &self.path)
                .await
                .map_err(IoError::from)?;
            info!(stage = %ctx.name(), path = %self.path.display(), rows = ctx.counters().lines_output, "File committed");
        } else {
            warn!(stage = %ctx.name(), path = %self.partial.display(), "Run not clean, removing partial file");
            tokio::fs::remove_file(&self.partial)
                .await
                .map_err(IoError::from)?;
        }
        header?;
        flushed?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::row_channel;
    use crate::domain::{FieldMeta, Row, Schema, Value, ValueType};
    use crate::engine::StageState;
    use crate::storage::MemorySharedObjects;
    use crate::streaming::run_stage;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::from_fields([
                FieldMeta::new("id", ValueType::Integer),
                FieldMeta::new("ok", ValueType::Boolean),
            ])
            .unwrap(),
        )
    }

    fn stage(path: &Path) -> Box<dyn Stage> {
        let spec = StageSpec::new("write", "csv-output")
            .with_setting("file", path.to_str().unwrap());
        CsvOutput::create(&spec, &MemorySharedObjects::new()).unwrap()
    }

    #[tokio::test]
    async fn commits_file_on_clean_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("write", 0, cancel.clone());
        let (tx, rx) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx);
        tx.declare_schema(&schema()).unwrap();
        tx.put(Row::new(vec![Value::Integer(1), Value::Boolean(true)]))
            .await
            .unwrap();
        tx.put(Row::new(vec![Value::Integer(2), Value::Null]))
            .await
            .unwrap();
        drop(tx);

        let result = run_stage(stage(&path), ctx).await;

        assert_eq!(result.state, StageState::Done);
        assert!(result.dispose_error.is_none());
        assert_eq!(result.counters.lines_output, 2);
        // terminal: rows still count as written
        assert_eq!(result.counters.lines_written, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,ok\n1,Y\n2,\n");
        assert!(!dir.path().join("out.csv.partial").exists());
    }

    #[tokio::test]
    async fn empty_input_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("write", 0, cancel.clone());
        let (tx, rx) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx);
        tx.declare_schema(&schema()).unwrap();
        drop(tx);

        run_stage(stage(&path), ctx).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,ok\n");
    }

    #[tokio::test]
    async fn empty_input_passes_schema_downstream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("write", 0, cancel.clone());
        let (tx, rx) = row_channel(4, cancel.clone());
        let (tx_out, mut rx_out) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx);
        ctx.add_output("next", tx_out);
        tx.declare_schema(&schema()).unwrap();
        drop(tx);

        let result = run_stage(stage(&path), ctx).await;

        assert_eq!(result.state, StageState::Done);
        assert_eq!(rx_out.schema().as_deref(), Some(&*schema()));
        assert_eq!(rx_out.get().await, None);
    }

    #[tokio::test]
    async fn stopped_run_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("write", 0, cancel.clone());
        let (tx, rx) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx);
        tx.declare_schema(&schema()).unwrap();
        tx.put(Row::new(vec![Value::Integer(1), Value::Boolean(false)]))
            .await
            .unwrap();

        let mut stage = stage(&path);
        stage.init(&mut ctx).await.unwrap();
        stage.process_one(&mut ctx).await.unwrap();
        assert!(dir.path().join("out.csv.partial").exists());

        cancel.cancel();
        stage.dispose(&mut ctx).await.unwrap();

        assert!(!path.exists());
        assert!(!dir.path().join("out.csv.partial").exists());
    }
}
