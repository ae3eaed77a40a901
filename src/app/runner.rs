use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cli::CliArgs;
use super::error::AppError;
use crate::storage::{MemorySharedObjects, SharedObjects};
use crate::streaming::{Pipeline, PipelineResult, PipelineSpec, StageRegistry};

/// Load the pipeline named by `args`, run it until it ends or `stop` fires,
/// and return the aggregated result.
pub async fn run_pipeline(
    args: &CliArgs,
    registry: &StageRegistry,
    stop: CancellationToken,
) -> Result<PipelineResult, AppError> {
    if !tokio::fs::try_exists(&args.pipeline).await? {
        return Err(AppError::FileNotFound(args.pipeline.display().to_string()));
    }
    let mut spec = PipelineSpec::load(&args.pipeline).await?;
    if let Some(capacity) = args.capacity {
        spec = spec.with_capacity(capacity);
    }
    let shared: Arc<dyn SharedObjects> = match &args.shared {
        Some(path) => Arc::new(MemorySharedObjects::load(path).await?),
        None => Arc::new(MemorySharedObjects::new()),
    };

    let running = Pipeline::prepare(&spec, registry, shared)?.start().await;
    let cancel = running.cancel_token().clone();
    let wait = running.wait();
    tokio::pin!(wait);

    let result = tokio::select! {
        result = &mut wait => result,
        _ = stop.cancelled() => {
            info!(pipeline = %spec.name, "Stop requested");
            cancel.cancel();
            wait.await
        }
    };
    Ok(result)
}

/// Write one line per stage copy with its state and counters
pub async fn write_summary<W>(result: &PipelineResult, mut writer: W) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(b"stage,copy,state,read,written,input,output,updated,rejected,errors\n")
        .await?;
    for stage in &result.stages {
        let c = &stage.counters;
        let line = format!(
            "{},{},{:?},{},{},{},{},{},{},{}\n",
            stage.name,
            stage.copy,
            stage.state,
            c.lines_read,
            c.lines_written,
            c.lines_input,
            c.lines_output,
            c.lines_updated,
            c.lines_rejected,
            c.errors
        );
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::RunStatus;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    fn pipeline_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn args(pipeline: PathBuf) -> CliArgs {
        CliArgs {
            pipeline,
            shared: None,
            capacity: None,
        }
    }

    #[tokio::test]
    async fn runs_grid_to_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.csv");
        let file = pipeline_file(&format!(
            r#"
            name = "copy"

            [[stages]]
            name = "grid"
            kind = "data-grid"
            config.fields = [{{ name = "n", type = "integer" }}]
            config.rows = [["1"], ["2"]]

            [[stages]]
            name = "write"
            kind = "csv-output"
            config.file = "{}"

            [[hops]]
            from = "grid"
            to = "write"
            "#,
            out.display()
        ));

        let mut cli = args(file.path().to_path_buf());
        cli.capacity = Some(1);
        let result = run_pipeline(&cli, &StageRegistry::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Finished);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "n\n1\n2\n");

        let mut summary = Vec::new();
        write_summary(&result, &mut summary).await.unwrap();
        let text = String::from_utf8(summary).unwrap();
        assert!(text.starts_with("stage,copy,state"));
        assert!(text.contains("write,0,Done,2,2,0,2,0,0,0"));
    }

    #[tokio::test]
    async fn missing_pipeline_file() {
        let err = run_pipeline(
            &args(PathBuf::from("/nonexistent/pipeline.toml")),
            &StageRegistry::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn bad_pipeline_is_a_pipeline_error() {
        let file = pipeline_file("name = \"x\"\nunknown = 1\n");
        let err = run_pipeline(
            &args(file.path().to_path_buf()),
            &StageRegistry::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Pipeline(_)));
    }
}
