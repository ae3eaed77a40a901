use rowflow::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    CliApp::new("rowflow").run(run_from_args).await
}

/// Run the pipeline named on the command line and print the stage summary
async fn run_from_args(stop: CancellationToken) -> Result<bool, AppError> {
    let args = CliArgs::parse(std::env::args().collect())?;
    let result = run_pipeline(&args, &StageRegistry::new(), stop).await?;

    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    write_summary(&result, stdout).await?;
    Ok(result.status == RunStatus::Finished)
}
