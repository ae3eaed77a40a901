use std::future::Future;
use std::io;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::error::AppError;

const USAGE: &str = "Usage: rowflow <pipeline.toml> [--shared <objects.toml>] [--capacity <n>]";

/// Command-line arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub pipeline: PathBuf,
    /// Shared objects document consulted after the pipeline's own objects
    pub shared: Option<PathBuf>,
    /// Overrides the pipeline's channel capacity
    pub capacity: Option<usize>,
}

impl CliArgs {
    /// Parse `args` including the program name
    pub fn parse(args: Vec<String>) -> Result<Self, AppError> {
        let mut pipeline = None;
        let mut shared = None;
        let mut capacity = None;

        let mut iter = args.into_iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--shared" => {
                    let value = iter.next().ok_or_else(|| missing_value("--shared"))?;
                    shared = Some(PathBuf::from(value));
                }
                "--capacity" => {
                    let value = iter.next().ok_or_else(|| missing_value("--capacity"))?;
                    let n = value.parse::<usize>().map_err(|_| {
                        AppError::InvalidArguments(format!("invalid capacity '{}'", value))
                    })?;
                    if n == 0 {
                        return Err(AppError::InvalidArguments(
                            "capacity must be at least 1".to_string(),
                        ));
                    }
                    capacity = Some(n);
                }
                flag if flag.starts_with("--") => {
                    return Err(AppError::InvalidArguments(format!(
                        "unknown option '{}'\n{}",
                        flag, USAGE
                    )));
                }
                _ if pipeline.is_none() => pipeline = Some(PathBuf::from(arg)),
                _ => return Err(AppError::InvalidArguments(USAGE.to_string())),
            }
        }

        Ok(Self {
            pipeline: pipeline.ok_or_else(|| AppError::InvalidArguments(USAGE.to_string()))?,
            shared,
            capacity,
        })
    }
}

fn missing_value(flag: &str) -> AppError {
    AppError::InvalidArguments(format!("{} needs a value\n{}", flag, USAGE))
}

/// Reusable CLI application runner that handles:
/// - Signal handling (SIGINT, SIGTERM, SIGHUP) as a stop request
/// - Exit codes (0 = success, 1 = failure, 130 = SIGINT, 143 = SIGTERM, 129 = SIGHUP)
/// - Graceful shutdown: the main future is awaited after a signal so
///   stages can dispose
pub struct CliApp {
    name: String,
}

impl CliApp {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the application and exit the process.
    ///
    /// `main_fn` gets a token cancelled on the first signal and reports
    /// whether the run succeeded.
    pub async fn run<F, Fut>(self, main_fn: F) -> !
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<bool, AppError>>,
    {
        let stop = CancellationToken::new();
        let main = main_fn(stop.clone());
        tokio::pin!(main);

        let code = tokio::select! {
            result = &mut main => exit_code(result),
            signal = wait_for_signal() => match signal {
                Ok(signal_code) => {
                    info!(app = %self.name, "Signal received, stopping");
                    stop.cancel();
                    stopped_exit_code(&self.name, main.await, signal_code)
                }
                Err(e) => {
                    error!(app = %self.name, "Cannot install signal handlers: {}", e);
                    exit_code(main.await)
                }
            },
        };
        std::process::exit(code);
    }
}

fn exit_code(result: Result<bool, AppError>) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Exit code after a signal: the signal's code, whatever the stopped run returned
fn stopped_exit_code(app: &str, result: Result<bool, AppError>, signal_code: i32) -> i32 {
    if let Err(e) = result {
        error!(app = %app, "Run failed while stopping: {}", e);
    }
    signal_code
}

/// Wait for any Unix signal (SIGINT, SIGTERM, SIGHUP) or Ctrl+C.
/// Returns the exit code to use.
async fn wait_for_signal() -> io::Result<i32> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        Ok(tokio::select! {
            _ = sigterm.recv() => 143, // 128 + 15
            _ = sigint.recv() => 130,  // 128 + 2
            _ = sighup.recv() => 129,  // 128 + 1
        })
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(130)
    }
}
