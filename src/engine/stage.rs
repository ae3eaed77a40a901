use async_trait::async_trait;

use super::context::StageContext;
use super::error::StageError;
use super::error_handling::RecordError;
use crate::domain::Row;

/// Lifecycle of one stage copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Created,
    Initialized,
    Running,
    Done,
    Errored,
    Disposed,
}

/// Result of one `process_one` call that is not fatal
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Keep calling `process_one`
    Continue,
    /// No more output; the worker closes the outputs and disposes
    Finished,
    /// Redirect the row to the error hop and keep going
    Rejected(Row, RecordError),
}

/// A unit of transformation logic run by one worker per copy.
///
/// The worker calls `init` once, then `process_one` until it returns
/// [`ProcessOutcome::Finished`], an error, or the pipeline stops, and finally
/// `dispose` exactly once if `init` succeeded. Any `Err` is fatal for the run.
#[async_trait]
pub trait Stage: Send {
    /// Registry tag of this stage type
    fn kind(&self) -> &'static str;

    /// Validate configuration and wiring, open resources
    async fn init(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError>;

    /// Release resources. Called after outputs are closed, whatever the outcome.
    async fn dispose(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }
}
