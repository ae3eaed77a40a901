use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::engine::{ProcessOutcome, Stage, StageContext, StageCounters, StageError, StageState};

/// Final report of one stage copy
#[derive(Debug, Clone)]
pub struct StageResult {
    pub name: String,
    pub copy: usize,
    pub kind: String,
    pub state: StageState,
    pub disposed: bool,
    pub counters: StageCounters,
    /// The fatal error that ended the copy, if any
    pub error: Option<String>,
    pub dispose_error: Option<String>,
}

impl StageResult {
    pub(crate) fn new(ctx: &StageContext, kind: &str, state: StageState) -> Self {
        Self {
            name: ctx.name().to_string(),
            copy: ctx.copy(),
            kind: kind.to_string(),
            state,
            disposed: false,
            counters: *ctx.counters(),
            error: None,
            dispose_error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.counters.errors == 0
    }
}

/// Run one stage copy from `init` to `dispose` on the current task.
///
/// A failing `init` ends the copy in `Errored` without calling `dispose`.
pub async fn run_stage(mut stage: Box<dyn Stage>, mut ctx: StageContext) -> StageResult {
    match init_stage(stage.as_mut(), &mut ctx).await {
        Ok(()) => run_initialized(stage, ctx).await,
        Err(e) => init_failure(stage.kind(), &mut ctx, e),
    }
}

/// `init` with panics turned into errors
pub(crate) async fn init_stage(
    stage: &mut dyn Stage,
    ctx: &mut StageContext,
) -> Result<(), StageError> {
    match AssertUnwindSafe(stage.init(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(StageError::Panicked(panic_message(payload))),
    }
}

pub(crate) fn init_failure(kind: &str, ctx: &mut StageContext, e: StageError) -> StageResult {
    error!(stage = %ctx.name(), copy = ctx.copy(), "Init failed: {}", e);
    ctx.counters_mut().errors += 1;
    let mut result = StageResult::new(ctx, kind, StageState::Errored);
    result.error = Some(e.to_string());
    result
}

/// Worker loop for a copy whose `init` succeeded
pub(crate) async fn run_initialized(mut stage: Box<dyn Stage>, mut ctx: StageContext) -> StageResult {
    let kind = stage.kind();
    debug!(stage = %ctx.name(), copy = ctx.copy(), kind, "Stage running");

    let mut fatal: Option<StageError> = None;
    loop {
        if ctx.is_stopped() {
            debug!(stage = %ctx.name(), copy = ctx.copy(), "Stop flag observed");
            break;
        }

        let outcome = match AssertUnwindSafe(stage.process_one(&mut ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(StageError::Panicked(panic_message(payload))),
        };

        let step = match outcome {
            Ok(ProcessOutcome::Continue) => Ok(true),
            Ok(ProcessOutcome::Finished) => Ok(false),
            Ok(ProcessOutcome::Rejected(row, err)) => ctx.reject(row, err).await.map(|()| true),
            Err(e) => Err(e),
        };

        match step {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!(stage = %ctx.name(), copy = ctx.copy(), "Fatal error: {}", e);
                ctx.counters_mut().errors += 1;
                ctx.stop_all();
                fatal = Some(e);
                break;
            }
        }
    }

    ctx.set_output_done();

    let state = if fatal.is_some() {
        StageState::Errored
    } else {
        StageState::Done
    };

    let dispose_error = match AssertUnwindSafe(stage.dispose(&mut ctx)).catch_unwind().await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(StageError::Panicked(panic_message(payload)).to_string()),
    };
    if let Some(message) = &dispose_error {
        error!(stage = %ctx.name(), copy = ctx.copy(), "Dispose failed: {}", message);
        ctx.counters_mut().errors += 1;
    }

    let counters = ctx.counters();
    info!(
        stage = %ctx.name(),
        copy = ctx.copy(),
        read = counters.lines_read,
        written = counters.lines_written,
        rejected = counters.lines_rejected,
        errors = counters.errors,
        "Stage finished"
    );

    let mut result = StageResult::new(&ctx, kind, state);
    result.disposed = true;
    result.error = fatal.map(|e| e.to_string());
    result.dispose_error = dispose_error;
    result
}

/// Dispose a copy that was initialised but never ran
pub(crate) async fn dispose_only(mut stage: Box<dyn Stage>, mut ctx: StageContext) -> StageResult {
    ctx.set_output_done();
    let kind = stage.kind();
    let mut result = match AssertUnwindSafe(stage.dispose(&mut ctx)).catch_unwind().await {
        Ok(Ok(())) => StageResult::new(&ctx, kind, StageState::Initialized),
        Ok(Err(e)) => {
            ctx.counters_mut().errors += 1;
            let mut result = StageResult::new(&ctx, kind, StageState::Initialized);
            result.dispose_error = Some(e.to_string());
            result
        }
        Err(payload) => {
            ctx.counters_mut().errors += 1;
            let mut result = StageResult::new(&ctx, kind, StageState::Initialized);
            result.dispose_error = Some(panic_message(payload));
            result
        }
    };
    result.disposed = true;
    result
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
