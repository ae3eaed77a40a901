use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::error::PipelineError;
use super::registry::StageRegistry;
use super::spec::PipelineSpec;
use super::wiring::plan_channels;
use super::worker::{StageResult, dispose_only, init_failure, init_stage, run_initialized};
use crate::channel::row_channel;
use crate::engine::{Stage, StageContext, StageCounters, StageState};
use crate::storage::{LayeredSharedObjects, MemorySharedObjects, SharedObjects};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every stage reached the end of its input
    Finished,
    /// Stopped on request, without errors
    Stopped,
    /// At least one stage reported an error
    Failed,
    /// A stage failed `init`; no row was processed
    InitFailed,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub name: String,
    pub status: RunStatus,
    pub stages: Vec<StageResult>,
}

impl PipelineResult {
    pub fn total_errors(&self) -> u64 {
        self.stages.iter().map(|s| s.counters.errors).sum()
    }

    /// True when no stage reported an error
    pub fn succeeded(&self) -> bool {
        self.total_errors() == 0
    }

    /// First copy of the named stage
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Counters of the named stage summed over its copies
    pub fn stage_totals(&self, name: &str) -> StageCounters {
        let mut total = StageCounters::default();
        for result in self.stages.iter().filter(|s| s.name == name) {
            total += &result.counters;
        }
        total
    }

    /// Counters summed over every stage copy
    pub fn totals(&self) -> StageCounters {
        let mut total = StageCounters::default();
        for result in &self.stages {
            total += &result.counters;
        }
        total
    }
}

struct StageCopy {
    stage: Box<dyn Stage>,
    ctx: StageContext,
}

/// A wired pipeline whose stages have not been initialised yet
pub struct Pipeline {
    name: String,
    cancel: CancellationToken,
    copies: Vec<StageCopy>,
}

impl Pipeline {
    /// Validate the graph, build every stage copy and create the channels.
    ///
    /// Shared objects declared in the pipeline document shadow the ones in
    /// `shared`.
    pub fn prepare(
        spec: &PipelineSpec,
        registry: &StageRegistry,
        shared: Arc<dyn SharedObjects>,
    ) -> Result<Self, PipelineError> {
        let plans = plan_channels(spec)?;
        let shared = LayeredSharedObjects::new()
            .with_layer(Arc::new(MemorySharedObjects::from_objects(spec.shared.clone())))
            .with_layer(shared);
        let cancel = CancellationToken::new();

        let mut stages: Vec<Vec<StageCopy>> = Vec::with_capacity(spec.stages.len());
        for stage_spec in &spec.stages {
            let mut copies = Vec::with_capacity(stage_spec.copies);
            for copy in 0..stage_spec.copies {
                let stage = registry.create(stage_spec, &shared)?;
                let ctx = StageContext::new(stage_spec.name.clone(), copy, cancel.clone())
                    .with_distribution(stage_spec.distribution)
                    .with_error_handling(stage_spec.error_handling.clone());
                copies.push(StageCopy { stage, ctx });
            }
            stages.push(copies);
        }

        let capacity = spec.channel_capacity.max(1);
        for plan in &plans {
            let (sender, receiver) = row_channel(capacity, cancel.clone());
            let from = &spec.stages[plan.from].name;
            let to = &spec.stages[plan.to].name;

            let producer = &mut stages[plan.from][plan.from_copy].ctx;
            if plan.error {
                producer.set_error_output(sender);
            } else {
                producer.add_output(to.clone(), sender);
            }
            stages[plan.to][plan.to_copy].ctx.add_input(from.clone(), receiver);
        }

        Ok(Self {
            name: spec.name.clone(),
            cancel,
            copies: stages.into_iter().flatten().collect(),
        })
    }

    /// Prepare, start and wait in one call
    pub async fn run(
        spec: &PipelineSpec,
        registry: &StageRegistry,
        shared: Arc<dyn SharedObjects>,
    ) -> Result<PipelineResult, PipelineError> {
        let pipeline = Self::prepare(spec, registry, shared)?;
        Ok(pipeline.start().await.wait().await)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stage copies, one worker each
    pub fn copy_count(&self) -> usize {
        self.copies.len()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Initialise every copy, then spawn one worker per copy.
    ///
    /// When any `init` fails no worker runs: the copies that did initialise
    /// are disposed and the returned handle resolves to
    /// [`RunStatus::InitFailed`].
    pub async fn start(self) -> RunningPipeline {
        let Pipeline {
            name,
            cancel,
            copies,
        } = self;
        let started = Instant::now();
        info!(pipeline = %name, copies = copies.len(), "Starting pipeline");

        let initialised = join_all(copies.into_iter().map(|mut copy| async move {
            let result = init_stage(copy.stage.as_mut(), &mut copy.ctx).await;
            (copy, result)
        }))
        .await;

        if initialised.iter().any(|(_, result)| result.is_err()) {
            cancel.cancel();
            let mut stages = Vec::with_capacity(initialised.len());
            for (mut copy, result) in initialised {
                match result {
                    Ok(()) => stages.push(dispose_only(copy.stage, copy.ctx).await),
                    Err(e) => stages.push(init_failure(copy.stage.kind(), &mut copy.ctx, e)),
                }
            }
            error!(pipeline = %name, "Pipeline initialisation failed");
            return RunningPipeline {
                name,
                cancel,
                started,
                workers: Workers::InitFailed(stages),
            };
        }

        let handles = initialised
            .into_iter()
            .map(|(copy, _)| {
                let identity = CopyIdentity {
                    name: copy.ctx.name().to_string(),
                    copy: copy.ctx.copy(),
                    kind: copy.stage.kind(),
                };
                (identity, tokio::spawn(run_initialized(copy.stage, copy.ctx)))
            })
            .collect();

        RunningPipeline {
            name,
            cancel,
            started,
            workers: Workers::Running(handles),
        }
    }
}

struct CopyIdentity {
    name: String,
    copy: usize,
    kind: &'static str,
}

enum Workers {
    Running(Vec<(CopyIdentity, JoinHandle<StageResult>)>),
    InitFailed(Vec<StageResult>),
}

/// Handle on a started pipeline
pub struct RunningPipeline {
    name: String,
    cancel: CancellationToken,
    started: Instant,
    workers: Workers,
}

impl RunningPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask every stage to stop after its current row
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!(pipeline = %self.name, "Stop requested");
            self.cancel.cancel();
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for every worker and collect their results
    pub async fn wait(self) -> PipelineResult {
        let handles = match self.workers {
            Workers::InitFailed(stages) => {
                return PipelineResult {
                    name: self.name,
                    status: RunStatus::InitFailed,
                    stages,
                };
            }
            Workers::Running(handles) => handles,
        };

        let mut stages = Vec::with_capacity(handles.len());
        for (identity, handle) in handles {
            match handle.await {
                Ok(result) => stages.push(result),
                Err(e) => {
                    error!(stage = %identity.name, copy = identity.copy, "Worker lost: {}", e);
                    self.cancel.cancel();
                    stages.push(StageResult {
                        name: identity.name,
                        copy: identity.copy,
                        kind: identity.kind.to_string(),
                        state: StageState::Errored,
                        disposed: false,
                        counters: StageCounters {
                            errors: 1,
                            ..Default::default()
                        },
                        error: Some(e.to_string()),
                        dispose_error: None,
                    });
                }
            }
        }

        let mut result = PipelineResult {
            name: self.name,
            status: RunStatus::Finished,
            stages,
        };
        result.status = if !result.succeeded() {
            RunStatus::Failed
        } else if self.cancel.is_cancelled() {
            RunStatus::Stopped
        } else {
            RunStatus::Finished
        };

        let totals = result.totals();
        info!(
            pipeline = %result.name,
            status = ?result.status,
            read = totals.lines_read,
            written = totals.lines_written,
            rejected = totals.lines_rejected,
            errors = totals.errors,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        result
    }
}
