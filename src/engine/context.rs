use std::sync::Arc;

use futures::future::select_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::counters::StageCounters;
use super::error::StageError;
use super::error_handling::{ErrorHandling, RecordError};
use crate::channel::{ChannelError, RowReceiver, RowSender, TryGet};
use crate::domain::{Row, Schema};

/// How rows are spread over several output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    /// Each row goes to the next channel in turn
    #[default]
    RoundRobin,
    /// Each row goes to every channel
    Copy,
}

struct InputChannel {
    from: String,
    receiver: RowReceiver,
}

impl InputChannel {
    fn is_live_from(&self, upstream: Option<&str>) -> bool {
        upstream.is_none_or(|u| self.from == u) && !self.receiver.is_drained()
    }
}

/// One output channel and the stage it feeds
pub struct OutputTarget {
    pub target: String,
    pub sender: RowSender,
}

/// Per-copy runtime handle given to every [`Stage`](super::Stage) call.
///
/// Owned by the copy's worker: it holds the copy's channels, counters and a
/// handle on the pipeline stop flag.
pub struct StageContext {
    name: String,
    copy: usize,
    cancel: CancellationToken,
    counters: StageCounters,
    inputs: Vec<InputChannel>,
    next_input: usize,
    outputs: Vec<OutputTarget>,
    next_output: usize,
    outputs_done: bool,
    distribution: Distribution,
    error_output: Option<RowSender>,
    error_handling: Option<ErrorHandling>,
    error_schema: Option<Arc<Schema>>,
    rejection_schema: Option<Arc<Schema>>,
}

impl StageContext {
    pub fn new(name: impl Into<String>, copy: usize, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            copy,
            cancel,
            counters: StageCounters::default(),
            inputs: Vec::new(),
            next_input: 0,
            outputs: Vec::new(),
            next_output: 0,
            outputs_done: false,
            distribution: Distribution::RoundRobin,
            error_output: None,
            error_handling: None,
            error_schema: None,
            rejection_schema: None,
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_error_handling(mut self, handling: Option<ErrorHandling>) -> Self {
        self.error_handling = handling;
        self
    }

    pub fn add_input(&mut self, from: impl Into<String>, receiver: RowReceiver) {
        self.inputs.push(InputChannel {
            from: from.into(),
            receiver,
        });
    }

    pub fn add_output(&mut self, target: impl Into<String>, sender: RowSender) {
        self.outputs.push(OutputTarget {
            target: target.into(),
            sender,
        });
    }

    pub fn set_error_output(&mut self, sender: RowSender) {
        self.error_output = Some(sender);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn copy(&self) -> usize {
        self.copy
    }

    pub fn counters(&self) -> &StageCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut StageCounters {
        &mut self.counters
    }

    pub fn errors(&self) -> u64 {
        self.counters.errors
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Raise the pipeline-wide stop flag
    pub fn stop_all(&self) {
        if !self.cancel.is_cancelled() {
            info!(stage = %self.name, copy = self.copy, "Stopping all stages");
            self.cancel.cancel();
        }
    }

    /// Distinct upstream stage names, in wiring order
    pub fn input_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for input in &self.inputs {
            if !names.contains(&input.from.as_str()) {
                names.push(&input.from);
            }
        }
        names
    }

    pub fn has_input(&self, upstream: &str) -> bool {
        self.inputs.iter().any(|i| i.from == upstream)
    }

    pub fn output_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for output in &self.outputs {
            if !names.contains(&output.target.as_str()) {
                names.push(&output.target);
            }
        }
        names
    }

    /// Schema of the rows coming from `upstream`, once known
    pub fn input_schema(&self, upstream: &str) -> Option<Arc<Schema>> {
        self.inputs
            .iter()
            .filter(|i| i.from == upstream)
            .find_map(|i| i.receiver.schema())
    }

    /// Schema of the first input that has one
    pub fn any_input_schema(&self) -> Option<Arc<Schema>> {
        self.inputs.iter().find_map(|i| i.receiver.schema())
    }

    /// Next row from any input, taking the inputs in turn.
    ///
    /// Returns `None` once every input is drained or the pipeline stops.
    pub async fn get_row(&mut self) -> Option<Row> {
        self.next_row(None).await
    }

    /// Next row from the inputs fed by `upstream` only
    pub async fn get_row_from(&mut self, upstream: &str) -> Option<Row> {
        self.next_row(Some(upstream)).await
    }

    async fn next_row(&mut self, upstream: Option<&str>) -> Option<Row> {
        loop {
            if self.is_stopped() {
                return None;
            }

            let n = self.inputs.len();
            for offset in 0..n {
                let i = (self.next_input + offset) % n;
                let input = &mut self.inputs[i];
                if !input.is_live_from(upstream) {
                    continue;
                }
                match input.receiver.try_get() {
                    TryGet::Row(row) => {
                        self.next_input = (i + 1) % n;
                        self.counters.lines_read += 1;
                        trace!(stage = %self.name, from = %input.from, "Row read");
                        return Some(row);
                    }
                    TryGet::Empty => {}
                    TryGet::Finished => {
                        debug!(stage = %self.name, copy = self.copy, from = %input.from, "Input drained");
                    }
                }
            }

            // Nothing buffered anywhere: wait for the first input to produce
            let pending: Vec<_> = self
                .inputs
                .iter_mut()
                .filter(|input| input.is_live_from(upstream))
                .map(|input| Box::pin(input.receiver.get()))
                .collect();
            if pending.is_empty() {
                return None;
            }
            let (next, _, _) = select_all(pending).await;
            if let Some(row) = next {
                self.counters.lines_read += 1;
                return Some(row);
            }
        }
    }

    /// Publish the output schema before any row flows
    pub fn declare_output_schema(&self, schema: &Arc<Schema>) -> Result<(), StageError> {
        for output in &self.outputs {
            output.sender.declare_schema(schema)?;
        }
        Ok(())
    }

    /// Schema used for rows rejected through [`ProcessOutcome::Rejected`](super::ProcessOutcome)
    pub fn declare_rejection_schema(&mut self, schema: Arc<Schema>) {
        self.rejection_schema = Some(schema);
    }

    /// Send a row downstream following the distribution policy.
    ///
    /// A terminal stage without outputs still counts the row as written.
    pub async fn put_row(&mut self, schema: &Arc<Schema>, row: Row) -> Result<(), StageError> {
        if self.outputs_done {
            return Ok(());
        }
        if self.outputs.is_empty() {
            self.counters.lines_written += 1;
            return Ok(());
        }

        match self.distribution {
            Distribution::RoundRobin => {
                let index = self.next_output % self.outputs.len();
                self.next_output = (index + 1) % self.outputs.len();
                self.send_to(index, schema, row).await
            }
            Distribution::Copy => {
                let last = self.outputs.len() - 1;
                for index in 0..last {
                    self.send_to(index, schema, row.clone()).await?;
                }
                self.send_to(last, schema, row).await
            }
        }
    }

    /// Send a row to one named downstream stage, round-robin over its copies
    pub async fn put_row_to(
        &mut self,
        target: &str,
        schema: &Arc<Schema>,
        row: Row,
    ) -> Result<(), StageError> {
        let candidates: Vec<usize> = self
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.target == target)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return Err(StageError::UnknownTarget(target.to_string()));
        }
        let index = candidates[self.next_output % candidates.len()];
        self.next_output = self.next_output.wrapping_add(1);
        self.send_to(index, schema, row).await
    }

    async fn send_to(
        &mut self,
        index: usize,
        schema: &Arc<Schema>,
        row: Row,
    ) -> Result<(), StageError> {
        let output = &self.outputs[index];
        output.sender.declare_schema(schema)?;
        match output.sender.put(row).await {
            Ok(()) => {
                self.counters.lines_written += 1;
                Ok(())
            }
            Err(ChannelError::Stopped) => Ok(()),
            Err(ChannelError::Disconnected) => {
                debug!(stage = %self.name, target = %output.target, "Consumer gone, row discarded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True when rejected rows can be redirected
    pub fn has_error_hop(&self) -> bool {
        self.error_output.is_some() && self.error_handling.as_ref().is_some_and(|h| h.enabled)
    }

    /// Redirect a row to the error hop with the error columns appended, then
    /// check the rejection limits.
    pub async fn put_error(
        &mut self,
        schema: &Schema,
        row: Row,
        err: RecordError,
    ) -> Result<(), StageError> {
        let (Some(handling), Some(sender)) = (
            self.error_handling.as_ref().filter(|h| h.enabled),
            self.error_output.as_ref(),
        ) else {
            return Err(StageError::UnhandledRecordError(err));
        };

        let error_schema = self
            .error_schema
            .get_or_insert_with(|| Arc::new(handling.error_schema(schema)));
        sender.declare_schema(error_schema)?;

        warn!(stage = %self.name, copy = self.copy, code = %err.code, "Row rejected: {}", err.description);
        match sender.put(handling.error_row(&row, &err)).await {
            Ok(()) | Err(ChannelError::Disconnected) => self.counters.lines_rejected += 1,
            Err(ChannelError::Stopped) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        handling.verify_rejection_rates(&self.counters)
    }

    /// Redirect a row using the declared rejection schema, or the schema of
    /// the first input when none was declared.
    pub async fn reject(&mut self, row: Row, err: RecordError) -> Result<(), StageError> {
        if !self.has_error_hop() {
            return Err(StageError::UnhandledRecordError(err));
        }
        let schema = self
            .rejection_schema
            .clone()
            .or_else(|| self.any_input_schema())
            .ok_or_else(|| StageError::UnknownSchema(self.name.clone()))?;
        self.put_error(&schema, row, err).await
    }

    /// Close every output (main and error); consumers see the end of stream
    /// once they drain what is buffered.
    pub fn set_output_done(&mut self) {
        if self.outputs_done {
            return;
        }
        self.outputs_done = true;
        for output in self.outputs.drain(..) {
            output.sender.close();
        }
        if let Some(sender) = self.error_output.take() {
            sender.close();
        }
        debug!(stage = %self.name, copy = self.copy, "Outputs closed");
    }
}
