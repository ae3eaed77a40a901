use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::error::ChannelError;
use crate::domain::{Row, Schema};

type SchemaSlot = Arc<OnceCell<Arc<Schema>>>;

/// Create a bounded FIFO row channel between one producer and one consumer.
///
/// At most `capacity` rows are buffered; a zero capacity is raised to one.
/// Both ends watch `cancel` so a stopping pipeline never leaves a task
/// parked on a full or empty channel.
pub fn row_channel(capacity: usize, cancel: CancellationToken) -> (RowSender, RowReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let schema: SchemaSlot = Arc::new(OnceCell::new());

    let sender = RowSender {
        tx,
        schema: schema.clone(),
        cancel: cancel.clone(),
    };
    let receiver = RowReceiver {
        rx,
        schema,
        cancel,
        capacity,
        drained: false,
    };
    (sender, receiver)
}

/// Producer half. Dropping it (or calling [`RowSender::close`]) delivers the
/// end-of-stream sentinel once the buffered rows are consumed.
#[derive(Debug)]
pub struct RowSender {
    tx: mpsc::Sender<Row>,
    schema: SchemaSlot,
    cancel: CancellationToken,
}

impl RowSender {
    /// Fix the schema of the rows on this channel.
    ///
    /// Re-declaring an equal schema is a no-op; a different one is refused.
    pub fn declare_schema(&self, schema: &Arc<Schema>) -> Result<(), ChannelError> {
        let fixed = self.schema.get_or_init(|| schema.clone());
        if Arc::ptr_eq(fixed, schema) || **fixed == **schema {
            Ok(())
        } else {
            Err(ChannelError::SchemaConflict {
                fixed: fixed.len(),
                offered: schema.len(),
            })
        }
    }

    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.schema.get().cloned()
    }

    /// Send one row, waiting while the channel is full.
    ///
    /// Returns [`ChannelError::Stopped`] as soon as the pipeline stop flag is
    /// raised and [`ChannelError::Disconnected`] when the consumer went away.
    pub async fn put(&self, row: Row) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Stopped);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChannelError::Stopped),
            sent = self.tx.send(row) => sent.map_err(|_| ChannelError::Disconnected),
        }
    }

    /// Rows currently buffered
    pub fn buffered(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// True once the consumer has dropped its receiver
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn close(self) {
        trace!("Channel closed by producer");
    }
}

/// Result of a non-blocking read
#[derive(Debug, PartialEq)]
pub enum TryGet {
    Row(Row),
    /// Nothing buffered but the producer is still open
    Empty,
    /// Closed and drained
    Finished,
}

/// Consumer half
#[derive(Debug)]
pub struct RowReceiver {
    rx: mpsc::Receiver<Row>,
    schema: SchemaSlot,
    cancel: CancellationToken,
    capacity: usize,
    drained: bool,
}

impl RowReceiver {
    /// Next row, or `None` once the channel is closed and drained or the
    /// pipeline is stopping. After the end of stream every call returns `None`.
    pub async fn get(&mut self) -> Option<Row> {
        if self.drained || self.cancel.is_cancelled() {
            return None;
        }
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            next = self.rx.recv() => next,
        };
        if next.is_none() {
            self.drained = true;
        }
        next
    }

    pub fn try_get(&mut self) -> TryGet {
        if self.drained {
            return TryGet::Finished;
        }
        match self.rx.try_recv() {
            Ok(row) => TryGet::Row(row),
            Err(TryRecvError::Empty) => TryGet::Empty,
            Err(TryRecvError::Disconnected) => {
                self.drained = true;
                TryGet::Finished
            }
        }
    }

    /// Schema of the rows, known once the producer declared it or sent a row
    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.schema.get().cloned()
    }

    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn poll_recv(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Row>> {
        if self.drained {
            return std::task::Poll::Ready(None);
        }
        let polled = self.rx.poll_recv(cx);
        if let std::task::Poll::Ready(None) = polled {
            self.drained = true;
        }
        polled
    }
}
