use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_util::sync::WaitForCancellationFutureOwned;

use super::bounded::RowReceiver;
use crate::domain::Row;

/// A [`RowReceiver`] exposed as a [`Stream`] of rows.
///
/// The stream ends at the end-of-stream sentinel or when the pipeline
/// stops, whichever comes first.
pub struct RowStream {
    stopped: Pin<Box<WaitForCancellationFutureOwned>>,
    receiver: RowReceiver,
}

impl RowStream {
    pub fn new(receiver: RowReceiver) -> Self {
        let stopped = Box::pin(receiver.cancel_token().clone().cancelled_owned());
        Self { stopped, receiver }
    }

    pub fn into_inner(self) -> RowReceiver {
        self.receiver
    }
}

impl From<RowReceiver> for RowStream {
    fn from(receiver: RowReceiver) -> Self {
        Self::new(receiver)
    }
}

impl Stream for RowStream {
    type Item = Row;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Row>> {
        if self.stopped.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}
