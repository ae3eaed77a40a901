use thiserror::Error;

/// Errors raised by the bounded row channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Pipeline is stopping")]
    Stopped,

    #[error("Consumer is gone, row discarded")]
    Disconnected,

    #[error("Channel schema already fixed with {fixed} fields, got {offered}")]
    SchemaConflict { fixed: usize, offered: usize },
}
