pub mod bounded;
pub mod error;
pub mod stream;

// Re-export commonly used types
pub use bounded::{RowReceiver, RowSender, TryGet, row_channel};
pub use error::ChannelError;
pub use stream::RowStream;
