pub mod concurrent;
pub mod error;
pub mod layered;
pub mod traits;

// Re-export commonly used types
pub use concurrent::MemorySharedObjects;
pub use error::StorageError;
pub use layered::LayeredSharedObjects;
pub use traits::{SharedObject, SharedObjects};
