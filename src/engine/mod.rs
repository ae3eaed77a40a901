pub mod context;
pub mod counters;
pub mod error;
pub mod error_handling;
pub mod stage;

// Re-export commonly used types
pub use context::{Distribution, OutputTarget, StageContext};
pub use counters::StageCounters;
pub use error::StageError;
pub use error_handling::{ErrorHandling, RecordError};
pub use stage::{ProcessOutcome, Stage, StageState};
