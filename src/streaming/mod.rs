pub mod error;
pub mod pipeline;
pub mod registry;
pub mod spec;
pub mod wiring;
pub mod worker;

// Re-export commonly used types
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineResult, RunStatus, RunningPipeline};
pub use registry::{StageFactory, StageRegistry};
pub use spec::{DEFAULT_CHANNEL_CAPACITY, HopSpec, PipelineSpec, StageSpec};
pub use worker::{StageResult, run_stage};
