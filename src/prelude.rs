//! Prelude module for convenient imports
//!
//! Import everything you need with: `use rowflow::prelude::*;`

// Domain types
pub use crate::domain::{
    BigNumber, FieldMeta, LazyValue, Row, Schema, StorageType, Value, ValueError, ValueType,
};

// Channel types
pub use crate::channel::{ChannelError, RowReceiver, RowSender, RowStream, row_channel};

// Storage types
pub use crate::storage::{
    LayeredSharedObjects, MemorySharedObjects, SharedObject, SharedObjects, StorageError,
};

// Engine types
pub use crate::engine::{
    Distribution, ErrorHandling, ProcessOutcome, RecordError, Stage, StageContext,
    StageCounters, StageError, StageState,
};

// IO types
pub use crate::io::{CsvFormat, CsvRecordReader, CsvRowWriter, IoError};

// Streaming types
pub use crate::streaming::{
    HopSpec, Pipeline, PipelineError, PipelineResult, PipelineSpec, RunStatus, RunningPipeline,
    StageRegistry, StageResult, StageSpec, run_stage,
};

// Built-in stages
pub use crate::steps::{JoinType, MergeJoin, MergeJoinConfig};

// App types
pub use crate::app::{AppError, CliApp, CliArgs, run_pipeline, write_summary};

pub use tokio_util::sync::CancellationToken;
