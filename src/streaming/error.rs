use std::io;
use thiserror::Error;

use crate::engine::StageError;

/// Configuration and wiring errors, detected before any row flows
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Hop {from} -> {to} references unknown stage '{missing}'")]
    UnknownStage {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Stage '{0}' must run at least one copy")]
    ZeroCopies(String),

    #[error("Stage '{stage}' has unknown kind '{kind}'")]
    UnknownKind { stage: String, kind: String },

    #[error("Stage '{0}' has an error hop but no error handling")]
    MissingErrorHandling(String),

    #[error("Stage '{0}' has more than one error hop")]
    DuplicateErrorHop(String),

    #[error("Cannot wire {from} ({from_copies} copies) to {to} ({to_copies} copies)")]
    CopyMismatch {
        from: String,
        from_copies: usize,
        to: String,
        to_copies: usize,
    },

    #[error("Hops form a loop through stage '{0}'")]
    Loop(String),

    #[error("Stage '{stage}': {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },
}
