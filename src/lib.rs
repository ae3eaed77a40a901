//! Embeddable row-streaming ETL engine.
//!
//! Stages run as tokio tasks connected by bounded row channels. A pipeline
//! is described in TOML (see [`streaming::PipelineSpec`]) and built from a
//! [`streaming::StageRegistry`].

pub mod app;
pub mod channel;
pub mod domain;
pub mod engine;
pub mod io;
pub mod prelude;
pub mod steps;
pub mod storage;
pub mod streaming;
