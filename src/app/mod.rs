pub mod cli;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use cli::{CliApp, CliArgs};
pub use error::AppError;
pub use runner::{run_pipeline, write_summary};
