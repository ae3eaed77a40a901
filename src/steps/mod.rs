pub mod csv_input;
pub mod csv_output;
pub mod data_grid;
pub mod dummy;
pub mod location;
pub mod merge_join;

// Re-export commonly used types
pub use csv_input::{CsvInput, CsvInputConfig};
pub use csv_output::{CsvOutput, CsvOutputConfig};
pub use data_grid::{DataGrid, DataGridConfig};
pub use dummy::Dummy;
pub use location::{FILE_LOCATION, resolve_path};
pub use merge_join::{JoinType, MergeJoin, MergeJoinConfig};

use crate::streaming::StageRegistry;

/// Add the built-in stage kinds to a registry
pub fn register_builtins(registry: &mut StageRegistry) {
    registry
        .register("csv-input", CsvInput::create)
        .register("csv-output", CsvOutput::create)
        .register("data-grid", DataGrid::create)
        .register("dummy", Dummy::create)
        .register("merge-join", MergeJoin::create);
}
