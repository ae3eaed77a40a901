use std::path::PathBuf;

use crate::engine::StageError;
use crate::storage::{SharedObjects, StorageError};

/// Shared object type naming a directory
pub const FILE_LOCATION: &str = "file-location";

/// Resolve `file` against the `directory` of a `file-location` shared object,
/// or take it as is when no location is named.
pub fn resolve_path(
    file: &str,
    location: Option<&str>,
    shared: &dyn SharedObjects,
) -> Result<PathBuf, StageError> {
    let Some(name) = location else {
        return Ok(PathBuf::from(file));
    };
    let object = shared
        .lookup(FILE_LOCATION, name)
        .ok_or_else(|| StorageError::NotFound {
            object_type: FILE_LOCATION.to_string(),
            name: name.to_string(),
        })?;
    let directory = object.property("directory").ok_or_else(|| {
        StageError::Config(format!("file location '{}' has no directory", object.name))
    })?;
    Ok(PathBuf::from(directory).join(file))
}
