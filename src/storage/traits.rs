use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// An opaque named descriptor (connection, file location, cluster endpoint)
/// shared between pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl SharedObject {
    pub fn new(object_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Case-folded lookup key
    pub fn key(&self) -> (String, String) {
        lookup_key(&self.object_type, &self.name)
    }
}

pub(crate) fn lookup_key(object_type: &str, name: &str) -> (String, String) {
    (object_type.to_lowercase(), name.to_lowercase())
}

/// Metadata store consulted while a pipeline is being built.
///
/// Lookups are case-insensitive on `(type, name)`. Composite views refuse
/// every mutation with [`StorageError::ReadOnly`].
pub trait SharedObjects: Send + Sync {
    fn lookup(&self, object_type: &str, name: &str) -> Option<SharedObject>;

    /// Insert or replace an object
    fn save(&self, object: SharedObject) -> Result<(), StorageError>;

    fn delete(&self, object_type: &str, name: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    fn is_read_only(&self) -> bool;
}
