use std::path::Path;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use super::error::StorageError;
use super::traits::{SharedObject, SharedObjects, lookup_key};

/// Concurrent in-memory shared object store using DashMap
#[derive(Debug, Default)]
pub struct MemorySharedObjects {
    objects: DashMap<(String, String), SharedObject>,
}

#[derive(Deserialize)]
struct SharedObjectsDocument {
    #[serde(default)]
    shared: Vec<SharedObject>,
}

impl MemorySharedObjects {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    /// Build a store from a list of objects; later duplicates replace earlier ones
    pub fn from_objects(objects: impl IntoIterator<Item = SharedObject>) -> Self {
        let store = Self::new();
        for object in objects {
            store.objects.insert(object.key(), object);
        }
        store
    }

    /// Parse a TOML document holding `[[shared]]` tables
    pub fn from_toml_str(text: &str) -> Result<Self, StorageError> {
        let document: SharedObjectsDocument = toml::from_str(text)?;
        Ok(Self::from_objects(document.shared))
    }

    /// Load a TOML shared objects file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let store = Self::from_toml_str(&text)?;
        debug!(path = %path.as_ref().display(), objects = store.len(), "Loaded shared objects");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SharedObjects for MemorySharedObjects {
    fn lookup(&self, object_type: &str, name: &str) -> Option<SharedObject> {
        self.objects
            .get(&lookup_key(object_type, name))
            .map(|r| r.value().clone())
    }

    fn save(&self, object: SharedObject) -> Result<(), StorageError> {
        self.objects.insert(object.key(), object);
        Ok(())
    }

    fn delete(&self, object_type: &str, name: &str) -> Result<(), StorageError> {
        self.objects
            .remove(&lookup_key(object_type, name))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                object_type: object_type.to_string(),
                name: name.to_string(),
            })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.objects.clear();
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        false
    }
}
