use std::sync::Arc;

use super::error::StorageError;
use super::traits::{SharedObject, SharedObjects};

/// Read-only composite view over several stores.
///
/// Layers are searched in order and the first hit wins.
#[derive(Clone, Default)]
pub struct LayeredSharedObjects {
    layers: Vec<Arc<dyn SharedObjects>>,
}

impl LayeredSharedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer with lower precedence than the existing ones
    pub fn with_layer(mut self, layer: Arc<dyn SharedObjects>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl SharedObjects for LayeredSharedObjects {
    fn lookup(&self, object_type: &str, name: &str) -> Option<SharedObject> {
        self.layers
            .iter()
            .find_map(|layer| layer.lookup(object_type, name))
    }

    fn save(&self, _object: SharedObject) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn delete(&self, _object_type: &str, _name: &str) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySharedObjects;

    fn location(name: &str, directory: &str) -> SharedObject {
        SharedObject::new("file-location", name).with_property("directory", directory)
    }

    #[test]
    fn first_layer_wins() {
        let project = Arc::new(MemorySharedObjects::from_objects([location("in", "/project")]));
        let global = Arc::new(MemorySharedObjects::from_objects([
            location("in", "/global"),
            location("out", "/global/out"),
        ]));

        let layered = LayeredSharedObjects::new()
            .with_layer(project)
            .with_layer(global);

        assert_eq!(layered.layer_count(), 2);
        assert_eq!(
            layered.lookup("file-location", "IN").unwrap().property("directory"),
            Some("/project")
        );
        assert_eq!(
            layered.lookup("file-location", "out").unwrap().property("directory"),
            Some("/global/out")
        );
        assert!(layered.lookup("connection", "in").is_none());
    }

    #[test]
    fn refuses_mutation() {
        let inner = Arc::new(MemorySharedObjects::from_objects([location("in", "/a")]));
        let layered = LayeredSharedObjects::new().with_layer(inner.clone());

        assert!(layered.is_read_only());
        assert!(matches!(
            layered.save(location("x", "/x")),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(
            layered.delete("file-location", "in"),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(layered.clear(), Err(StorageError::ReadOnly)));

        // the underlying layer is untouched
        assert_eq!(inner.len(), 1);
    }
}
