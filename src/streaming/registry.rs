use std::collections::HashMap;

use super::error::PipelineError;
use super::spec::StageSpec;
use crate::engine::{Stage, StageError};
use crate::storage::SharedObjects;

/// Builds one stage copy from its definition. Shared objects are only
/// available here, while the pipeline is being built.
pub type StageFactory = fn(&StageSpec, &dyn SharedObjects) -> Result<Box<dyn Stage>, StageError>;

/// Map from stage kind tag to constructor
#[derive(Clone)]
pub struct StageRegistry {
    factories: HashMap<String, StageFactory>,
}

impl StageRegistry {
    /// A registry without any stage kinds
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding the built-in stage kinds
    pub fn new() -> Self {
        let mut registry = Self::empty();
        crate::steps::register_builtins(&mut registry);
        registry
    }

    /// Add or replace a stage kind
    pub fn register(&mut self, kind: impl Into<String>, factory: StageFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build one copy of a stage
    pub fn create(
        &self,
        spec: &StageSpec,
        shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, PipelineError> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| PipelineError::UnknownKind {
                stage: spec.name.clone(),
                kind: spec.kind.clone(),
            })?;
        factory(spec, shared).map_err(|source| PipelineError::Stage {
            stage: spec.name.clone(),
            source,
        })
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
