use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::PipelineError;
use crate::engine::{Distribution, ErrorHandling, StageError};
use crate::storage::SharedObject;

/// Rows buffered per channel unless the pipeline says otherwise
pub const DEFAULT_CHANNEL_CAPACITY: usize = 50;

fn default_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_copies() -> usize {
    1
}

/// A pipeline definition: stages, the hops between them and the shared
/// objects local to this pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub hops: Vec<HopSpec>,
    #[serde(default)]
    pub shared: Vec<SharedObject>,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stages: Vec::new(),
            hops: Vec::new(),
            shared: Vec::new(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML pipeline file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&text)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_hop(mut self, hop: HopSpec) -> Self {
        self.hops.push(hop);
        self
    }

    pub fn with_shared(mut self, object: SharedObject) -> Self {
        self.shared.push(object);
        self
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// One node of the graph
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSpec {
    pub name: String,
    /// Registry tag selecting the stage implementation
    pub kind: String,
    #[serde(default = "default_copies")]
    pub copies: usize,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub error_handling: Option<ErrorHandling>,
    /// Stage-specific settings, read once when the stage is built
    #[serde(default)]
    pub config: toml::Table,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            copies: 1,
            distribution: Distribution::RoundRobin,
            error_handling: None,
            config: toml::Table::new(),
        }
    }

    pub fn with_copies(mut self, copies: usize) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = Some(handling);
        self
    }

    pub fn with_config(mut self, config: toml::Table) -> Self {
        self.config = config;
        self
    }

    /// Set one config entry
    pub fn with_setting(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Deserialise the config table into a stage's typed settings
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, StageError> {
        toml::Value::Table(self.config.clone())
            .try_into()
            .map_err(|e: toml::de::Error| StageError::Config(e.message().to_string()))
    }
}

/// A directed edge between two stages
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HopSpec {
    pub from: String,
    pub to: String,
    /// Carries the rejected rows of `from` instead of its main output
    #[serde(default)]
    pub error: bool,
}

impl HopSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            error: false,
        }
    }

    pub fn error_hop(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::new(from, to)
        }
    }
}
