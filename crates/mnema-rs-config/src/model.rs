//! Configuration schema for Mnema.

use crate::ConfigError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root config for the Mnema engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemaConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl MnemaConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemaConfigBuilder {
        MnemaConfigBuilder::new()
    }

    /// Load a config from a JSON5 file on disk.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let config: MnemaConfig = json5::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consolidation.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "consolidation.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.budget.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "budget.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.budget.topics_max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "budget.topics_max_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for assembling a `MnemaConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemaConfigBuilder {
    config: MnemaConfig,
}

impl MnemaConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemaConfig::default(),
        }
    }

    /// Replace the storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the budget configuration.
    pub fn budget(mut self, budget: BudgetConfig) -> Self {
        self.config.budget = budget;
        self
    }

    /// Replace the consolidation loop configuration.
    pub fn consolidation(mut self, consolidation: ConsolidationConfig) -> Self {
        self.config.consolidation = consolidation;
        self
    }

    /// Replace the dispatch queue configuration.
    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.config.queue = queue;
        self
    }

    /// Finalize and return the built `MnemaConfig`.
    pub fn build(self) -> MnemaConfig {
        self.config
    }
}

/// File-backed blob storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// Token ceilings applied by the budget enforcer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_topics_max_tokens")]
    pub topics_max_tokens: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            topics_max_tokens: default_topics_max_tokens(),
        }
    }
}

/// Default token ceiling for general sections.
fn default_max_tokens() -> usize {
    25_000
}

/// Default token ceiling for the topics section.
fn default_topics_max_tokens() -> usize {
    25_000
}

/// Consolidation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

/// Default iteration cap for the consolidation loop.
fn default_max_iterations() -> u32 {
    5
}

/// Default timeout applied to oracle and token-counter calls.
fn default_oracle_timeout_secs() -> u64 {
    60
}

/// Dispatch queue settings. A missing endpoint disables dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}
