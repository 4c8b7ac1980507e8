//! Configuration for extraction runs.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (topn.toml)
//! ```toml
//! input = "/data/ppr/iter0010"
//! output = "/data/ppr/top"
//! top = 50
//! sources = [367, 249, 145]
//! scheduling = "parallel"
//! ```

pub mod defaults;

pub use defaults::*;

use crate::driver::{RoundScheduling, RunPlan};
use crate::error::ExtractError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Input file or directory of partition files
    pub input: Option<PathBuf>,
    /// Output base path
    pub output: String,
    /// Items kept per source
    pub top: usize,
    /// Source entity ids; position `i` reads score slot `i`
    pub sources: Vec<u32>,
    /// Partitions a single input file is split into
    pub partitions: usize,
    /// Round scheduling
    pub scheduling: RoundScheduling,
    /// Eagerly check vector lengths and id uniqueness before the first round
    pub validate_input: bool,
    /// Bound of the shuffle channel
    pub merge_queue_capacity: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: DEFAULT_OUTPUT_BASE.to_string(),
            top: DEFAULT_TOP_N,
            sources: Vec::new(),
            partitions: default_partition_count(),
            scheduling: RoundScheduling::Sequential,
            validate_input: true,
            merge_queue_capacity: DEFAULT_MERGE_QUEUE_CAPACITY,
        }
    }
}

impl ExtractConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(
        config_path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(ExtractConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with TOPN_ prefix (flat keys, no nesting)
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        // Layer 3: CLI overrides
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    /// Turn the loaded values into a validated run plan.
    pub fn plan(&self) -> Result<RunPlan, ExtractError> {
        Ok(RunPlan::new(self.sources.clone(), self.top)?
            .with_scheduling(self.scheduling)
            .with_validation(self.validate_input)
            .with_merge_queue_capacity(self.merge_queue_capacity))
    }
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<RoundScheduling>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_input: Option<bool>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<ConfigError> for ExtractError {
    fn from(e: ConfigError) -> Self {
        ExtractError::Config(e.message)
    }
}

/// Parse a comma-separated source list such as `"367,249,145"`.
pub fn parse_sources(raw: &str) -> Result<Vec<u32>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|e| ConfigError {
                message: format!("invalid source id {:?}: {}", s, e),
            })
        })
        .collect()
}
