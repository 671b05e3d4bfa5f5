//! Project configuration: `<project>/.uncaught/config.yaml`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::model::ResolutionMode;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".uncaught";

/// Analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default propagation mode; CLI flags override.
    #[serde(default = "default_mode")]
    pub resolution_mode: ResolutionMode,
    /// Glob patterns skipped by file discovery.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Subclasses of these are treated as framework-handled in audits.
    #[serde(default)]
    pub handled_base_classes: Vec<String>,
    /// Callee-name globs whose call edges are severed before propagation.
    #[serde(default)]
    pub async_boundaries: Vec<String>,
}

fn default_mode() -> ResolutionMode {
    ResolutionMode::Default
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution_mode: ResolutionMode::Default,
            exclude: Vec::new(),
            handled_base_classes: Vec::new(),
            async_boundaries: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `<directory>/.uncaught/config.yaml`.
    ///
    /// A missing file yields the defaults; a malformed file is fatal.
    pub fn load(directory: &Path) -> Result<Self, ConfigError> {
        let path = directory.join(CONFIG_DIR).join("config.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        config.validate().map_err(|message| ConfigError {
            path: path.display().to_string(),
            message,
        })?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        for pattern in self.exclude.iter().chain(&self.async_boundaries) {
            globset::Glob::new(pattern)
                .map_err(|e| format!("invalid glob {:?}: {}", pattern, e))?;
        }
        Ok(())
    }
}
