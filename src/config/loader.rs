//! Configuration Loader
//!
//! Layers an optional TOML/YAML/JSON file under `BATCH_WINDOW__*` environment
//! overrides, deserializes the result into [`WindowConfig`] and validates it.
//! There are no silent fallbacks: a missing limit is an error.

use config::{Config, ConfigError, Environment, File, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::WindowConfig;
use crate::constants::env;

/// Keys with no default; both triggers must be configured explicitly
const REQUIRED_FIELDS: [&str; 2] = ["size_limit", "time_limit_ms"];

/// Builder-style loader for [`WindowConfig`]
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the file named by `BATCH_WINDOW_CONFIG`, if set
    pub fn from_env() -> Self {
        let file = std::env::var(env::CONFIG_FILE).ok().map(PathBuf::from);
        Self {
            file,
            env_overrides: None,
        }
    }

    /// Load a configuration file; its format is inferred from the extension
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Replace the process environment with an explicit variable map.
    /// Useful for testing without modifying global environment variables.
    pub fn with_env_overrides(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars);
        self
    }

    pub fn load(&self) -> ConfigResult<WindowConfig> {
        let source_name = self
            .file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        debug!(source = %source_name, "Loading window configuration");

        let mut builder = Config::builder();
        if let Some(path) = &self.file {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(env::CONFIG_PREFIX)
                .prefix_separator(env::CONFIG_SEPARATOR)
                .separator(env::CONFIG_SEPARATOR)
                .try_parsing(true)
                .source(self.env_overrides.clone()),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigurationError::load_failed(&source_name, e.to_string()))?;

        for field in REQUIRED_FIELDS {
            if let Err(ConfigError::NotFound(_)) = settings.get::<Value>(field) {
                return Err(ConfigurationError::missing_required_field(field, &source_name));
            }
        }

        let config: WindowConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_failed(&source_name, e.to_string()))?;

        config.validate()?;

        debug!(
            size_limit = config.size_limit,
            time_limit_ms = config.time_limit_ms,
            channel_capacity = config.channel_capacity,
            "Window configuration loaded"
        );

        Ok(config)
    }
}
