pub mod validation;

use serde::{Deserialize, Serialize};
use std::path::Path;

use self::validation::validate_config;
use crate::stream::{TranslateOptions, DEFAULT_THINKING_SIGNATURE};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Stream translator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Model echoed into `message_start` when none is given on the command line.
    #[serde(default)]
    pub default_model: String,
    #[serde(default = "default_thinking_signature")]
    pub thinking_signature: String,
    /// Bytes per read when pulling the upstream stream.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    #[serde(default = "default_true")]
    pub track_tool_arguments: bool,
}

fn default_thinking_signature() -> String {
    DEFAULT_THINKING_SIGNATURE.to_string()
}
fn default_read_chunk_size() -> usize {
    8 * 1024
}
fn default_true() -> bool {
    true
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            default_model: String::new(),
            thinking_signature: default_thinking_signature(),
            read_chunk_size: default_read_chunk_size(),
            track_tool_arguments: true,
        }
    }
}

impl TranslatorConfig {
    /// Build per-stream options, preferring `model` over the configured default.
    #[must_use]
    pub fn translate_options(&self, model: Option<&str>) -> TranslateOptions {
        let model = model.unwrap_or(&self.default_model);
        TranslateOptions::new(model)
            .with_thinking_signature(self.thinking_signature.clone())
            .with_tool_argument_tracking(self.track_tool_arguments)
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Like [`load_config`], but a missing file yields the validated defaults.
///
/// # Errors
///
/// Same as [`load_config`] for every failure other than "file not found".
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(ConfigError::Io(err)),
    }
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = if contents.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(contents)?
    };
    validate_config(&config)?;
    Ok(config)
}
