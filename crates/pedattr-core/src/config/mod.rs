//! Configuration management for pedattr.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every field. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for pedattr.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dataset / attribute list settings
    pub dataset: DatasetConfig,

    /// Model and checkpoint settings
    pub model: ModelConfig,

    /// Input transform settings
    pub preprocess: PreprocessConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Annotated output settings
    pub annotation: AnnotationConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.pedattr.pedattr/config.toml
    /// - Linux: ~/.config/pedattr/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pedattr\config\config.toml
    ///
    /// Falls back to ~/.pedattr/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pedattr", "pedattr")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pedattr").join("config.toml")
            })
    }

    /// Resolved checkpoint path (with ~ expansion).
    pub fn checkpoint_path(&self) -> PathBuf {
        expand(&self.model.checkpoint)
    }

    /// Resolved upload directory (with ~ expansion).
    pub fn upload_dir(&self) -> PathBuf {
        expand(&self.general.upload_dir)
    }

    /// Resolved log directory (with ~ expansion).
    pub fn log_dir(&self) -> PathBuf {
        expand(&self.logging.log_dir)
    }

    /// Resolved attribute list override (with ~ expansion).
    pub fn attributes_file(&self) -> Option<PathBuf> {
        self.dataset.attributes_file.as_deref().map(expand)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
