//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::model::device::DeviceSpec;

use super::{Config, DatasetConfig};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dataset = self.dataset.name.to_lowercase();
        if !DatasetConfig::KNOWN.contains(&dataset.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "dataset.name must be one of {:?}, got {:?}",
                DatasetConfig::KNOWN,
                self.dataset.name
            )));
        }
        if self.model.backbone.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.backbone must not be empty".into(),
            ));
        }
        if self.model.feature_width == Some(0) {
            return Err(ConfigError::ValidationError(
                "model.feature_width must be > 0".into(),
            ));
        }
        DeviceSpec::parse(&self.model.device)?;
        if self.preprocess.height == 0 {
            return Err(ConfigError::ValidationError(
                "preprocess.height must be > 0".into(),
            ));
        }
        if self.preprocess.width == 0 {
            return Err(ConfigError::ValidationError(
                "preprocess.width must be > 0".into(),
            ));
        }
        if self.preprocess.std.iter().any(|s| *s <= 0.0) {
            return Err(ConfigError::ValidationError(
                "preprocess.std values must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.annotation.width == 0 || self.annotation.height == 0 {
            return Err(ConfigError::ValidationError(
                "annotation.width and annotation.height must be > 0".into(),
            ));
        }
        if self.annotation.line_step == 0 {
            return Err(ConfigError::ValidationError(
                "annotation.line_step must be > 0".into(),
            ));
        }
        if self.annotation.suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "annotation.suffix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_dataset() {
        let mut config = Config::default();
        config.dataset.name = "market1501".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dataset.name"));
    }

    #[test]
    fn test_validate_accepts_dataset_case_insensitively() {
        let mut config = Config::default();
        config.dataset.name = "PETA".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_resolution() {
        let mut config = Config::default();
        config.preprocess.width = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("preprocess.width"));
    }

    #[test]
    fn test_validate_rejects_non_positive_std() {
        let mut config = Config::default();
        config.preprocess.std = [0.229, 0.0, 0.225];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("preprocess.std"));
    }

    #[test]
    fn test_validate_rejects_bad_device() {
        let mut config = Config::default();
        config.model.device = "tpu:0".into();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Device(_)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_line_step() {
        let mut config = Config::default();
        config.annotation.line_step = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("line_step"));
    }
}
