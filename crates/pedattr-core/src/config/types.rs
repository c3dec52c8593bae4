//! Sub-configuration structs with defaults matching the released checkpoints.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory that image identifiers are resolved against
    pub upload_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./static/uploads"),
        }
    }
}

/// Dataset the checkpoint was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset name ("peta", "rap" or "pa100k")
    pub name: String,

    /// Split identifier the checkpoint was validated on (informational)
    pub valid_split: String,

    /// Optional attribute list overriding the built-in one.
    /// One name per line, or a JSON array of strings (`.json`).
    pub attributes_file: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "peta".to_string(),
            valid_split: "test".to_string(),
            attributes_file: None,
        }
    }
}

impl DatasetConfig {
    /// Datasets this build knows about.
    pub const KNOWN: &'static [&'static str] = &["peta", "rap", "pa100k"];
}

/// Model composition and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Backbone name looked up in the registry
    pub backbone: String,

    /// Expected backbone output width. Only used as a cross-check
    /// against the registry when set.
    pub feature_width: Option<usize>,

    /// Path to the safetensors checkpoint
    pub checkpoint: PathBuf,

    /// Leading key segment every checkpoint parameter lives under
    pub checkpoint_root: String,

    /// Key segment added by the replication wrapper at save time.
    /// Empty when the checkpoint was saved without one.
    pub wrapper_prefix: String,

    /// Device: "auto", "cpu", "cuda:N" or "metal:N"
    pub device: String,

    /// Never place the model on an accelerator
    pub force_cpu: bool,

    /// Seed for accelerator RNG state
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backbone: "resnet50".to_string(),
            feature_width: None,
            checkpoint: PathBuf::from("exp_result/PETA/PETA/img_model/ckpt_max.safetensors"),
            checkpoint_root: "state_dicts".to_string(),
            wrapper_prefix: "module".to_string(),
            device: "auto".to_string(),
            force_cpu: false,
            seed: 605,
        }
    }
}

/// Input transform settings. Must match what the checkpoint was trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Input height in pixels
    pub height: u32,

    /// Input width in pixels
    pub width: u32,

    /// Per-channel mean (RGB, in [0, 1] units)
    pub mean: [f32; 3],

    /// Per-channel standard deviation (RGB, in [0, 1] units)
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            height: 256,
            width: 192,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Annotated image rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Write an annotated copy next to every scored image
    pub enabled: bool,

    /// Canvas width the image is resized to before drawing
    pub width: u32,

    /// Canvas height the image is resized to before drawing
    pub height: u32,

    /// Left margin and y position of the first line
    pub margin: u32,

    /// Vertical distance between consecutive lines
    pub line_step: u32,

    /// Appended to the input file stem
    pub suffix: String,

    /// Text color (RGB)
    pub color: [u8; 3],
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 256,
            height: 512,
            margin: 10,
            line_step: 10,
            suffix: "_predicted".to_string(),
            color: [255, 0, 0],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,

    /// Tee log output into a timestamped file under `log_dir`
    pub redirect_stdout: bool,

    /// Directory for redirected log files
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            redirect_stdout: false,
            log_dir: PathBuf::from("exp_result/PETA/log"),
        }
    }
}
