//! Error types for the attribute recognition pipeline.
//!
//! Errors are grouped by the phase that raises them: configuration (startup),
//! checkpoint loading (startup) and per-image processing. Every variant
//! carries the context needed for a useful diagnostic: paths, names, shapes.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pedattr operations.
#[derive(Error, Debug)]
pub enum PedattrError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint loading errors
    #[error("Checkpoint error: {0}")]
    Load(#[from] LoadError),

    /// Per-image processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Backbone name is not in the registry
    #[error("Unknown backbone {name:?} (known: {known})")]
    UnknownBackbone { name: String, known: String },

    /// A backbone with this name is already registered
    #[error("Backbone {0:?} is already registered")]
    DuplicateBackbone(String),

    /// Explicit feature width disagrees with the registry
    #[error("Backbone {backbone} produces {registered} features but config says {configured}")]
    FeatureWidthMismatch {
        backbone: String,
        registered: usize,
        configured: usize,
    },

    /// Model head size disagrees with the attribute list
    #[error("Model scores {expected} attributes but the attribute list has {actual}")]
    AttributeCountMismatch { expected: usize, actual: usize },

    /// Attribute list could not be loaded
    #[error("Invalid attribute list {path}: {message}")]
    Attributes { path: PathBuf, message: String },

    /// Attribute names are empty, blank or repeated
    #[error("Invalid attribute list: {0}")]
    AttributeNames(String),

    /// Requested device is malformed or unavailable
    #[error("Device error: {0}")]
    Device(String),
}

/// Checkpoint loading errors.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Checkpoint file missing or unreadable
    #[error("Cannot open checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint file is not a valid tensor container
    #[error("Cannot read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    /// Model graph could not be constructed
    #[error("Cannot build {backbone} model: {source}")]
    Build {
        backbone: String,
        #[source]
        source: candle_core::Error,
    },

    /// Checkpoint parameters do not cover the model exactly
    #[error("Checkpoint {path} does not match the model: {report}")]
    Mismatch {
        path: PathBuf,
        report: MismatchReport,
    },

    /// Weight copy into a parameter failed
    #[error("Cannot assign parameter {name}: {source}")]
    Assign {
        name: String,
        #[source]
        source: candle_core::Error,
    },
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File exists but could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Forward pass failed
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// Annotated image could not be written
    #[error("Annotation failed for {path}: {message}")]
    Annotation { path: PathBuf, message: String },
}

impl From<candle_core::Error> for PipelineError {
    fn from(e: candle_core::Error) -> Self {
        PipelineError::Inference {
            message: e.to_string(),
        }
    }
}

/// A parameter whose checkpoint shape differs from the model's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub name: String,
    pub expected: Vec<usize>,
    pub found: Vec<usize>,
}

/// Everything that prevented a checkpoint from covering the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchReport {
    /// Model parameters with no checkpoint entry
    pub missing: Vec<String>,
    /// Checkpoint entries no model parameter asked for
    pub unexpected: Vec<String>,
    /// Entries present on both sides with different shapes
    pub shapes: Vec<ShapeMismatch>,
}

impl MismatchReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.shapes.is_empty()
    }
}

/// Number of names listed per category before eliding.
const REPORT_PREVIEW: usize = 5;

fn preview(names: &[String]) -> String {
    let mut shown = names
        .iter()
        .take(REPORT_PREVIEW)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > REPORT_PREVIEW {
        shown.push_str(&format!(", ... ({} more)", names.len() - REPORT_PREVIEW));
    }
    shown
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "{} missing [{}]",
                self.missing.len(),
                preview(&self.missing)
            ));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!(
                "{} unexpected [{}]",
                self.unexpected.len(),
                preview(&self.unexpected)
            ));
        }
        if !self.shapes.is_empty() {
            let shapes: Vec<String> = self
                .shapes
                .iter()
                .map(|s| format!("{} expected {:?} found {:?}", s.name, s.expected, s.found))
                .collect();
            parts.push(format!(
                "{} shape mismatches [{}]",
                self.shapes.len(),
                preview(&shapes)
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Convenience type alias for pedattr results.
pub type Result<T> = std::result::Result<T, PedattrError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
