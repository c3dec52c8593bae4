//! pedattr Core - Embeddable pedestrian attribute recognition.
//!
//! Loads a pretrained backbone + linear head from a checkpoint once, then
//! scores images: each call returns one probability per visual attribute
//! (age range, clothing, accessories, carried items), in attribute-list
//! order.
//!
//! # Architecture
//!
//! ```text
//! Image → Decode → Resize/Normalize → Backbone → Head → Sigmoid → Scores
//!                                                          ↓
//!                                             optional <stem>_predicted.png
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use pedattr_core::{AttributeRecognizer, Config};
//!
//! fn main() -> pedattr_core::Result<()> {
//!     let config = Config::load()?;
//!     let recognizer = AttributeRecognizer::new(config)?;
//!
//!     let scores = recognizer.predict("walker.jpg")?;
//!     for attr in scores.positives() {
//!         println!("{}: {:.3}", attr.name, attr.probability);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod attributes;
pub mod backbone;
pub mod config;
pub mod decode;
pub mod discovery;
pub mod error;
pub mod math;
pub mod model;
pub mod preprocess;
pub mod scoring;
pub mod types;

// Re-exports for convenient access
pub use attributes::AttributeList;
pub use backbone::{BackboneEntry, BackboneRegistry};
pub use config::Config;
pub use decode::ImageDecoder;
pub use discovery::FileDiscovery;
pub use error::{ConfigError, LoadError, PedattrError, PipelineError, PipelineResult, Result};
pub use model::{AttributeModel, CheckpointLoader};
pub use preprocess::Preprocessor;
pub use scoring::{Annotator, Scorer};
pub use types::{AttributeScore, ScoreResult, ScoredImage};

use std::path::{Path, PathBuf};
use std::time::Instant;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Attribute recognizer - the main entry point for scoring images.
///
/// Everything heavy (attribute list, weights, device) is set up once in
/// [`AttributeRecognizer::new`]; afterwards the recognizer is only read.
#[derive(Debug)]
pub struct AttributeRecognizer {
    config: Config,
    scorer: Scorer,
    annotator: Annotator,
    decoder: ImageDecoder,
}

impl AttributeRecognizer {
    /// Load the attribute list and checkpoint described by `config`.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, BackboneRegistry::builtin())
    }

    /// Like [`new`](Self::new), resolving the backbone in a custom registry.
    pub fn with_registry(config: Config, registry: BackboneRegistry) -> Result<Self> {
        tracing::debug!("Initializing pedattr v{}", VERSION);
        let attributes =
            AttributeList::resolve(&config.dataset.name, config.attributes_file().as_deref())?;
        tracing::info!(
            dataset = %config.dataset.name,
            split = %config.dataset.valid_split,
            attributes = attributes.len(),
            "Attribute list ready"
        );

        let loaded = CheckpointLoader::new(registry).load(&config, &attributes)?;
        let scorer = Scorer::new(
            loaded.model,
            attributes,
            Preprocessor::new(&config.preprocess),
            loaded.device,
        )?;

        Ok(Self {
            annotator: Annotator::new(config.annotation.clone()),
            decoder: ImageDecoder::new(config.limits.clone()),
            scorer,
            config,
        })
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn attributes(&self) -> &AttributeList {
        self.scorer.attributes()
    }

    /// An existing path is used as-is; anything else is looked up in the
    /// upload directory.
    pub fn resolve_image(&self, id: impl AsRef<Path>) -> PathBuf {
        let id = id.as_ref();
        if id.exists() {
            id.to_path_buf()
        } else {
            self.config.upload_dir().join(id)
        }
    }

    /// Score one image.
    pub fn predict(&self, id: impl AsRef<Path>) -> Result<ScoreResult> {
        let path = self.resolve_image(id);
        let decoded = self.decoder.decode(&path)?;
        Ok(self.scorer.score(&decoded.image)?)
    }

    /// Score one image and write its annotated copy.
    pub fn predict_and_annotate(&self, id: impl AsRef<Path>) -> Result<(ScoreResult, PathBuf)> {
        let path = self.resolve_image(id);
        let decoded = self.decoder.decode(&path)?;
        let scores = self.scorer.score(&decoded.image)?;
        let written = self.annotator.annotate(&decoded.image, &scores, &path)?;
        Ok((scores, written))
    }

    /// Score one image into a full output record.
    ///
    /// Annotates when `annotate` is true or `annotation.enabled` is set.
    pub fn process(&self, id: impl AsRef<Path>, annotate: bool) -> Result<ScoredImage> {
        let start = Instant::now();
        let path = self.resolve_image(id);
        let decoded = self.decoder.decode(&path)?;
        let attributes = self.scorer.score(&decoded.image)?;

        let annotated_path = if annotate || self.config.annotation.enabled {
            Some(self.annotator.annotate(&decoded.image, &attributes, &path)?)
        } else {
            None
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(path = %path.display(), elapsed_ms, "Processed image");

        Ok(ScoredImage {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            width: decoded.width,
            height: decoded.height,
            backbone: self.scorer.model().backbone_name().to_string(),
            positive: attributes.positives().map(|a| a.name.clone()).collect(),
            attributes,
            annotated_path,
            elapsed_ms,
            file_path: path,
        })
    }
}
