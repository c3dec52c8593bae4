//! Core data types produced by scoring.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::PathBuf;

/// Score of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeScore {
    /// Attribute name from the attribute list
    pub name: String,
    /// Raw head output
    pub logit: f32,
    /// `sigmoid(logit)`, in [0, 1]
    pub probability: f32,
}

impl AttributeScore {
    /// An attribute counts as present when `probability >= 0.5`, decided on
    /// the logit so rounding in the sigmoid cannot flip it.
    pub fn is_positive(&self) -> bool {
        self.logit >= 0.0
    }
}

/// Ordered attribute → probability mapping for one image.
///
/// Always holds one entry per attribute, in attribute-list order. Serializes
/// as a JSON object `{ "name": probability, ... }` preserving that order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    entries: Vec<AttributeScore>,
}

impl ScoreResult {
    pub fn from_entries(entries: Vec<AttributeScore>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeScore> {
        self.entries.iter()
    }

    /// Probability for an attribute name.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.probability)
    }

    /// Attributes with probability ≥ 0.5, in attribute order.
    pub fn positives(&self) -> impl Iterator<Item = &AttributeScore> {
        self.entries.iter().filter(|e| e.is_positive())
    }

    pub fn probabilities(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.probability).collect()
    }

    pub fn logits(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.logit).collect()
    }
}

impl Serialize for ScoreResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.probability)?;
        }
        map.end()
    }
}

/// The complete output for one scored image.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredImage {
    /// Path of the source file
    pub file_path: PathBuf,

    /// Just the filename portion
    pub file_name: String,

    /// Original image width in pixels
    pub width: u32,

    /// Original image height in pixels
    pub height: u32,

    /// Backbone that produced the scores
    pub backbone: String,

    /// Attribute probabilities in attribute order
    pub attributes: ScoreResult,

    /// Names of attributes with probability ≥ 0.5
    pub positive: Vec<String>,

    /// Annotated copy, when one was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_path: Option<PathBuf>,

    /// Decode + preprocess + forward time
    pub elapsed_ms: u64,
}
