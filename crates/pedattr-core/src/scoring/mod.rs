//! Logits → per-attribute probabilities, and optional annotated output.

pub mod annotate;
pub mod scorer;

pub use annotate::{AnnotationLine, Annotator};
pub use scorer::Scorer;
