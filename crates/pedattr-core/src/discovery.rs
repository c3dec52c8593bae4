//! File discovery for finding images to score.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the decoder is built with.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp",
];

/// Discovers image files, skipping previously written annotations.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    annotation_suffix: String,
}

impl FileDiscovery {
    /// `annotation_suffix` is the stem suffix of annotated outputs (`_predicted`).
    pub fn new(annotation_suffix: impl Into<String>) -> Self {
        Self {
            annotation_suffix: annotation_suffix.into(),
        }
    }

    /// Discover all supported image files at a path.
    ///
    /// If path is a file, returns it if supported.
    /// If path is a directory, recursively finds all supported files.
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if self.is_candidate(path) {
                vec![path.to_path_buf()]
            } else {
                vec![]
            };
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_candidate(e.path()))
            .map(|e| e.into_path())
            .collect();

        // Sort by path for deterministic ordering
        files.sort();
        files
    }

    fn is_candidate(&self, path: &Path) -> bool {
        is_supported(path) && !self.is_annotation(path)
    }

    /// Whether the file looks like an annotated output of a previous run.
    pub fn is_annotation(&self, path: &Path) -> bool {
        !self.annotation_suffix.is_empty()
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.ends_with(&self.annotation_suffix))
    }
}

/// Check if a file has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|fmt| *fmt == ext_lower)
        })
        .unwrap_or(false)
}
