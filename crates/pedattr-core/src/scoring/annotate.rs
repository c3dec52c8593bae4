//! Annotated image output.
//!
//! A copy of the input is resized to a fixed canvas and every positive
//! attribute is written on it as `name: probability`, one line per
//! attribute, top to bottom in attribute order. The result is saved as
//! `<stem><suffix>.png` next to the input.

use std::path::{Path, PathBuf};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::config::AnnotationConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::ScoreResult;

/// Glyph cell size of the bitmap font.
const GLYPH_SIZE: u32 = 8;

/// One line of text and where its top-left corner goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLine {
    pub text: String,
    pub x: u32,
    pub y: u32,
}

/// Renders positive attributes onto images.
#[derive(Debug, Clone)]
pub struct Annotator {
    config: AnnotationConfig,
}

impl Annotator {
    pub fn new(config: AnnotationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    /// Text layout for a result: positives only, at `y = margin + k * line_step`.
    pub fn lines(&self, scores: &ScoreResult) -> Vec<AnnotationLine> {
        scores
            .positives()
            .enumerate()
            .map(|(k, entry)| AnnotationLine {
                text: format!("{}: {:.5}", entry.name, entry.probability),
                x: self.config.margin,
                y: self.config.margin + k as u32 * self.config.line_step,
            })
            .collect()
    }

    /// Resize a copy of `image` to the canvas and draw the lines on it.
    pub fn render(&self, image: &DynamicImage, scores: &ScoreResult) -> RgbImage {
        let mut canvas = image
            .resize_exact(self.config.width, self.config.height, FilterType::Triangle)
            .to_rgb8();
        let color = Rgb(self.config.color);
        for line in self.lines(scores) {
            draw_text(&mut canvas, &line.text, line.x, line.y, color);
        }
        canvas
    }

    /// `<dir>/<stem><suffix>.png` for an input path.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let file_name = format!("{}{}.png", stem, self.config.suffix);
        match input.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Render and save next to `input`. Returns the written path.
    pub fn annotate(
        &self,
        image: &DynamicImage,
        scores: &ScoreResult,
        input: &Path,
    ) -> PipelineResult<PathBuf> {
        let output = self.output_path(input);
        self.render(image, scores)
            .save_with_format(&output, ImageFormat::Png)
            .map_err(|e| PipelineError::Annotation {
                path: output.clone(),
                message: e.to_string(),
            })?;
        tracing::debug!(output = %output.display(), "Wrote annotated image");
        Ok(output)
    }
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels outside the
/// canvas are clipped; characters without a glyph leave a blank cell.
fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin_x = x + i as u32 * GLYPH_SIZE;
        for (row, bits) in glyph.iter().enumerate() {
            let py = y + row as u32;
            if py >= height {
                break;
            }
            for col in 0..GLYPH_SIZE {
                let px = origin_x + col;
                // bit 0 is the leftmost pixel
                if px < width && bits & (1 << col) != 0 {
                    canvas.put_pixel(px, py, color);
                }
            }
        }
    }
}
