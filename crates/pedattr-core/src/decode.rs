//! Image decoding with format detection and size limits.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format, if the content could be identified
    pub format: Option<ImageFormat>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Original file size in bytes
    pub file_size: u64,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode an image file, enforcing size limits.
    pub fn decode(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }
        let io_err = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file_size = std::fs::metadata(path).map_err(io_err)?.len();
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if file_size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: file_size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        let decoded = Self::decode_bytes(bytes, path)?;
        if decoded.width > self.limits.max_image_dimension
            || decoded.height > self.limits.max_image_dimension
        {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width: decoded.width,
                height: decoded.height,
                max_dim: self.limits.max_image_dimension,
            });
        }
        Ok(decoded)
    }

    /// Decode from bytes. The format is guessed from content, then from the
    /// file extension.
    fn decode_bytes(bytes: Vec<u8>, path: &Path) -> Result<DecodedImage, PipelineError> {
        let file_size = bytes.len() as u64;
        let mut reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        if reader.format().is_none() {
            if let Ok(format) = ImageFormat::from_path(path) {
                reader.set_format(format);
            }
        }
        let format = reader.format();
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person.png");
        write_png(&path, 12, 20);
        let decoded = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (12, 20));
        assert_eq!(decoded.format, Some(ImageFormat::Png));
        assert!(decoded.file_size > 0);
    }

    #[test]
    fn test_format_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let misnamed = dir.path().join("person.jpg");
        write_png(&misnamed, 4, 4);
        let decoded = ImageDecoder::new(LimitsConfig::default())
            .decode(&misnamed)
            .unwrap();
        assert_eq!(decoded.format, Some(ImageFormat::Png));
    }

    #[test]
    fn test_missing_file() {
        let err = ImageDecoder::new(LimitsConfig::default())
            .decode(Path::new("/nonexistent/person.png"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nthis is not a png").unwrap();
        let err = ImageDecoder::new(LimitsConfig::default())
            .decode(&path)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_dimension_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 64, 8);
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..Default::default()
        };
        let err = ImageDecoder::new(limits).decode(&path).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 64,
                height: 8,
                max_dim: 32,
                ..
            }
        ));
    }
}
