//! Palette extraction
//!
//! Turns raw image bytes into an ordered list of dominant colors. The
//! [`PaletteExtractor`] trait is the seam the pipeline depends on;
//! [`MedianCutExtractor`] is the production implementation built on the
//! `image` crate and a median cut quantizer.
//!
//! Extraction is synchronous and CPU-bound. Callers run it on a blocking pool.

mod median_cut;

use std::io::Cursor;

use image::ImageReader;
use swatch_core::Rgb;
use thiserror::Error;

pub use median_cut::{QuantizedColor, quantize};

/// Alpha below which a pixel is ignored
const MIN_ALPHA: u8 = 125;
/// Channel value above which a pixel counts as background white
const WHITE_THRESHOLD: u8 = 250;

/// Errors reported by palette extraction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The bytes are not a decodable image
    #[error("image could not be decoded: {0}")]
    Decode(String),

    /// The image decoded but no dominant colors could be determined
    #[error("no dominant colors found in image")]
    EmptyImage,
}

/// Trait for palette extractors
///
/// On success the palette is non-empty and ordered by dominance, most
/// dominant first. Implementations must be deterministic for a given input.
pub trait PaletteExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Rgb>, ExtractError>;
}

/// Median cut extractor over sampled, opaque, non-white pixels
#[derive(Debug, Clone)]
pub struct MedianCutExtractor {
    color_count: usize,
    quality: usize,
}

impl MedianCutExtractor {
    /// Creates an extractor
    ///
    /// # Arguments
    /// * `color_count` - Maximum number of colors returned
    /// * `quality` - Sampling step; 1 visits every pixel, 10 every tenth
    pub fn new(color_count: usize, quality: usize) -> Self {
        Self {
            color_count: color_count.max(1),
            quality: quality.max(1),
        }
    }

    fn sample(&self, bytes: &[u8]) -> Result<Vec<[u8; 3]>, ExtractError> {
        if bytes.is_empty() {
            return Err(ExtractError::Decode("empty input".to_string()));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ExtractError::Decode(e.to_string()))?;

        if reader.format().is_none() {
            return Err(ExtractError::Decode(
                "unrecognized image format".to_string(),
            ));
        }

        let image = reader
            .decode()
            .map_err(|e| ExtractError::Decode(e.to_string()))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractError::EmptyImage);
        }

        let pixels = image
            .to_rgba8()
            .pixels()
            .step_by(self.quality)
            .filter(|p| p[3] >= MIN_ALPHA)
            .filter(|p| !p.0[..3].iter().all(|&c| c > WHITE_THRESHOLD))
            .map(|p| [p[0], p[1], p[2]])
            .collect();

        Ok(pixels)
    }
}

impl PaletteExtractor for MedianCutExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Rgb>, ExtractError> {
        let pixels = self.sample(bytes)?;
        let palette: Vec<Rgb> = quantize(&pixels, self.color_count)
            .iter()
            .map(|color| Rgb::from(color.mean.map(clamp_channel)))
            .collect();

        if palette.is_empty() {
            return Err(ExtractError::EmptyImage);
        }

        Ok(palette)
    }
}

fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}
