//! Feature extraction
//!
//! Turns one photograph into a joint RGB color histogram: the image is
//! converted to 8-bit RGB, resized to the canonical resolution, every pixel
//! is quantized into a (r, g, b) bin triple and the bin counts are
//! L1-normalized.

use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use image::{DynamicImage, RgbImage};

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
    version: String,
}

impl FeatureExtractor {
    /// Fails on a configuration `ExtractorConfig::validate` rejects
    pub fn new(config: &ExtractorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            version: config.version_stamp(),
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Version stamp written into every record this extractor produces
    pub fn version_stamp(&self) -> &str {
        &self.version
    }

    pub fn vector_len(&self) -> usize {
        self.config.vector_len()
    }

    /// Extract the descriptor of one encoded image
    pub fn extract(&self, image_bytes: &[u8]) -> Result<Vec<f32>, ExtractionError> {
        let decoded = image::load_from_memory(image_bytes)?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ExtractionError::EmptyImage);
        }

        let rgb = to_rgb(decoded);
        let canonical = image::imageops::resize(
            &rgb,
            self.config.canonical_width,
            self.config.canonical_height,
            self.config.filter.filter_type(),
        );

        Ok(self.histogram(&canonical))
    }

    fn histogram(&self, image: &RgbImage) -> Vec<f32> {
        let bins = self.config.bins_per_channel as usize;
        let mut counts = vec![0u32; self.vector_len()];

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let index = quantize(r, bins) * bins * bins + quantize(g, bins) * bins + quantize(b, bins);
            counts[index] += 1;
        }

        let total = (image.width() as u64 * image.height() as u64) as f32;
        counts.into_iter().map(|c| c as f32 / total).collect()
    }
}

fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

#[inline]
fn quantize(value: u8, bins: usize) -> usize {
    value as usize * bins / 256
}
