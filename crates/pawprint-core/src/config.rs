//! Feature extractor parameters
//!
//! Every record carries the version stamp of the configuration that
//! produced it; records with a different stamp are not comparable.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Name of the descriptor algorithm, part of the version stamp
pub const DESCRIPTOR_ALGORITHM: &str = "rgb-joint-hist/v1";

/// Resampling filter used when scaling to the canonical resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeFilter::Nearest => "nearest",
            ResizeFilter::Triangle => "triangle",
            ResizeFilter::CatmullRom => "catmullrom",
            ResizeFilter::Gaussian => "gaussian",
            ResizeFilter::Lanczos3 => "lanczos3",
        }
    }

    pub fn filter_type(&self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl Default for ResizeFilter {
    fn default() -> Self {
        ResizeFilter::Triangle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_canonical_size")]
    pub canonical_width: u32,
    #[serde(default = "default_canonical_size")]
    pub canonical_height: u32,
    /// Quantization levels per color channel; the vector has `bins³` entries
    #[serde(default = "default_bins_per_channel")]
    pub bins_per_channel: u32,
    #[serde(default)]
    pub filter: ResizeFilter,
}

fn default_canonical_size() -> u32 {
    64
}
fn default_bins_per_channel() -> u32 {
    8
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            canonical_width: default_canonical_size(),
            canonical_height: default_canonical_size(),
            bins_per_channel: default_bins_per_channel(),
            filter: ResizeFilter::default(),
        }
    }
}

impl ExtractorConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.canonical_width == 0 || self.canonical_height == 0 {
            anyhow::bail!("Canonical resolution must be > 0");
        }
        if !(2..=32).contains(&self.bins_per_channel) {
            anyhow::bail!("bins_per_channel must be within 2..=32");
        }
        Ok(())
    }

    /// Number of entries in every descriptor vector
    pub fn vector_len(&self) -> usize {
        (self.bins_per_channel as usize).pow(3)
    }

    /// Identifies the configuration; equal stamps mean comparable vectors
    pub fn version_stamp(&self) -> String {
        format!(
            "{}/{}x{}/b{}/{}",
            DESCRIPTOR_ALGORITHM,
            self.canonical_width,
            self.canonical_height,
            self.bins_per_channel,
            self.filter.as_str()
        )
    }
}
