//! Pawprint Core - Pet Visual Fingerprinting Library
//!
//! Turns photographs of an animal into a fixed-length color descriptor per
//! view, stores the resulting fingerprints, and finds look-alike animals
//! of the same species with a species-weighted similarity score.

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod matching;
pub mod similarity;
pub mod statistics;
pub mod storage_backend;
pub mod storage_config;

#[cfg(test)]
mod test_util;

pub use cache::CachedStore;
pub use config::{ExtractorConfig, ResizeFilter};
pub use error::{CorruptRecord, ExtractionError, GenerateError, MatchError, StoreError};
pub use extract::FeatureExtractor;
pub use fingerprint::FingerprintGenerator;
pub use matching::{Matcher, SearchOutcome, SearchResult};
pub use similarity::{cosine_similarity, score, weight_profile, WeightProfile};
pub use statistics::SearchStatistics;
pub use storage_backend::{open_store, FingerprintStore, RecordScan};
pub use storage_config::{MatchingConfig, PawprintConfig};

pub use pawprint_fp::{FingerprintRecord, Species, SubjectId, View, REQUIRED_VIEWS};

use std::sync::Arc;

/// Open the configured store and build a generator and a matcher sharing it.
///
/// The configuration is validated first, so configs built in code get the
/// same checks as ones loaded from TOML.
pub async fn open_engine(config: &PawprintConfig) -> anyhow::Result<(FingerprintGenerator, Matcher)> {
    config.validate()?;
    let store: Arc<dyn FingerprintStore> = open_store(config).await?;

    let generator = FingerprintGenerator::new(FeatureExtractor::new(&config.extractor)?, store.clone());
    let matcher = Matcher::new(
        store,
        FeatureExtractor::new(&config.extractor)?,
        config.matching.clone(),
    );
    Ok((generator, matcher))
}
