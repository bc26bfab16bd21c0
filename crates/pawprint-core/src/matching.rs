//! Match search and ranked results
//!
//! Scans the store for candidates of a species, scores each against a
//! source fingerprint (or a synthetic one built from a single query image),
//! keeps those at or above the threshold and ranks them by descending
//! score, ties broken by ascending subject id.

use chrono::Utc;
use pawprint_fp::{FingerprintRecord, FormatError, Species, SubjectId, REQUIRED_VIEWS};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{CorruptRecord, MatchError, StoreError};
use crate::extract::FeatureExtractor;
use crate::similarity::score;
use crate::storage_backend::{FingerprintStore, RecordScan};
use crate::storage_config::MatchingConfig;


/// Subject id given to synthetic query records; never persisted
const QUERY_SUBJECT: &str = "query";

/// One ranked match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub subject_id: SubjectId,
    /// In [0, 1], higher is more similar
    pub similarity_score: f64,
    /// Copied from the matched record
    pub lifecycle_status: String,
}

/// Ranked results plus what the scan ran into
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// Candidates actually scored
    pub candidates_scanned: usize,
    /// Candidates skipped for carrying another extractor version stamp
    pub incompatible: usize,
    /// Matches at or above the threshold, before `max_results` truncation
    pub matches_found: usize,
    /// Unreadable records skipped during the scan
    pub corrupt: Vec<CorruptRecord>,
}

impl SearchOutcome {
    pub fn highest_score(&self) -> Option<f64> {
        self.results.first().map(|r| r.similarity_score)
    }

    fn merge(&mut self, other: SearchOutcome) {
        self.results.extend(other.results);
        self.candidates_scanned += other.candidates_scanned;
        self.incompatible += other.incompatible;
        self.corrupt.extend(other.corrupt);
    }
}

/// Descending score, then ascending subject id
fn rank(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
}

/// Everything one blocking scoring pass needs, owned
struct ScoringPass {
    source: Arc<FingerprintRecord>,
    exclude: Option<SubjectId>,
    threshold: f64,
    chunk_size: usize,
    cancel: CancellationToken,
}

impl ScoringPass {
    /// Score the scan chunk by chunk, each chunk in parallel
    fn run(self, scan: RecordScan) -> Result<SearchOutcome, MatchError> {
        let mut outcome = SearchOutcome::default();
        let mut scan = scan;
        let mut chunk = Vec::with_capacity(self.chunk_size);

        loop {
            if self.cancel.is_cancelled() {
                return Err(MatchError::Cancelled);
            }

            chunk.clear();
            let mut pulled = 0;
            for entry in scan.by_ref().take(self.chunk_size) {
                pulled += 1;
                match entry {
                    Ok(candidate) => {
                        if self.exclude.as_ref() == Some(&candidate.subject_id) {
                            continue;
                        }
                        // Only vectors from the source's extractor configuration are comparable
                        if candidate.extractor_version != self.source.extractor_version {
                            log::debug!(
                                "Skipping {}: extractor {} differs from {}",
                                candidate.subject_id,
                                candidate.extractor_version,
                                self.source.extractor_version
                            );
                            outcome.incompatible += 1;
                            continue;
                        }
                        chunk.push(candidate);
                    }
                    Err(corrupt) => outcome.corrupt.push(corrupt),
                }
            }
            if pulled == 0 {
                break;
            }

            outcome.candidates_scanned += chunk.len();
            let source = self.source.as_ref();
            let threshold = self.threshold;
            let matches: Vec<SearchResult> = chunk
                .par_iter()
                .filter_map(|candidate| {
                    let similarity = score(source, candidate);
                    log::trace!("{} vs {}: {:.4}", source.subject_id, candidate.subject_id, similarity);
                    (similarity >= threshold).then(|| SearchResult {
                        subject_id: candidate.subject_id.clone(),
                        similarity_score: similarity,
                        lifecycle_status: candidate.lifecycle_status.clone(),
                    })
                })
                .collect();
            outcome.results.extend(matches);
        }

        Ok(outcome)
    }
}

/// Match search over a fingerprint store
pub struct Matcher {
    store: Arc<dyn FingerprintStore>,
    extractor: FeatureExtractor,
    config: MatchingConfig,
}

impl Matcher {
    pub fn new(store: Arc<dyn FingerprintStore>, extractor: FeatureExtractor, config: MatchingConfig) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    pub fn default_threshold(&self) -> f64 {
        self.config.default_threshold
    }

    /// Animals of the same species that look like `source_subject_id`
    pub async fn find_similar(
        &self,
        source_subject_id: &SubjectId,
        threshold: f64,
    ) -> Result<SearchOutcome, MatchError> {
        self.find_similar_cancellable(source_subject_id, threshold, &CancellationToken::new())
            .await
    }

    pub async fn find_similar_cancellable(
        &self,
        source_subject_id: &SubjectId,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, MatchError> {
        check_threshold(threshold)?;
        let source = Arc::new(self.store.get(source_subject_id).await?);
        let species = source.species;

        let outcome = self
            .search(vec![(species, source)], Some(source_subject_id.clone()), threshold, cancel)
            .await?;

        log::info!(
            "Similar to {}: {} of {} candidates at >= {:.2}",
            source_subject_id,
            outcome.matches_found,
            outcome.candidates_scanned,
            threshold
        );
        Ok(outcome)
    }

    /// Animals that look like a single query photograph
    pub async fn search_by_image(
        &self,
        query_image_bytes: &[u8],
        species_filter: Option<Species>,
        threshold: f64,
    ) -> Result<SearchOutcome, MatchError> {
        self.search_by_image_cancellable(
            query_image_bytes,
            species_filter,
            threshold,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn search_by_image_cancellable(
        &self,
        query_image_bytes: &[u8],
        species_filter: Option<Species>,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, MatchError> {
        check_threshold(threshold)?;
        let vector = self.extractor.extract(query_image_bytes)?;

        // Unfiltered searches score each species with its own profile
        let species: Vec<Species> = match species_filter {
            Some(species) => vec![species],
            None => Species::ALL.to_vec(),
        };
        let queries = species
            .into_iter()
            .map(|s| Ok((s, Arc::new(self.synthetic_record(&vector, s)?))))
            .collect::<Result<Vec<_>, FormatError>>()
            .map_err(StoreError::from)?;

        let outcome = self.search(queries, None, threshold, cancel).await?;

        log::info!(
            "Image search ({}): {} of {} candidates at >= {:.2}",
            species_filter.map(|s| s.as_str()).unwrap_or("all species"),
            outcome.matches_found,
            outcome.candidates_scanned,
            threshold
        );
        Ok(outcome)
    }

    /// In-memory record carrying the query vector in every required view
    pub fn synthetic_record(&self, vector: &[f32], species: Species) -> Result<FingerprintRecord, FormatError> {
        Ok(FingerprintRecord {
            subject_id: SubjectId::new(QUERY_SUBJECT)?,
            species,
            lifecycle_status: String::new(),
            generated_at: Utc::now(),
            extractor_version: self.extractor.version_stamp().to_string(),
            views: REQUIRED_VIEWS.iter().map(|v| (*v, vector.to_vec())).collect(),
        })
    }

    async fn search(
        &self,
        queries: Vec<(Species, Arc<FingerprintRecord>)>,
        exclude: Option<SubjectId>,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, MatchError> {
        let mut outcome = SearchOutcome::default();

        for (species, source) in queries {
            if cancel.is_cancelled() {
                return Err(MatchError::Cancelled);
            }

            let scan = self.store.scan(species).await?;
            let pass = ScoringPass {
                source,
                exclude: exclude.clone(),
                threshold,
                chunk_size: self.config.chunk_size.max(1),
                cancel: cancel.clone(),
            };

            let partial = tokio::task::spawn_blocking(move || pass.run(scan))
                .await
                .map_err(|e| MatchError::Worker(e.to_string()))??;
            outcome.merge(partial);
        }

        if !outcome.corrupt.is_empty() {
            log::warn!("{} unreadable records skipped", outcome.corrupt.len());
        }

        rank(&mut outcome.results);
        outcome.matches_found = outcome.results.len();
        if let Some(max) = self.config.max_results {
            outcome.results.truncate(max);
        }
        Ok(outcome)
    }
}

fn check_threshold(threshold: f64) -> Result<(), MatchError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(MatchError::InvalidThreshold(threshold))
    }
}
