//! Fingerprint generation
//!
//! Extracts one descriptor per required view and commits the assembled
//! record. Generation is all-or-nothing: a single absent or undecodable
//! view fails the call and nothing is written.

use chrono::Utc;
use pawprint_fp::{FingerprintRecord, Species, SubjectId, View, REQUIRED_VIEWS};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::GenerateError;
use crate::extract::FeatureExtractor;
use crate::storage_backend::FingerprintStore;

/// Fingerprint generator
pub struct FingerprintGenerator {
    extractor: FeatureExtractor,
    store: Arc<dyn FingerprintStore>,
}

impl FingerprintGenerator {
    pub fn new(extractor: FeatureExtractor, store: Arc<dyn FingerprintStore>) -> Self {
        Self { extractor, store }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Build a complete record without committing it
    pub fn build_record(
        &self,
        subject_id: SubjectId,
        species: Species,
        lifecycle_status: impl Into<String>,
        view_images: &HashMap<View, Vec<u8>>,
    ) -> Result<FingerprintRecord, GenerateError> {
        let extracted: Vec<(View, Option<Vec<f32>>)> = REQUIRED_VIEWS
            .par_iter()
            .map(|view| {
                let vector = view_images.get(view).and_then(|bytes| {
                    self.extractor
                        .extract(bytes)
                        .map_err(|e| {
                            log::warn!("Subject {}: {} view unusable: {}", subject_id, view, e);
                        })
                        .ok()
                });
                (*view, vector)
            })
            .collect();

        let mut views = BTreeMap::new();
        let mut missing = Vec::new();
        for (view, vector) in extracted {
            match vector {
                Some(vector) => {
                    views.insert(view, vector);
                }
                None => missing.push(view),
            }
        }

        if !missing.is_empty() {
            return Err(GenerateError::MissingViews { missing });
        }

        Ok(FingerprintRecord {
            subject_id,
            species,
            lifecycle_status: lifecycle_status.into(),
            generated_at: Utc::now(),
            extractor_version: self.extractor.version_stamp().to_string(),
            views,
        })
    }

    /// Generate a fingerprint and commit it, replacing any earlier record
    pub async fn generate(
        &self,
        subject_id: SubjectId,
        species: Species,
        lifecycle_status: impl Into<String>,
        view_images: &HashMap<View, Vec<u8>>,
    ) -> Result<FingerprintRecord, GenerateError> {
        let record = self.build_record(subject_id, species, lifecycle_status, view_images)?;
        self.store.put(&record).await?;

        log::info!(
            "Committed fingerprint {} ({}, {})",
            record.subject_id,
            record.species,
            record.lifecycle_status
        );
        Ok(record)
    }
}
