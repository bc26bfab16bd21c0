//! Search statistics
//!
//! The record an analytics collaborator may store after each search. The
//! engine only builds it; persisting it is up to the caller.

use chrono::{DateTime, Utc};
use pawprint_fp::SubjectId;
use serde::Serialize;

use crate::matching::SearchOutcome;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStatistics {
    /// `None` for searches by query image
    pub source_subject_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub threshold: f64,
    pub candidate_count_scanned: usize,
    pub matches_found: usize,
    pub highest_score: Option<f64>,
    /// The search ran to completion, whether or not anything matched
    pub succeeded: bool,
}

impl SearchStatistics {
    pub fn from_outcome(source: Option<&SubjectId>, threshold: f64, outcome: &SearchOutcome) -> Self {
        Self {
            source_subject_id: source.map(SubjectId::to_string),
            timestamp: Utc::now(),
            threshold,
            candidate_count_scanned: outcome.candidates_scanned,
            matches_found: outcome.matches_found,
            highest_score: outcome.highest_score(),
            succeeded: true,
        }
    }

    pub fn failed(source: Option<&SubjectId>, threshold: f64) -> Self {
        Self {
            source_subject_id: source.map(SubjectId::to_string),
            timestamp: Utc::now(),
            threshold,
            candidate_count_scanned: 0,
            matches_found: 0,
            highest_score: None,
            succeeded: false,
        }
    }
}
