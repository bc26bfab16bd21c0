//! Fingerprint record data model
//!
//! A record binds one animal to a descriptor vector per required view.

use crate::error::FormatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const MAX_SUBJECT_ID_LEN: usize = 128;

/// Opaque animal identifier assigned by the animal registry.
///
/// The id doubles as a file stem, so only ASCII alphanumerics, `-`, `_`
/// and `.` are accepted and a leading `.` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Result<Self, FormatError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_SUBJECT_ID_LEN
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if valid {
            Ok(Self(id))
        } else {
            Err(FormatError::InvalidSubjectId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SubjectId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

/// Supported species. Each one selects a weight profile in the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::Dog, Species::Cat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dog" => Ok(Species::Dog),
            "cat" => Ok(Species::Cat),
            _ => Err(FormatError::UnsupportedSpecies(s.to_string())),
        }
    }
}

/// Photograph angle contributing its own descriptor vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Main,
    Face,
    Side,
    Fur,
}

/// Views every committed record must carry
pub const REQUIRED_VIEWS: [View; 4] = View::ALL;

impl View {
    pub const ALL: [View; 4] = [View::Main, View::Face, View::Side, View::Fur];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Main => "main",
            View::Face => "face",
            View::Side => "side",
            View::Fur => "fur",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(View::Main),
            "face" => Ok(View::Face),
            "side" => Ok(View::Side),
            "fur" => Ok(View::Fur),
            _ => Err(FormatError::UnknownView(s.to_string())),
        }
    }
}

/// Persisted visual signature of one animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub subject_id: SubjectId,
    pub species: Species,
    /// Caller supplied status such as "lost" or "found", never interpreted here
    pub lifecycle_status: String,
    pub generated_at: DateTime<Utc>,
    /// Version stamp of the extractor configuration that produced `views`
    pub extractor_version: String,
    pub views: BTreeMap<View, Vec<f32>>,
}

impl FingerprintRecord {
    /// Required views absent from this record, in `View::ALL` order
    pub fn missing_views(&self) -> Vec<View> {
        REQUIRED_VIEWS
            .iter()
            .filter(|view| !self.views.contains_key(view))
            .copied()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_views().is_empty()
    }

    /// Length shared by the view vectors, if any view is present
    pub fn vector_len(&self) -> Option<usize> {
        self.views.values().next().map(Vec::len)
    }

    /// Check the commit invariants: every required view present, uniform
    /// non-empty vector length, finite non-negative entries.
    pub fn validate(&self) -> Result<(), FormatError> {
        let missing = self.missing_views();
        if !missing.is_empty() {
            return Err(FormatError::InvalidRecord(format!(
                "missing views: {}",
                join_views(&missing)
            )));
        }

        let expected = self.vector_len().unwrap_or(0);
        if expected == 0 {
            return Err(FormatError::InvalidRecord("empty view vectors".to_string()));
        }

        for (view, vector) in &self.views {
            if vector.len() != expected {
                return Err(FormatError::InvalidRecord(format!(
                    "view {} has {} entries, expected {}",
                    view,
                    vector.len(),
                    expected
                )));
            }
            if vector.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(FormatError::InvalidRecord(format!(
                    "view {} contains negative or non-finite entries",
                    view
                )));
            }
        }

        Ok(())
    }
}

/// Comma separated view names, used in error messages
pub fn join_views(views: &[View]) -> String {
    views
        .iter()
        .map(View::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
