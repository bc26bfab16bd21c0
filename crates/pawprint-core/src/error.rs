use pawprint_fp::{join_views, FormatError, SubjectId, View};
use thiserror::Error;

/// Image bytes could not be turned into a descriptor
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Fingerprint not found: {0}")]
    NotFound(SubjectId),

    #[error("Refusing to store invalid record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record format error: {0}")]
    Format(#[from] FormatError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Database(format!("{:#}", e))
    }
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Missing or unreadable views: {}", join_views(.missing))]
    MissingViews { missing: Vec<View> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("No fingerprint for subject {0}")]
    NotFound(SubjectId),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error(transparent)]
    Store(StoreError),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Scoring worker failed: {0}")]
    Worker(String),
}

impl From<StoreError> for MatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => MatchError::NotFound(id),
            other => MatchError::Store(other),
        }
    }
}

/// A stored record that could not be read during a scan.
///
/// Reported alongside scan results instead of aborting the scan.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[error("Corrupt record at {location}: {reason}")]
pub struct CorruptRecord {
    /// File path or row key of the unreadable record
    pub location: String,
    pub reason: String,
}
