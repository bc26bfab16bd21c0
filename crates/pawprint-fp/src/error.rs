use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid subject id: {0:?}")]
    InvalidSubjectId(String),

    #[error("Unsupported species: {0}")]
    UnsupportedSpecies(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(String),

    #[error("Checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
