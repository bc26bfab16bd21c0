use chrono::{DateTime, Utc};
use pawprint_fp::{FingerprintRecord, FormatError, SubjectId};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// A fingerprint row as stored in `pet_fingerprints`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRow {
    pub subject_id: String,
    pub species: String,
    pub lifecycle_status: String,
    pub generated_at: DateTime<Utc>,
    pub extractor_version: String,
    pub views: serde_json::Value,
}

impl FingerprintRow {
    /// Column order: subject_id, species, lifecycle_status, generated_at,
    /// extractor_version, views
    pub fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            subject_id: row.try_get(0)?,
            species: row.try_get(1)?,
            lifecycle_status: row.try_get(2)?,
            generated_at: row.try_get(3)?,
            extractor_version: row.try_get(4)?,
            views: row.try_get(5)?,
        })
    }

    /// Decode the row into a validated record
    pub fn into_record(self) -> Result<FingerprintRecord, FormatError> {
        let views = serde_json::from_value(self.views)?;
        let record = FingerprintRecord {
            subject_id: SubjectId::new(self.subject_id)?,
            species: self.species.parse()?,
            lifecycle_status: self.lifecycle_status,
            generated_at: self.generated_at,
            extractor_version: self.extractor_version,
            views,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Input structure for inserting or replacing a fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFingerprintRow {
    pub subject_id: String,
    pub species: String,
    pub lifecycle_status: String,
    pub generated_at: DateTime<Utc>,
    pub extractor_version: String,
    pub views: serde_json::Value,
}

impl NewFingerprintRow {
    pub fn from_record(record: &FingerprintRecord) -> Result<Self, FormatError> {
        Ok(Self {
            subject_id: record.subject_id.to_string(),
            species: record.species.to_string(),
            lifecycle_status: record.lifecycle_status.clone(),
            generated_at: record.generated_at,
            extractor_version: record.extractor_version.clone(),
            views: serde_json::to_value(&record.views)?,
        })
    }
}
