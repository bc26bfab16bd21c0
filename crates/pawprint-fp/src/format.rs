//! Record file structure
//!
//! One JSON document per record: the record fields at top level plus a
//! format version and a CRC-64 checksum over the record contents.

use crate::error::FormatError;
use crate::record::FingerprintRecord;
use crc::{Crc, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};

/// Current format version
pub const FORMAT_VERSION: &str = "1.0";

/// File extension used by record files
pub const FILE_EXTENSION: &str = "json";

const CHECKSUM: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Complete record file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpFile {
    pub format_version: String,
    pub checksum: u64,
    #[serde(flatten)]
    pub record: FingerprintRecord,
}

impl FpFile {
    pub fn new(record: FingerprintRecord) -> Self {
        let checksum = compute_checksum(&record);
        Self {
            format_version: FORMAT_VERSION.to_string(),
            checksum,
            record,
        }
    }

    /// Check version and checksum, returning the record on success
    pub fn verify(self) -> Result<FingerprintRecord, FormatError> {
        if self.format_version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(self.format_version));
        }

        let computed = compute_checksum(&self.record);
        if computed != self.checksum {
            return Err(FormatError::ChecksumMismatch {
                stored: self.checksum,
                computed,
            });
        }

        Ok(self.record)
    }
}

/// CRC-64 over the canonical byte layout of a record
pub fn compute_checksum(record: &FingerprintRecord) -> u64 {
    let mut digest = CHECKSUM.digest();

    update_str(&mut digest, record.subject_id.as_str());
    update_str(&mut digest, record.species.as_str());
    update_str(&mut digest, &record.lifecycle_status);
    digest.update(&record.generated_at.timestamp().to_le_bytes());
    digest.update(&record.generated_at.timestamp_subsec_nanos().to_le_bytes());
    update_str(&mut digest, &record.extractor_version);

    for (view, vector) in &record.views {
        update_str(&mut digest, view.as_str());
        digest.update(&(vector.len() as u64).to_le_bytes());
        for value in vector {
            digest.update(&value.to_le_bytes());
        }
    }

    digest.finalize()
}

// Length prefix keeps adjacent strings from aliasing
fn update_str(digest: &mut crc::Digest<'_, u64>, value: &str) {
    digest.update(&(value.len() as u64).to_le_bytes());
    digest.update(value.as_bytes());
}
