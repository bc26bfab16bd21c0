//! Record file reader

use crate::error::FormatError;
use crate::format::FpFile;
use crate::record::FingerprintRecord;
use std::path::Path;

pub struct FpReader;

impl FpReader {
    /// Read and verify a record file
    pub fn read(path: &Path) -> Result<FingerprintRecord, FormatError> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Parse and verify record bytes
    pub fn decode(bytes: &[u8]) -> Result<FingerprintRecord, FormatError> {
        let fp_file: FpFile = serde_json::from_slice(bytes)?;
        fp_file.verify()
    }
}
