//! Record file writer

use crate::error::FormatError;
use crate::format::FpFile;
use crate::record::FingerprintRecord;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use std::io::Write;
use std::path::Path;

pub struct FpWriter {
    pretty: bool,
}

impl FpWriter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indent the JSON output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Serialize a record with its checksum
    pub fn encode(&self, record: &FingerprintRecord) -> Result<Vec<u8>, FormatError> {
        let fp_file = FpFile::new(record.clone());
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&fp_file)?
        } else {
            serde_json::to_vec(&fp_file)?
        };
        Ok(bytes)
    }

    /// Write a record file.
    ///
    /// The bytes go to a temporary file in the target directory which is
    /// then renamed over `path`, so readers see the old or the new file.
    pub fn write(&self, path: &Path, record: &FingerprintRecord) -> Result<(), FormatError> {
        let bytes = self.encode(record)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .map_err(|e| match e {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
            })?;

        Ok(())
    }
}

impl Default for FpWriter {
    fn default() -> Self {
        Self::new()
    }
}
