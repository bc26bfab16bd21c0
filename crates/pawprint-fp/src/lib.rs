//! Pawprint fingerprint record model and file format library

pub mod error;
pub mod format;
pub mod reader;
pub mod record;
pub mod writer;

pub use error::FormatError;
pub use format::{compute_checksum, FpFile, FILE_EXTENSION, FORMAT_VERSION};
pub use reader::FpReader;
pub use record::{join_views, FingerprintRecord, Species, SubjectId, View, REQUIRED_VIEWS};
pub use writer::FpWriter;
