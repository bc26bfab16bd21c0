//! Pawprint Database Layer
//!
//! PostgreSQL storage of fingerprint records

pub mod connection;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use connection::{create_pool, ensure_schema, test_connection, DbPool};
pub use models::{FingerprintRow, NewFingerprintRow};
pub use operations::{
    count_by_species, delete_fingerprint, get_fingerprint, list_by_species, upsert_fingerprint,
};
