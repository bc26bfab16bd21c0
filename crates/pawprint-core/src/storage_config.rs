//! Configuration file for Pawprint
//!
//! TOML configuration selecting the storage backend (filesystem,
//! PostgreSQL or in-memory) together with extractor and matching parameters.

use crate::config::ExtractorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PawprintConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Keep scanned corpora in memory between searches
    #[serde(default = "default_cache")]
    pub cache: bool,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
}

fn default_cache() -> bool {
    true
}

/// Storage backend type
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    Postgresql,
    Memory,
}

/// Filesystem backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
        }
    }
}

fn default_base_directory() -> String {
    "./fingerprints".to_string()
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "pawprint".to_string()
}
fn default_user() -> String {
    "pawprint_user".to_string()
}
fn default_password() -> String {
    "pawprint_pass".to_string()
}
fn default_max_connections() -> u32 {
    10
}

/// Match search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Threshold used when the caller does not pass one
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Candidates scored per parallel batch; cancellation is checked between batches
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Truncate ranked results to this many entries
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            chunk_size: default_chunk_size(),
            max_results: None,
        }
    }
}

fn default_threshold() -> f64 {
    0.8
}
fn default_chunk_size() -> usize {
    256
}

impl MatchingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be > 0");
        }
        if !(0.0..=1.0).contains(&self.default_threshold) {
            anyhow::bail!("default_threshold must be within [0, 1]");
        }
        Ok(())
    }
}

impl PawprintConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: PawprintConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.extractor.validate()?;
        self.matching.validate()?;
        Ok(())
    }

    /// Get PostgreSQL connection string
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    pg.user, pg.password, pg.host, pg.port, pg.database
                ))
            }
            _ => None,
        }
    }

    fn with_backend(backend: StorageBackend) -> Self {
        Self {
            storage: StorageConfig {
                backend,
                cache: default_cache(),
                filesystem: FilesystemConfig::default(),
                postgresql: PostgresqlConfig::default(),
            },
            extractor: ExtractorConfig::default(),
            matching: MatchingConfig::default(),
        }
    }

    /// Create a default filesystem configuration
    pub fn default_filesystem() -> Self {
        Self::with_backend(StorageBackend::Filesystem)
    }

    /// Create a default PostgreSQL configuration
    pub fn default_postgresql() -> Self {
        Self::with_backend(StorageBackend::Postgresql)
    }
}
