//! Database connection management

use anyhow::Context;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

pub type DbPool = Pool;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pet_fingerprints (
    subject_id        TEXT PRIMARY KEY,
    species           TEXT NOT NULL,
    lifecycle_status  TEXT NOT NULL,
    generated_at      TIMESTAMPTZ NOT NULL,
    extractor_version TEXT NOT NULL,
    views             JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS pet_fingerprints_species_idx
    ON pet_fingerprints (species, subject_id);
";

/// Create a PostgreSQL connection pool
pub fn create_pool(
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
    max_connections: u32,
) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(host.to_string());
    cfg.port = Some(port);
    cfg.dbname = Some(database.to_string());
    cfg.user = Some(user.to_string());
    cfg.password = Some(password.to_string());
    cfg.pool = Some(PoolConfig::new(max_connections.max(1) as usize));

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1 as test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        Ok(())
    } else {
        anyhow::bail!("Database connection test failed")
    }
}

/// Create the fingerprint table if it does not exist yet
pub async fn ensure_schema(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    client
        .batch_execute(SCHEMA)
        .await
        .context("Failed to create fingerprint schema")?;
    log::debug!("Fingerprint schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires PostgreSQL to be running
    async fn test_create_pool() {
        let pool = create_pool(
            "localhost",
            5432,
            "pawprint",
            "pawprint_user",
            "pawprint_pass",
            10,
        )
        .unwrap();
        assert!(test_connection(&pool).await.is_ok());
        assert!(ensure_schema(&pool).await.is_ok());
    }
}
