use anyhow::{Context, Result};
use deadpool_postgres::Pool;

use crate::models::*;

const SELECT_COLUMNS: &str =
    "subject_id, species, lifecycle_status, generated_at, extractor_version, views";

/// Insert a fingerprint or replace the existing one for the same subject.
///
/// A single statement, so readers see either the old or the new row.
pub async fn upsert_fingerprint(pool: &Pool, row: &NewFingerprintRow) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            "INSERT INTO pet_fingerprints
             (subject_id, species, lifecycle_status, generated_at, extractor_version, views)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (subject_id) DO UPDATE SET
                 species = EXCLUDED.species,
                 lifecycle_status = EXCLUDED.lifecycle_status,
                 generated_at = EXCLUDED.generated_at,
                 extractor_version = EXCLUDED.extractor_version,
                 views = EXCLUDED.views",
            &[
                &row.subject_id,
                &row.species,
                &row.lifecycle_status,
                &row.generated_at,
                &row.extractor_version,
                &row.views,
            ],
        )
        .await
        .context("Failed to upsert fingerprint")?;

    Ok(())
}

/// Get a fingerprint row by subject id
pub async fn get_fingerprint(pool: &Pool, subject_id: &str) -> Result<Option<FingerprintRow>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {} FROM pet_fingerprints WHERE subject_id = $1", SELECT_COLUMNS),
            &[&subject_id],
        )
        .await
        .context("Failed to get fingerprint")?;

    row.map(|r| FingerprintRow::from_row(&r))
        .transpose()
        .context("Failed to read fingerprint row")
}

/// Delete a fingerprint, returning whether a row existed
pub async fn delete_fingerprint(pool: &Pool, subject_id: &str) -> Result<bool> {
    let client = pool.get().await?;

    let deleted = client
        .execute(
            "DELETE FROM pet_fingerprints WHERE subject_id = $1",
            &[&subject_id],
        )
        .await
        .context("Failed to delete fingerprint")?;

    Ok(deleted > 0)
}

/// All rows of one species ordered by subject id.
///
/// Rows whose columns cannot be read are returned as errors in place so
/// the caller can skip them.
pub async fn list_by_species(
    pool: &Pool,
    species: &str,
) -> Result<Vec<Result<FingerprintRow, (String, String)>>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            &format!(
                "SELECT {} FROM pet_fingerprints WHERE species = $1 ORDER BY subject_id",
                SELECT_COLUMNS
            ),
            &[&species],
        )
        .await
        .context("Failed to list fingerprints")?;

    Ok(rows
        .iter()
        .map(|r| {
            FingerprintRow::from_row(r).map_err(|e| {
                let subject_id = r
                    .try_get::<_, String>(0)
                    .unwrap_or_else(|_| "<unreadable>".to_string());
                (subject_id, e.to_string())
            })
        })
        .collect())
}

/// Number of fingerprints of one species
pub async fn count_by_species(pool: &Pool, species: &str) -> Result<usize> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "SELECT COUNT(*) FROM pet_fingerprints WHERE species = $1",
            &[&species],
        )
        .await
        .context("Failed to count fingerprints")?;

    let count: i64 = row.get(0);
    Ok(count.max(0) as usize)
}
