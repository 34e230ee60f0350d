//! Upload row operations.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, UploadLedger};
use super::types::{UploadId, UploadState, UploadSummary};
use crate::upload::UploadManifest;

fn summary_from_row(row: &SqliteRow) -> UploadSummary {
    let state_str: String = row.get("state");
    UploadSummary {
        id: row.get("id"),
        source: row.get("source"),
        destination: row.get("destination"),
        state: UploadState::from_str(&state_str),
        total_files: row.get("total_files"),
        part_count: row.get("part_count"),
        parts_sent: row.get("parts_sent"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl UploadLedger {
    /// Insert a running upload. Counts are filled in by [`UploadLedger::set_plan`]
    /// once the tree has been partitioned.
    pub async fn record_start(&self, source: &str, destination: &str) -> Result<UploadId> {
        let now = unix_timestamp();
        let id = sqlx::query(
            r#"
            INSERT INTO uploads (source, destination, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(source)
        .bind(destination)
        .bind(UploadState::Running.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn set_plan(&self, id: UploadId, total_files: usize, part_count: usize) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE uploads
            SET total_files = ?1, part_count = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(total_files as i64)
        .bind(part_count as i64)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record that part `index` reached the remote. Parts go in order, so the
    /// sent count is `index + 1`; it never decreases.
    pub async fn mark_part_sent(&self, id: UploadId, index: usize) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE uploads
            SET parts_sent = MAX(parts_sent, ?1), updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(index as i64 + 1)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Successful end: store the manifest that was written to the remote.
    pub async fn finish_completed(&self, id: UploadId, manifest: &UploadManifest) -> Result<()> {
        let json = serde_json::to_string(manifest)?;
        sqlx::query(
            r#"
            UPDATE uploads
            SET state = ?1, parts_sent = ?2, part_count = ?2, total_files = ?3,
                manifest_json = ?4, last_error = NULL, updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(UploadState::Completed.as_str())
        .bind(manifest.parts.len() as i64)
        .bind(manifest.total_file_count as i64)
        .bind(json)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Unsuccessful end (`Failed` or `Cancelled`). Sent parts are left as recorded.
    pub async fn finish_unsuccessful(&self, id: UploadId, state: UploadState, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE uploads
            SET state = ?1, last_error = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(state.as_str())
        .bind(error)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Uploads left `running` by a process that died are marked failed.
    /// Returns how many rows changed.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE uploads
            SET state = ?1, last_error = 'interrupted', updated_at = ?2
            WHERE state = ?3
            "#,
        )
        .bind(UploadState::Failed.as_str())
        .bind(unix_timestamp())
        .bind(UploadState::Running.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    /// All uploads, newest first.
    pub async fn list_uploads(&self) -> Result<Vec<UploadSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, destination, total_files, part_count, parts_sent,
                   state, last_error, created_at, updated_at
            FROM uploads
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(summary_from_row).collect())
    }

    pub async fn get_upload(&self, id: UploadId) -> Result<Option<UploadSummary>> {
        let row = sqlx::query(
            r#"
            SELECT id, source, destination, total_files, part_count, parts_sent,
                   state, last_error, created_at, updated_at
            FROM uploads
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(summary_from_row))
    }

    /// Manifest of a completed upload.
    pub async fn get_manifest(&self, id: UploadId) -> Result<Option<UploadManifest>> {
        let json = sqlx::query_scalar::<_, Option<String>>("SELECT manifest_json FROM uploads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .flatten();
        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }
}
