//! The Persistence Handler contract (§4.2) and its sqlx-backed implementation.
//!
//! One implementation, `SqlPersistence`, serves both SQLite and PostgreSQL
//! through `sqlx::Any` — the query text below avoids anything backend
//! specific (no `RETURNING`-only tricks, no `FOR UPDATE SKIP LOCKED`) so the
//! same statements run unmodified against either driver. `claim_pending_batch`
//! additionally serializes through an in-process `tokio::sync::Mutex`, which
//! is the portable equivalent of the teacher's single-writer discipline; true
//! multi-process Postgres concurrency would still want `FOR UPDATE SKIP
//! LOCKED`, left as a backend-specific optimization (see DESIGN.md).

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use sqlx::{AnyPool, Row};
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

use th_core::{context_hash as compute_context_hash, StorageError};
use th_types::{ContentItem, TranslationResult, TranslationStatus};

use crate::error::map_sqlx_error;
use crate::models::{ClaimedRow, TranslationJoinRow};

#[derive(Debug, Clone, Default)]
pub struct GcCounts {
    pub deleted_jobs: u64,
    pub deleted_content: u64,
    pub deleted_translations: u64,
}

/// Input to `save_results`: an update to one already-claimed translation row.
/// Keeps `translation_id` alongside the public `TranslationResult` fields
/// the DTO itself doesn't carry (the DTO is coordinator/cache facing, not a
/// persistence row key).
#[derive(Debug, Clone)]
pub struct TranslationUpdate {
    pub translation_id: String,
    pub status: TranslationStatus,
    pub translated_text: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DlqInput {
    pub translation_id: Option<String>,
    pub original_payload: Value,
    pub context_payload: Option<Value>,
    pub target_lang_code: String,
    pub last_error_message: String,
    pub engine_name: Option<String>,
    pub engine_version: Option<String>,
}

#[async_trait]
pub trait PersistenceHandler: Send + Sync {
    async fn connect(&self) -> Result<(), StorageError>;
    async fn close(&self) -> Result<(), StorageError>;

    async fn upsert_content(&self, business_id: &str, source_payload: &Value) -> Result<String, StorageError>;
    async fn ensure_context(&self, context_payload: Option<&Value>) -> Result<Option<String>, StorageError>;
    async fn ensure_pending_translations(&self, content_id: &str, context_id: Option<&str>, target_langs: &[String], source_lang: Option<&str>, force: bool) -> Result<u64, StorageError>;
    async fn touch_job(&self, content_id: &str) -> Result<(), StorageError>;

    async fn claim_pending_batch(&self, lang_code: &str, batch_size: u32, include_failed: bool) -> Result<Vec<ContentItem>, StorageError>;
    async fn save_results(&self, results: &[TranslationUpdate]) -> Result<(), StorageError>;
    async fn move_to_dlq(&self, entry: DlqInput) -> Result<(), StorageError>;

    async fn get_translation(&self, business_id: &str, lang_code: &str, context_payload: Option<&Value>) -> Result<Option<TranslationResult>, StorageError>;
    async fn garbage_collect(&self, retention_days: i64, dry_run: bool) -> Result<GcCounts, StorageError>;
    async fn recover_stale_translating(&self, older_than_seconds: i64) -> Result<u64, StorageError>;
}

pub struct SqlPersistence {
    pool: AnyPool,
    claim_lock: Mutex<()>,
}

impl SqlPersistence {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool, claim_lock: Mutex::new(()) }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Appends one row to the optional audit trail (§3, §6 `th_audit_logs`).
    /// Best-effort: a failure here is logged, not propagated, since the
    /// audit log is a diagnostic aid, not the source of truth.
    async fn write_audit_log(&self, event_type: &str, table_name: &str, record_id: &str, details: &Value) {
        let id = Uuid::new_v4().to_string();
        let event_id = Uuid::new_v4().to_string();
        let now = now_iso();
        let details_json = serde_json::to_string(details).unwrap_or_default();
        if let Err(err) = sqlx::query("INSERT INTO th_audit_logs (id, event_id, event_type, table_name, record_id, timestamp, details_json) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(&event_id)
            .bind(event_type)
            .bind(table_name)
            .bind(record_id)
            .bind(&now)
            .bind(&details_json)
            .execute(&self.pool)
            .await
        {
            warn!(error = %err, event_type, "failed to write audit log entry");
        }
    }

    async fn claim_pending_batch_once(&self, lang_code: &str, batch_size: u32, include_failed: bool) -> Result<Vec<ContentItem>, StorageError> {
        let _guard = self.claim_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let rows = sqlx::query(
            "SELECT id FROM th_translations WHERE lang_code = ? AND (status = 'PENDING' OR (? AND status = 'FAILED')) ORDER BY last_updated_at ASC LIMIT ?",
        )
        .bind(lang_code)
        .bind(include_failed)
        .bind(batch_size as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<String> = rows.into_iter().map(|r| r.get::<String, _>("id")).collect();
        if ids.is_empty() {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(Vec::new());
        }

        let now = now_iso();
        for id in &ids {
            sqlx::query("UPDATE th_translations SET status = 'TRANSLATING', last_updated_at = ? WHERE id = ? AND (status = 'PENDING' OR (? AND status = 'FAILED'))")
                .bind(&now)
                .bind(id)
                .bind(include_failed)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query_str = format!(
            "SELECT t.id as id, t.content_id as content_id, t.context_id as context_id, \
                    c.business_id as business_id, c.source_payload_json as source_payload_json, \
                    COALESCE(ctx.context_hash, '__GLOBAL__') as context_hash, ctx.context_payload_json as context_payload_json, \
                    t.lang_code as lang_code, t.source_lang as source_lang \
             FROM th_translations t \
             JOIN th_content c ON c.id = t.content_id \
             LEFT JOIN th_contexts ctx ON ctx.id = t.context_id \
             WHERE t.id IN ({placeholders})"
        );
        let mut q = sqlx::query_as::<_, ClaimedRow>(&query_str);
        for id in &ids {
            q = q.bind(id);
        }
        let claimed = q.fetch_all(&mut *tx).await.map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(claimed.into_iter().map(ClaimedRow::into_content_item).collect())
    }

    async fn save_results_once(&self, results: &[TranslationUpdate]) -> Result<(), StorageError> {
        if results.is_empty() {
            return Ok(());
        }
        let now = now_iso();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for update in results {
            let payload_json = update.translated_text.as_ref().map(|text| serde_json::json!({ "text": text }).to_string());
            sqlx::query(
                "UPDATE th_translations SET status = ?, translation_payload_json = ?, engine = ?, engine_version = ?, error = ?, last_updated_at = ? WHERE id = ?",
            )
            .bind(update.status.as_db_str())
            .bind(&payload_json)
            .bind(&update.engine)
            .bind(&update.engine_version)
            .bind(&update.error)
            .bind(&now)
            .bind(&update.translation_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        for update in results {
            self.write_audit_log(
                "translation_status_changed",
                "th_translations",
                &update.translation_id,
                &serde_json::json!({ "status": update.status.as_db_str(), "engine": update.engine }),
            )
            .await;
        }
        Ok(())
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl PersistenceHandler for SqlPersistence {
    async fn connect(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }

    #[instrument(skip(self, source_payload))]
    async fn upsert_content(&self, business_id: &str, source_payload: &Value) -> Result<String, StorageError> {
        let payload_json = serde_json::to_string(source_payload).map_err(|e| StorageError::Validation(e.to_string()))?;
        let now = now_iso();
        let new_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO th_content (id, business_id, source_payload_json, created_at, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(business_id) DO UPDATE SET source_payload_json = excluded.source_payload_json, updated_at = excluded.updated_at \
             WHERE th_content.source_payload_json <> excluded.source_payload_json",
        )
        .bind(&new_id)
        .bind(business_id)
        .bind(&payload_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query("SELECT id FROM th_content WHERE business_id = ?").bind(business_id).fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        let content_id: String = row.get("id");
        self.write_audit_log("content_upserted", "th_content", &content_id, &serde_json::json!({ "business_id": business_id })).await;
        Ok(content_id)
    }

    async fn ensure_context(&self, context_payload: Option<&Value>) -> Result<Option<String>, StorageError> {
        let hash = compute_context_hash(context_payload);
        if hash == th_types::GLOBAL_CONTEXT_SENTINEL {
            return Ok(None);
        }
        let payload_json = context_payload.map(|v| serde_json::to_string(v).unwrap_or_default());
        let new_id = Uuid::new_v4().to_string();
        let now = now_iso();

        sqlx::query("INSERT INTO th_contexts (id, context_hash, context_payload_json, created_at) VALUES (?, ?, ?, ?) ON CONFLICT(context_hash) DO NOTHING")
            .bind(&new_id)
            .bind(&hash)
            .bind(&payload_json)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let row = sqlx::query("SELECT id FROM th_contexts WHERE context_hash = ?").bind(&hash).fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(Some(row.get::<String, _>("id")))
    }

    async fn ensure_pending_translations(&self, content_id: &str, context_id: Option<&str>, target_langs: &[String], source_lang: Option<&str>, force: bool) -> Result<u64, StorageError> {
        let now = now_iso();
        let mut inserted_or_reopened: u64 = 0;

        for lang in target_langs {
            let id = Uuid::new_v4().to_string();
            let result = if let Some(ctx) = context_id {
                sqlx::query(
                    "INSERT INTO th_translations (id, content_id, context_id, lang_code, source_lang, status, created_at, last_updated_at) \
                     VALUES (?, ?, ?, ?, ?, 'PENDING', ?, ?) \
                     ON CONFLICT(content_id, context_id, lang_code) WHERE context_id IS NOT NULL \
                     DO UPDATE SET status = 'PENDING', translation_payload_json = NULL, error = NULL, last_updated_at = excluded.last_updated_at \
                     WHERE ? OR th_translations.status = 'FAILED'",
                )
                .bind(&id)
                .bind(content_id)
                .bind(ctx)
                .bind(lang)
                .bind(source_lang)
                .bind(&now)
                .bind(&now)
                .bind(force)
                .execute(&self.pool)
                .await
            } else {
                sqlx::query(
                    "INSERT INTO th_translations (id, content_id, context_id, lang_code, source_lang, status, created_at, last_updated_at) \
                     VALUES (?, ?, NULL, ?, ?, 'PENDING', ?, ?) \
                     ON CONFLICT(content_id, lang_code) WHERE context_id IS NULL \
                     DO UPDATE SET status = 'PENDING', translation_payload_json = NULL, error = NULL, last_updated_at = excluded.last_updated_at \
                     WHERE ? OR th_translations.status = 'FAILED'",
                )
                .bind(&id)
                .bind(content_id)
                .bind(lang)
                .bind(source_lang)
                .bind(&now)
                .bind(&now)
                .bind(force)
                .execute(&self.pool)
                .await
            };
            let result = result.map_err(map_sqlx_error)?;
            inserted_or_reopened += result.rows_affected();
        }
        Ok(inserted_or_reopened)
    }

    async fn touch_job(&self, content_id: &str) -> Result<(), StorageError> {
        let now = now_iso();
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO th_jobs (id, content_id, last_requested_at) VALUES (?, ?, ?) \
             ON CONFLICT(content_id) DO UPDATE SET last_requested_at = excluded.last_requested_at",
        )
        .bind(&id)
        .bind(content_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn claim_pending_batch(&self, lang_code: &str, batch_size: u32, include_failed: bool) -> Result<Vec<ContentItem>, StorageError> {
        match self.claim_pending_batch_once(lang_code, batch_size, include_failed).await {
            Err(err) if err.transient() => {
                warn!(error = %err, "transient storage error on claim_pending_batch, retrying once");
                self.claim_pending_batch_once(lang_code, batch_size, include_failed).await
            }
            other => other,
        }
    }

    async fn save_results(&self, results: &[TranslationUpdate]) -> Result<(), StorageError> {
        match self.save_results_once(results).await {
            Err(err) if err.transient() => {
                warn!(error = %err, "transient storage error on save_results, retrying once");
                self.save_results_once(results).await
            }
            other => other,
        }
    }

    async fn move_to_dlq(&self, entry: DlqInput) -> Result<(), StorageError> {
        let id = Uuid::new_v4().to_string();
        let now = now_iso();
        let original_json = serde_json::to_string(&entry.original_payload).map_err(|e| StorageError::Validation(e.to_string()))?;
        let context_json = entry.context_payload.as_ref().map(|v| serde_json::to_string(v).unwrap_or_default());
        sqlx::query(
            "INSERT INTO th_dead_letter_queue (id, translation_id, original_payload_json, context_payload_json, target_lang_code, last_error_message, failed_at, engine_name, engine_version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.translation_id)
        .bind(&original_json)
        .bind(&context_json)
        .bind(&entry.target_lang_code)
        .bind(&entry.last_error_message)
        .bind(&now)
        .bind(&entry.engine_name)
        .bind(&entry.engine_version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        self.write_audit_log(
            "moved_to_dlq",
            "th_dead_letter_queue",
            &id,
            &serde_json::json!({ "translation_id": entry.translation_id, "last_error_message": entry.last_error_message }),
        )
        .await;
        Ok(())
    }

    async fn get_translation(&self, business_id: &str, lang_code: &str, context_payload: Option<&Value>) -> Result<Option<TranslationResult>, StorageError> {
        let hash = compute_context_hash(context_payload);
        let row = sqlx::query_as::<_, TranslationJoinRow>(
            "SELECT t.id as id, c.business_id as business_id, c.source_payload_json as source_payload_json, \
                    t.lang_code as lang_code, t.status as status, t.translation_payload_json as translation_payload_json, \
                    t.engine as engine, t.engine_version as engine_version, t.error as error, \
                    COALESCE(ctx.context_hash, '__GLOBAL__') as context_hash \
             FROM th_translations t \
             JOIN th_content c ON c.id = t.content_id \
             LEFT JOIN th_contexts ctx ON ctx.id = t.context_id \
             WHERE c.business_id = ? AND t.lang_code = ? AND COALESCE(ctx.context_hash, '__GLOBAL__') = ?",
        )
        .bind(business_id)
        .bind(lang_code)
        .bind(&hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TranslationJoinRow::into_translation_result))
    }

    #[instrument(skip(self))]
    async fn garbage_collect(&self, retention_days: i64, dry_run: bool) -> Result<GcCounts, StorageError> {
        let cutoff = (Utc::now() - ChronoDuration::days(retention_days)).format("%Y-%m-%d").to_string();

        let deleted_jobs: i64 = sqlx::query("SELECT COUNT(*) as n FROM th_jobs WHERE substr(last_requested_at, 1, 10) < ?")
            .bind(&cutoff)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .get("n");

        // Content is orphaned once its only job reference is gone. Evaluate
        // that against the post-job-deletion state up front (a LEFT JOIN
        // treating the about-to-be-pruned job rows as already absent) so a
        // dry run reports exactly what a following real run would delete,
        // rather than seeing the still-live stale job and under-counting.
        let orphan_ids_rows = sqlx::query(
            "SELECT c.id as id FROM th_content c \
             LEFT JOIN th_jobs j ON j.content_id = c.id \
             WHERE j.content_id IS NULL OR substr(j.last_requested_at, 1, 10) < ?",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        let orphan_ids: Vec<String> = orphan_ids_rows.into_iter().map(|r| r.get::<String, _>("id")).collect();
        let deleted_content = orphan_ids.len() as u64;

        let deleted_translations: i64 = if orphan_ids.is_empty() {
            0
        } else {
            let placeholders = vec!["?"; orphan_ids.len()].join(", ");
            let query_str = format!("SELECT COUNT(*) as n FROM th_translations WHERE content_id IN ({placeholders})");
            let mut q = sqlx::query(&query_str);
            for id in &orphan_ids {
                q = q.bind(id);
            }
            q.fetch_one(&self.pool).await.map_err(map_sqlx_error)?.get("n")
        };

        if !dry_run {
            sqlx::query("DELETE FROM th_jobs WHERE substr(last_requested_at, 1, 10) < ?").bind(&cutoff).execute(&self.pool).await.map_err(map_sqlx_error)?;
            // th_translations and th_contexts rows cascade from this delete
            // (ON DELETE CASCADE, §3); the counts above were captured before
            // the delete since cascaded row counts aren't reported back.
            for id in &orphan_ids {
                sqlx::query("DELETE FROM th_content WHERE id = ?").bind(id).execute(&self.pool).await.map_err(map_sqlx_error)?;
            }
        }

        Ok(GcCounts { deleted_jobs: deleted_jobs as u64, deleted_content, deleted_translations: deleted_translations as u64 })
    }

    async fn recover_stale_translating(&self, older_than_seconds: i64) -> Result<u64, StorageError> {
        let cutoff = (Utc::now() - ChronoDuration::seconds(older_than_seconds)).to_rfc3339();
        let now = now_iso();
        let result = sqlx::query("UPDATE th_translations SET status = 'PENDING', last_updated_at = ? WHERE status = 'TRANSLATING' AND last_updated_at < ?")
            .bind(&now)
            .bind(&cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let n = result.rows_affected();
        if n > 0 {
            warn!(recovered = n, "reset stale TRANSLATING rows back to PENDING");
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::migrations::{connect_any, run_migrations};
    use serde_json::json;

    async fn test_pool() -> AnyPool {
        let pool = connect_any("sqlite::memory:").await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    async fn upsert_content_is_idempotent_by_business_id() {
        let pool = test_pool().await;
        let handler = SqlPersistence::new(pool);
        let id1 = handler.upsert_content("biz-1", &json!({"text": "hello"})).await.unwrap();
        let id2 = handler.upsert_content("biz-1", &json!({"text": "hello"})).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn ensure_context_returns_none_for_global() {
        let pool = test_pool().await;
        let handler = SqlPersistence::new(pool);
        assert_eq!(handler.ensure_context(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn claim_batch_marks_rows_translating_and_does_not_reclaim() {
        let pool = test_pool().await;
        let handler = SqlPersistence::new(pool);
        let content_id = handler.upsert_content("biz-2", &json!({"text": "hi"})).await.unwrap();
        handler.ensure_pending_translations(&content_id, None, &["fr".to_string()], None, false).await.unwrap();

        let batch = handler.claim_pending_batch("fr", 10, false).await.unwrap();
        assert_eq!(batch.len(), 1);

        let second = handler.claim_pending_batch("fr", 10, false).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn concurrent_claims_never_observe_the_same_row() {
        let pool = test_pool().await;
        let handler = Arc::new(SqlPersistence::new(pool));
        for i in 0..8 {
            let content_id = handler.upsert_content(&format!("biz-concurrent-{i}"), &json!({"text": "hi"})).await.unwrap();
            handler.ensure_pending_translations(&content_id, None, &["fr".to_string()], None, false).await.unwrap();
        }

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let h = handler.clone();
            tasks.push(tokio::spawn(async move { h.claim_pending_batch("fr", 2, false).await.unwrap() }));
        }

        let mut seen_translation_ids = std::collections::HashSet::new();
        let mut total_claimed = 0;
        for task in tasks {
            let claimed = task.await.expect("claimer task panicked");
            for item in &claimed {
                assert!(seen_translation_ids.insert(item.translation_id.clone()), "two concurrent claimers observed the same row as TRANSLATING");
            }
            total_claimed += claimed.len();
        }
        assert_eq!(total_claimed, 8, "every pending row should be claimed exactly once across all concurrent claimers");
    }

    #[tokio::test]
    async fn garbage_collect_dry_run_does_not_mutate() {
        let pool = test_pool().await;
        let handler = SqlPersistence::new(pool);
        handler.upsert_content("biz-3", &json!({"text": "hi"})).await.unwrap();
        let counts = handler.garbage_collect(0, true).await.unwrap();
        assert_eq!(counts.deleted_content, 1);
        let counts_again = handler.garbage_collect(0, true).await.unwrap();
        assert_eq!(counts_again.deleted_content, 1);
    }
}
