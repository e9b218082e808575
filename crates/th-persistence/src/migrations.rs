//! Embedded SQL migrations, applied in ascending order and recorded in
//! `th_meta` under the `schema_version` key (§6 Migrations).
//!
//! Embedding via `include_str!` (rather than reading `migrations/` off disk
//! at runtime, as the teacher's root `src/migrations/mod.rs` does) keeps a
//! deployed binary self-contained.

use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Executor, Row};
use tracing::info;

use crate::error::map_sqlx_error;
use th_core::StorageError;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration { version: "0001_init", sql: include_str!("../migrations/0001_init.sql") }];

/// Applies every migration with a version greater than the one recorded in
/// `th_meta`. Idempotent: running it twice against an up-to-date database
/// is a no-op. Suitable both for implicit startup use and an explicit
/// `db migrate` entrypoint.
pub async fn run_migrations(pool: &AnyPool) -> Result<(), StorageError> {
    pool.execute("CREATE TABLE IF NOT EXISTS th_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)").await.map_err(map_sqlx_error)?;

    let current: Option<String> = sqlx::query("SELECT value FROM th_meta WHERE key = 'schema_version'")
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?
        .map(|row| row.get::<String, _>("value"));

    for migration in MIGRATIONS {
        if current.as_deref().map(|v| v >= migration.version).unwrap_or(false) {
            continue;
        }
        info!(version = migration.version, "applying migration");
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        for statement in split_statements(migration.sql) {
            tx.execute(statement).await.map_err(map_sqlx_error)?;
        }
        sqlx::query("INSERT INTO th_meta (key, value) VALUES ('schema_version', ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
    }
    Ok(())
}

fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty() && !s.starts_with("--"))
}

pub async fn connect_any(database_url: &str) -> Result<AnyPool, StorageError> {
    sqlx::any::install_default_drivers();
    // An in-memory SQLite database is private to the connection that created
    // it, so a pool of more than one connection would see each other's
    // schema as missing; cap the pool at a single connection in that case.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };
    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        // SQLite enforces foreign keys (and therefore ON DELETE CASCADE) per
        // connection, off by default; Postgres has no such pragma and
        // rejects it, so the attempt is best-effort and its result ignored.
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = conn.execute("PRAGMA foreign_keys = ON").await;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .map_err(map_sqlx_error)?;
    Ok(pool)
}
