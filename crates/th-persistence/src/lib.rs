//! th-persistence: the storage backend behind the Persistence Handler
//! contract (§4.2), backed by `sqlx::Any` so the same queries run against
//! SQLite and PostgreSQL.

pub mod error;
pub mod handler;
pub mod migrations;
pub mod models;

pub use error::map_sqlx_error;
pub use handler::{DlqInput, GcCounts, PersistenceHandler, SqlPersistence, TranslationUpdate};
pub use migrations::{connect_any, run_migrations};
