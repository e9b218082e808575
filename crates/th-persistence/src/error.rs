//! Maps `sqlx::Error` onto the storage error taxonomy defined in `th-core`.
//!
//! Mirrors the teacher's diesel-to-`PersistenceError` mapping, adapted to
//! sqlx's `DatabaseError::kind()` classification instead of diesel's
//! `DatabaseErrorKind` enum.

use sqlx::error::ErrorKind as DbErrorKind;
use th_core::StorageError;

pub fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StorageError::Unavailable(err.to_string()),
        sqlx::Error::Io(e) => StorageError::TransientIo(e.to_string()),
        sqlx::Error::Database(db_err) => match db_err.kind() {
            DbErrorKind::UniqueViolation => StorageError::UniqueViolation(db_err.message().to_string()),
            DbErrorKind::ForeignKeyViolation => StorageError::ForeignKeyViolation(db_err.message().to_string()),
            DbErrorKind::CheckViolation | DbErrorKind::NotNullViolation => StorageError::Validation(db_err.message().to_string()),
            _ => {
                if is_serialization_conflict(db_err.message()) {
                    StorageError::SerializationConflict
                } else {
                    StorageError::Unknown(db_err.message().to_string())
                }
            }
        },
        other => StorageError::Unknown(other.to_string()),
    }
}

fn is_serialization_conflict(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("deadlock") || lower.contains("could not serialize") || lower.contains("database is locked")
}
