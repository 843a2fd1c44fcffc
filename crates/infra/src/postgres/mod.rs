//! Postgres adapters.

mod trust;

pub use trust::PostgresTrustBackend;

use warden_core::Error;

/// Map a sqlx failure onto the warden error taxonomy.
///
/// Unique violations (`23505`) become `Conflict`; everything else is a
/// storage error tagged with the operation name.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => Error::conflict(msg),
                _ => Error::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            Error::storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            Error::storage(format!("connection pool timed out in {}", operation))
        }
        _ => Error::storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
