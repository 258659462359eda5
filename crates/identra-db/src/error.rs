//! Database-specific error types and conversions.

use thiserror::Error;

use identra_core::error::StoreError;

/// Database-layer error type.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Surreal(e) if is_transport(&e) => StoreError::Unavailable(e.to_string()),
            DbError::Surreal(e) => StoreError::Backend(e.to_string()),
            DbError::Migration(msg) => StoreError::Backend(msg),
        }
    }
}

/// Client-side driver failures (connection, protocol, row handling) as
/// opposed to statement errors reported by the database itself. The
/// split is approximate: the driver folds several failure kinds into
/// its API error.
fn is_transport(err: &surrealdb::Error) -> bool {
    matches!(err, surrealdb::Error::Api(_))
}

/// True when the driver reports an insert hitting an existing record
/// id. Remote engines stringify statement errors, so the message is
/// matched as a fallback.
pub(crate) fn is_record_exists(err: &surrealdb::Error) -> bool {
    matches!(
        err,
        surrealdb::Error::Db(surrealdb::error::Db::RecordExists { .. })
    ) || err.to_string().contains("already exists")
}
