//! Error types for the identra store layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A delete or update targeted a document that does not exist.
    /// Lookups signal absence with `Ok(None)` instead of this variant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("duplicate key on {entity}: {id}")]
    DuplicateKey { entity: String, id: String },

    /// The compare-and-swap guard on update failed because another
    /// writer committed first. Retryable: re-read, re-apply, re-issue.
    #[error("concurrency conflict on {entity} {id}: stale concurrency stamp")]
    ConcurrencyConflict { entity: String, id: String },

    /// A role-membership add referenced a role that does not exist.
    /// Distinct from ordinary absence: this is a caller logic error.
    #[error("role does not exist: {name}")]
    RoleNotFound { name: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    /// The backing store could not be reached (transport or timeout).
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("backing store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
