//! Identra DB: SurrealDB-backed persistence for the identity layer.
//!
//! This crate provides:
//! - Connection management ([`StoreManager`], [`StoreConfig`])
//! - Collection and index setup ([`run_migrations`])
//! - Store implementations ([`repository::SurrealAccountStore`],
//!   [`repository::SurrealRoleStore`])
//! - Database error types ([`DbError`])

mod connection;
mod error;
mod schema;

pub mod repository;

pub use connection::{StoreConfig, StoreManager};
pub use error::DbError;
pub use schema::run_migrations;
