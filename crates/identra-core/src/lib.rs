//! Identra core: domain models and store contracts for the identity
//! persistence layer.
//!
//! This crate defines:
//! - Domain models ([`models::account::Account`], [`models::role::Role`]
//!   and the embedded collection types)
//! - Store contracts ([`store::AccountStore`], [`store::RoleStore`])
//! - The error taxonomy ([`error::StoreError`])
//!
//! Implementations of the store contracts live in the database crate.

pub mod error;
pub mod models;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::account::{Account, AuthToken, Claim, ExternalLogin};
pub use models::role::Role;
pub use store::{
    AccountFilter, AccountStore, PaginatedResult, Pagination, RoleStore, normalize_key,
};
