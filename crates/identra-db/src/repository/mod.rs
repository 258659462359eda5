//! SurrealDB repository implementations.

mod account;
mod role;

pub use account::SurrealAccountStore;
pub use role::SurrealRoleStore;
