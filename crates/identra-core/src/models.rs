//! Domain models for the identity persistence layer.

pub mod account;
pub mod role;
