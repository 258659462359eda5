//! Role domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::normalize_key;

/// A named role referenced by account memberships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Assigned once at creation and persisted as the store's record
    /// key rather than as a document field. Reads project the key back
    /// in under the `record_id` alias.
    #[serde(rename = "record_id", default, skip_serializing)]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    /// Case-folded projection of `name`; the lookup key.
    #[serde(default)]
    pub normalized_name: String,
    /// Opaque token rotated on every persisted mutation; guards the
    /// compare-and-swap update.
    #[serde(default)]
    pub concurrency_stamp: String,
}

impl Role {
    /// Creates a role with a fresh id and stamp. The normalized name is
    /// derived from `name`; the caller owns keeping it current.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            normalized_name: normalize_key(&name),
            name,
            concurrency_stamp: Uuid::new_v4().to_string(),
        }
    }
}
