//! SurrealDB implementation of [`RoleStore`].

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use identra_core::error::{StoreError, StoreResult};
use identra_core::models::role::Role;
use identra_core::store::{PaginatedResult, Pagination, RoleStore};

use crate::connection::StoreConfig;
use crate::error::{DbError, is_record_exists};

const ENTITY: &str = "role";

#[derive(Debug, Deserialize)]
struct KeyRow {
    #[allow(dead_code)]
    record_id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the role repository.
pub struct SurrealRoleStore<C: Connection> {
    db: Surreal<C>,
    table: String,
}

impl<C: Connection> Clone for SurrealRoleStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table.clone(),
        }
    }
}

impl<C: Connection> SurrealRoleStore<C> {
    /// Builds a store over the default role collection name.
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            table: StoreConfig::default().roles_collection,
            db,
        }
    }

    /// Builds a store over the collection name in `config`.
    pub fn with_config(db: Surreal<C>, config: &StoreConfig) -> Self {
        Self {
            table: config.roles_collection.clone(),
            db,
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM type::thing($tb, $id)")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<KeyRow> = result.take(0)?;
        Ok(!rows.is_empty())
    }

    /// Disambiguates a zero-row compare-and-swap: a vanished document
    /// is missing, a surviving one means the stamp was stale.
    async fn classify_failed_update(&self, id: &str) -> StoreError {
        match self.exists(id).await {
            Ok(true) => StoreError::ConcurrencyConflict {
                entity: ENTITY.to_string(),
                id: id.to_string(),
            },
            Ok(false) => StoreError::NotFound {
                entity: ENTITY.to_string(),
                id: id.to_string(),
            },
            Err(e) => e.into(),
        }
    }
}

impl<C: Connection> RoleStore for SurrealRoleStore<C> {
    async fn create(&self, role: &mut Role) -> StoreResult<()> {
        if role.id.is_nil() {
            role.id = Uuid::new_v4();
        }
        let id = role.id.to_string();

        let result = self
            .db
            .query("CREATE type::thing($tb, $id) CONTENT $doc RETURN NONE")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.clone()))
            .bind(("doc", role.clone()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            if is_record_exists(&e) {
                return Err(StoreError::DuplicateKey {
                    entity: ENTITY.to_string(),
                    id,
                });
            }
            return Err(DbError::from(e).into());
        }

        Ok(())
    }

    async fn update(&self, role: &mut Role) -> StoreResult<()> {
        let id = role.id.to_string();
        let expected_stamp = role.concurrency_stamp.clone();
        let fresh_stamp = Uuid::new_v4().to_string();

        let mut staged = role.clone();
        staged.concurrency_stamp = fresh_stamp.clone();

        let mut result = self
            .db
            .query(
                "UPDATE type::thing($tb, $id) CONTENT $doc \
                 WHERE concurrency_stamp = $expected_stamp",
            )
            .bind(("tb", self.table.clone()))
            .bind(("id", id.clone()))
            .bind(("doc", staged))
            .bind(("expected_stamp", expected_stamp))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let written: Vec<Role> = result.take(0).map_err(DbError::from)?;
        if written.is_empty() {
            return Err(self.classify_failed_update(&id).await);
        }

        role.concurrency_stamp = fresh_stamp;
        Ok(())
    }

    async fn delete(&self, role: &Role) -> StoreResult<()> {
        let id = role.id.to_string();

        let mut result = self
            .db
            .query("DELETE type::thing($tb, $id) RETURN BEFORE")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let removed: Vec<Role> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(StoreError::NotFound {
                entity: ENTITY.to_string(),
                id,
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::thing($tb, $id)")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Role> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn find_by_normalized_name(&self, normalized_name: &str) -> StoreResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE normalized_name = $normalized_name LIMIT 1",
            )
            .bind(("tb", self.table.clone()))
            .bind(("normalized_name", normalized_name.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Role> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn list(&self, pagination: Pagination) -> StoreResult<PaginatedResult<Role>> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::table($tb) GROUP ALL")
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 ORDER BY normalized_name ASC LIMIT $limit START $offset",
            )
            .bind(("tb", self.table.clone()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = counts.first().map(|c| c.total).unwrap_or(0);
        let items: Vec<Role> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
