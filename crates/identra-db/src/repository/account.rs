//! SurrealDB implementation of [`AccountStore`].
//!
//! An account is one document; its claims, logins, tokens and role
//! memberships travel inside it, so every batch of staged mutations
//! commits through a single document write. Updates are a
//! compare-and-swap on the concurrency stamp. Role memberships are
//! validated against the role collection through the
//! [`SurrealRoleStore`] injected at construction.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use identra_core::error::{StoreError, StoreResult};
use identra_core::models::account::{Account, Claim, ExternalLogin};
use identra_core::store::{
    AccountFilter, AccountStore, PaginatedResult, Pagination, RoleStore, normalize_key,
};

use crate::connection::StoreConfig;
use crate::error::{DbError, is_record_exists};
use crate::repository::role::SurrealRoleStore;

const ENTITY: &str = "account";

#[derive(Debug, Deserialize)]
struct KeyRow {
    #[allow(dead_code)]
    record_id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the account repository.
pub struct SurrealAccountStore<C: Connection> {
    db: Surreal<C>,
    table: String,
    roles: SurrealRoleStore<C>,
}

impl<C: Connection> Clone for SurrealAccountStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl<C: Connection> SurrealAccountStore<C> {
    /// Builds a store over the default collection names. `roles`
    /// supplies the existence lookups for membership adds.
    pub fn new(db: Surreal<C>, roles: SurrealRoleStore<C>) -> Self {
        Self {
            table: StoreConfig::default().accounts_collection,
            db,
            roles,
        }
    }

    /// Builds a store over the collection name in `config`.
    pub fn with_config(db: Surreal<C>, roles: SurrealRoleStore<C>, config: &StoreConfig) -> Self {
        Self {
            table: config.accounts_collection.clone(),
            db,
            roles,
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

impl<C: Connection> AccountStore for SurrealAccountStore<C> {
    async fn create(&self, account: &mut Account) -> StoreResult<()> {
        if account.id.is_nil() {
            account.id = Uuid::new_v4();
        }
        let id = account.id.to_string();

        let result = self
            .db
            .query("CREATE type::thing($tb, $id) CONTENT $doc RETURN NONE")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.clone()))
            .bind(("doc", account.clone()))
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

    async fn update(&self, account: &mut Account) -> StoreResult<()> {
        let id = account.id.to_string();
        let expected_stamp = account.concurrency_stamp.clone();
        let fresh_stamp = Uuid::new_v4().to_string();

        let mut staged = account.clone();
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

        let written: Vec<Account> = result.take(0).map_err(DbError::from)?;
        if written.is_empty() {
            return Err(self.classify_failed_update(&id).await);
        }

        account.concurrency_stamp = fresh_stamp;
        Ok(())
    }

    async fn delete(&self, account: &Account) -> StoreResult<()> {
        let id = account.id.to_string();

        let mut result = self
            .db
            .query("DELETE type::thing($tb, $id) RETURN BEFORE")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let removed: Vec<Account> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(StoreError::NotFound {
                entity: ENTITY.to_string(),
                id,
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::thing($tb, $id)")
            .bind(("tb", self.table.clone()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn find_by_user_name(&self, normalized_user_name: &str) -> StoreResult<Option<Account>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE normalized_user_name = $normalized_user_name LIMIT 1",
            )
            .bind(("tb", self.table.clone()))
            .bind(("normalized_user_name", normalized_user_name.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn find_by_email(&self, normalized_email: &str) -> StoreResult<Option<Account>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE normalized_email = $normalized_email LIMIT 1",
            )
            .bind(("tb", self.table.clone()))
            .bind(("normalized_email", normalized_email.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> StoreResult<Option<Account>> {
        // A filtered array is truthy when non-empty; documents without
        // a logins field fall through as NONE.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE logins[WHERE login_provider = $login_provider \
                 AND provider_key = $provider_key] LIMIT 1",
            )
            .bind(("tb", self.table.clone()))
            .bind(("login_provider", login_provider.to_string()))
            .bind(("provider_key", provider_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows.pop())
    }

    async fn add_login(&self, account: &mut Account, login: ExternalLogin) -> StoreResult<()> {
        // The (provider, key) pair is unique across the whole
        // collection. The check and the later update are separate
        // writes, so a concurrent add can still slip through.
        if let Some(owner) = self
            .find_by_login(&login.login_provider, &login.provider_key)
            .await?
        {
            if owner.id != account.id {
                return Err(StoreError::DuplicateKey {
                    entity: ENTITY.to_string(),
                    id: format!("{}/{}", login.login_provider, login.provider_key),
                });
            }
        }

        account.add_login(login);
        Ok(())
    }

    async fn add_to_role(&self, account: &mut Account, role_name: &str) -> StoreResult<()> {
        if role_name.trim().is_empty() {
            return Err(StoreError::Validation {
                message: "role name must not be empty".to_string(),
            });
        }

        let role = self
            .roles
            .find_by_normalized_name(&normalize_key(role_name))
            .await?
            .ok_or_else(|| StoreError::RoleNotFound {
                name: role_name.to_string(),
            })?;

        account.add_role(role.name);
        Ok(())
    }

    async fn accounts_for_claim(&self, claim: &Claim) -> StoreResult<Vec<Account>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE claims[WHERE claim_type = $claim_type \
                 AND claim_value = $claim_value]",
            )
            .bind(("tb", self.table.clone()))
            .bind(("claim_type", claim.claim_type.clone()))
            .bind(("claim_value", claim.claim_value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows)
    }

    async fn accounts_in_role(&self, role_name: &str) -> StoreResult<Vec<Account>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::table($tb) \
                 WHERE roles CONTAINS $role_name",
            )
            .bind(("tb", self.table.clone()))
            .bind(("role_name", role_name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<Account> = result.take(0).map_err(DbError::from)?;
        Ok(rows)
    }

    async fn list(
        &self,
        filter: AccountFilter,
        pagination: Pagination,
    ) -> StoreResult<PaginatedResult<Account>> {
        let mut conditions = Vec::new();
        if filter.email_confirmed.is_some() {
            conditions.push("email_confirmed = $email_confirmed");
        }
        if filter.lockout_enabled.is_some() {
            conditions.push("lockout_enabled = $lockout_enabled");
        }
        if filter.two_factor_enabled.is_some() {
            conditions.push("two_factor_enabled = $two_factor_enabled");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", conditions.join(" AND "))
        };

        let count_query =
            format!("SELECT count() AS total FROM type::table($tb) {where_clause}GROUP ALL");
        let page_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::table($tb) {where_clause}\
             ORDER BY normalized_user_name ASC LIMIT $limit START $offset"
        );

        let mut request = self
            .db
            .query(count_query)
            .query(page_query)
            .bind(("tb", self.table.clone()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(email_confirmed) = filter.email_confirmed {
            request = request.bind(("email_confirmed", email_confirmed));
        }
        if let Some(lockout_enabled) = filter.lockout_enabled {
            request = request.bind(("lockout_enabled", lockout_enabled));
        }
        if let Some(two_factor_enabled) = filter.two_factor_enabled {
            request = request.bind(("two_factor_enabled", two_factor_enabled));
        }

        let mut result = request.await.map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = counts.first().map(|c| c.total).unwrap_or(0);
        let items: Vec<Account> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
