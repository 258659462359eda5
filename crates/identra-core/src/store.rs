//! Store contracts for account and role persistence.
//!
//! Implementations live in the database crate; these traits define the
//! operations that need the backing store. Everything that only touches
//! embedded state stages on the in-memory [`Account`] and becomes
//! durable through [`AccountStore::update`].

use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::account::{Account, Claim, ExternalLogin};
use crate::models::role::Role;

/// Case-folds a human-entered identifier into the equality-lookup key
/// stored in the `normalized_*` fields.
pub fn normalize_key(input: &str) -> String {
    input.to_uppercase()
}

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A page of results together with the unpaginated total.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Equality filters for the administrative account listing. `None`
/// leaves the field unconstrained.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub email_confirmed: Option<bool>,
    pub lockout_enabled: Option<bool>,
    pub two_factor_enabled: Option<bool>,
}

/// Durable storage for [`Account`] aggregates: persistence, normalized
/// lookups, the cross-collection checks and the reverse queries.
pub trait AccountStore: Send + Sync {
    /// Inserts a new account document. A nil id is replaced with a
    /// fresh one before the write. Colliding with an existing id is
    /// [`DuplicateKey`](crate::error::StoreError::DuplicateKey);
    /// username and email uniqueness are the caller's discipline and
    /// are not checked here.
    fn create(&self, account: &mut Account) -> impl Future<Output = StoreResult<()>> + Send;

    /// Replaces the stored document with the account's current state,
    /// guarded by the concurrency stamp read at load time. On success
    /// the account carries a freshly rotated stamp.
    fn update(&self, account: &mut Account) -> impl Future<Output = StoreResult<()>> + Send;

    /// Removes the account document;
    /// [`NotFound`](crate::error::StoreError::NotFound) when it is
    /// already absent.
    fn delete(&self, account: &Account) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Looks up by the case-folded user name; first match only.
    fn find_by_user_name(
        &self,
        normalized_user_name: &str,
    ) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Looks up by the case-folded email; first match only.
    fn find_by_email(
        &self,
        normalized_email: &str,
    ) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Resolves the owner of an external login by scanning the embedded
    /// login collections.
    fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> impl Future<Output = StoreResult<Option<Account>>> + Send;

    /// Stages `login` on the account after checking that its
    /// (provider, key) pair is not already bound to a different account
    /// anywhere in the collection. The check and the later update are
    /// separate writes, so a concurrent add can still slip through.
    fn add_login(
        &self,
        account: &mut Account,
        login: ExternalLogin,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Stages membership of `role_name` after resolving it through the
    /// role store's normalized lookup. The stored membership is the
    /// role's canonical name. A missing role is
    /// [`RoleNotFound`](crate::error::StoreError::RoleNotFound) and the
    /// membership list is left untouched.
    fn add_to_role(
        &self,
        account: &mut Account,
        role_name: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// All accounts carrying the given claim.
    fn accounts_for_claim(
        &self,
        claim: &Claim,
    ) -> impl Future<Output = StoreResult<Vec<Account>>> + Send;

    /// All accounts holding a membership of `role_name`, matched
    /// exactly as stored.
    fn accounts_in_role(
        &self,
        role_name: &str,
    ) -> impl Future<Output = StoreResult<Vec<Account>>> + Send;

    /// Read-only listing for administrative surfaces, ordered by
    /// normalized user name.
    fn list(
        &self,
        filter: AccountFilter,
        pagination: Pagination,
    ) -> impl Future<Output = StoreResult<PaginatedResult<Account>>> + Send;
}

/// Durable storage for [`Role`] documents.
pub trait RoleStore: Send + Sync {
    /// Inserts a new role document, assigning a fresh id when nil.
    fn create(&self, role: &mut Role) -> impl Future<Output = StoreResult<()>> + Send;

    /// Stamp-guarded replace, same discipline as account updates.
    fn update(&self, role: &mut Role) -> impl Future<Output = StoreResult<()>> + Send;

    /// Removes only the role document. Account memberships referencing
    /// its name are left in place for the caller to clean up.
    fn delete(&self, role: &Role) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Role>>> + Send;

    /// The read path consulted while attaching role memberships.
    fn find_by_normalized_name(
        &self,
        normalized_name: &str,
    ) -> impl Future<Output = StoreResult<Option<Role>>> + Send;

    /// Read-only listing ordered by normalized name.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = StoreResult<PaginatedResult<Role>>> + Send;
}
