//! Account domain model.
//!
//! One account is one document in the backing store. Claims, external
//! logins, auth tokens and role memberships are embedded collections of
//! that document, so a batch of staged capability mutations commits
//! atomically through a single store update. Scalar fields are plain
//! data owned by the calling orchestrator, which computes password
//! hashes, stamps and normalized projections; the embedded collections
//! are only reachable through the capability methods below, which
//! uphold the per-account uniqueness rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::normalize_key;

/// A (type, value) claim attached to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub claim_value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, claim_value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
        }
    }
}

/// An external-login binding. The (provider, key) pair is the
/// collection-wide lookup key for provider sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLogin {
    pub login_provider: String,
    pub provider_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_display_name: Option<String>,
}

impl ExternalLogin {
    pub fn new(
        login_provider: impl Into<String>,
        provider_key: impl Into<String>,
        provider_display_name: Option<String>,
    ) -> Self {
        Self {
            login_provider: login_provider.into(),
            provider_key: provider_key.into(),
            provider_display_name,
        }
    }
}

/// A provider-issued token stored for an account, keyed by
/// (provider, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub login_provider: String,
    pub name: String,
    pub value: String,
}

/// The account aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Assigned once at creation and persisted as the store's record
    /// key rather than as a document field. Reads project the key back
    /// in under the `record_id` alias.
    #[serde(rename = "record_id", default, skip_serializing)]
    pub id: Uuid,
    #[serde(default)]
    pub user_name: String,
    /// Case-folded projection of `user_name`; the lookup key.
    #[serde(default)]
    pub normalized_user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Opaque token the orchestrator rotates on credential changes.
    #[serde(default)]
    pub security_stamp: String,
    /// Opaque token rotated on every persisted mutation; guards the
    /// compare-and-swap update.
    #[serde(default)]
    pub concurrency_stamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Case-folded projection of `email`; the lookup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_email: Option<String>,
    #[serde(default)]
    pub email_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_confirmed: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lockout_end: Option<DateTime<Utc>>,
    #[serde(default)]
    lockout_enabled: bool,
    #[serde(default)]
    access_failed_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    claims: Vec<Claim>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    logins: Vec<ExternalLogin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tokens: Vec<AuthToken>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
}

impl Account {
    /// Creates an account with a fresh id, fresh stamps and empty
    /// embedded collections. The normalized user name starts in sync
    /// with `user_name`; the caller owns keeping it current afterwards.
    pub fn new(user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            id: Uuid::new_v4(),
            normalized_user_name: normalize_key(&user_name),
            user_name,
            security_stamp: Uuid::new_v4().to_string(),
            concurrency_stamp: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Like [`Account::new`], additionally seeding the email and its
    /// normalized projection.
    pub fn with_email(user_name: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        let mut account = Self::new(user_name);
        account.normalized_email = Some(normalize_key(&email));
        account.email = Some(email);
        account
    }
}

/// Claim operations. Claims are unique per (type, value) within one
/// account; duplicate adds and removes of absent claims are no-ops.
impl Account {
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn add_claim(&mut self, claim: Claim) {
        if !self.claims.contains(&claim) {
            self.claims.push(claim);
        }
    }

    pub fn add_claims(&mut self, claims: impl IntoIterator<Item = Claim>) {
        for claim in claims {
            self.add_claim(claim);
        }
    }

    /// Swaps `old` for `new`, keeping the uniqueness rule: when `new`
    /// is already present, `old` is simply dropped. Nothing happens
    /// when `old` is absent.
    pub fn replace_claim(&mut self, old: &Claim, new: Claim) {
        if let Some(pos) = self.claims.iter().position(|c| c == old) {
            self.claims.remove(pos);
            self.add_claim(new);
        }
    }

    pub fn remove_claim(&mut self, claim: &Claim) {
        self.claims.retain(|c| c != claim);
    }

    pub fn remove_claims<'a>(&mut self, claims: impl IntoIterator<Item = &'a Claim>) {
        for claim in claims {
            self.remove_claim(claim);
        }
    }
}

/// External-login operations. At most one login per provider is kept:
/// re-adding a provider refreshes the display name and keeps the
/// original provider key. The collection-wide uniqueness of the
/// (provider, key) pair is checked by the store's `add_login`.
impl Account {
    pub fn logins(&self) -> &[ExternalLogin] {
        &self.logins
    }

    pub fn add_login(&mut self, login: ExternalLogin) {
        match self
            .logins
            .iter_mut()
            .find(|l| l.login_provider == login.login_provider)
        {
            Some(existing) => existing.provider_display_name = login.provider_display_name,
            None => self.logins.push(login),
        }
    }

    pub fn remove_login(&mut self, login_provider: &str, provider_key: &str) {
        self.logins
            .retain(|l| !(l.login_provider == login_provider && l.provider_key == provider_key));
    }

    /// Removes every login bound to `login_provider`.
    pub fn remove_provider_logins(&mut self, login_provider: &str) {
        self.logins.retain(|l| l.login_provider != login_provider);
    }
}

/// Auth-token operations, keyed by (provider, name). Setting an
/// existing key overwrites its value.
impl Account {
    pub fn tokens(&self) -> &[AuthToken] {
        &self.tokens
    }

    pub fn set_token(
        &mut self,
        login_provider: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let login_provider = login_provider.into();
        let name = name.into();
        let value = value.into();
        match self
            .tokens
            .iter_mut()
            .find(|t| t.login_provider == login_provider && t.name == name)
        {
            Some(existing) => existing.value = value,
            None => self.tokens.push(AuthToken {
                login_provider,
                name,
                value,
            }),
        }
    }

    pub fn token(&self, login_provider: &str, name: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|t| t.login_provider == login_provider && t.name == name)
            .map(|t| t.value.as_str())
    }

    pub fn remove_token(&mut self, login_provider: &str, name: &str) {
        self.tokens
            .retain(|t| !(t.login_provider == login_provider && t.name == name));
    }
}

/// Role-membership staging. Names are stored exactly as resolved by the
/// store's `add_to_role`, which is the validated path; these methods do
/// not consult the role collection, and comparisons are exact.
impl Account {
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn add_role(&mut self, role_name: impl Into<String>) {
        let role_name = role_name.into();
        if !self.roles.contains(&role_name) {
            self.roles.push(role_name);
        }
    }

    pub fn remove_role(&mut self, role_name: &str) {
        self.roles.retain(|r| r != role_name);
    }

    pub fn remove_roles<'a>(&mut self, role_names: impl IntoIterator<Item = &'a str>) {
        for name in role_names {
            self.remove_role(name);
        }
    }

    pub fn is_in_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r == role_name)
    }
}

/// Lockout accessors. These stage values only; persistence is a
/// separate store update.
impl Account {
    pub fn lockout_end(&self) -> Option<DateTime<Utc>> {
        self.lockout_end
    }

    pub fn set_lockout_end(&mut self, end: Option<DateTime<Utc>>) {
        self.lockout_end = end;
    }

    pub fn lockout_enabled(&self) -> bool {
        self.lockout_enabled
    }

    pub fn set_lockout_enabled(&mut self, enabled: bool) {
        self.lockout_enabled = enabled;
    }

    pub fn access_failed_count(&self) -> u32 {
        self.access_failed_count
    }

    /// Returns the incremented count.
    pub fn increment_access_failed_count(&mut self) -> u32 {
        self.access_failed_count += 1;
        self.access_failed_count
    }

    pub fn reset_access_failed_count(&mut self) {
        self.access_failed_count = 0;
    }
}
