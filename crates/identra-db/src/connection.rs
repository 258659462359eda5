//! Backing-store connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use identra_core::error::{StoreError, StoreResult};

use crate::error::DbError;

/// Configuration for the backing document store: the connection target
/// plus the logical collection names both stores read and write.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// Namespace to use.
    pub namespace: String,
    /// Database to use.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
    /// Collection holding account documents.
    pub accounts_collection: String,
    /// Collection holding role documents.
    pub roles_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".to_string(),
            namespace: "identra".to_string(),
            database: "identity".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
            accounts_collection: "account".to_string(),
            roles_collection: "role".to_string(),
        }
    }
}

impl StoreConfig {
    /// Checks the configuration once at startup; after this the config
    /// is treated as plain data.
    pub fn validate(&self) -> StoreResult<()> {
        fn required(name: &str, value: &str) -> StoreResult<()> {
            if value.trim().is_empty() {
                return Err(StoreError::Validation {
                    message: format!("{name} must not be empty"),
                });
            }
            Ok(())
        }

        required("url", &self.url)?;
        required("namespace", &self.namespace)?;
        required("database", &self.database)?;
        required("accounts_collection", &self.accounts_collection)?;
        required("roles_collection", &self.roles_collection)?;
        Ok(())
    }
}

/// Manages the connection to the backing store.
#[derive(Clone)]
pub struct StoreManager {
    db: Surreal<Client>,
}

impl StoreManager {
    /// Validates the configuration, connects to the store,
    /// authenticates and selects the configured namespace and database.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to backing store"
        );

        let db = Surreal::new::<Ws>(config.url.as_str())
            .await
            .map_err(DbError::from)?;

        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(DbError::from)?;

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(DbError::from)?;

        info!("Connected to backing store");

        Ok(Self { db })
    }

    /// Returns a reference to the underlying client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
