//! Schema definitions and the migration runner.
//!
//! The account and role collections are schemaless: documents carry
//! whatever fields the models serialize, and readers tolerate extras.
//! The schema pass only declares the collections and the equality
//! indexes over the normalized lookup fields. The indexes are not
//! unique; key uniqueness is the callers' discipline, not the store's.
//!
//! Applied versions are tracked in the `_migration` table so that
//! running the migrations again is a no-op.

use std::collections::HashSet;

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::connection::StoreConfig;
use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration COLUMNS version UNIQUE;
";

#[derive(Debug, Deserialize)]
struct MigrationRecord {
    version: u32,
}

/// A single schema migration. Statements are built from the config
/// because the collection names are configurable.
struct Migration {
    version: u32,
    name: &'static str,
    build: fn(&StoreConfig) -> String,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "identity_collections",
    build: identity_collections,
}];

fn identity_collections(config: &StoreConfig) -> String {
    let accounts = &config.accounts_collection;
    let roles = &config.roles_collection;
    format!(
        "DEFINE TABLE IF NOT EXISTS {accounts} SCHEMALESS;\n\
         DEFINE INDEX IF NOT EXISTS idx_{accounts}_normalized_user_name \
         ON TABLE {accounts} COLUMNS normalized_user_name;\n\
         DEFINE INDEX IF NOT EXISTS idx_{accounts}_normalized_email \
         ON TABLE {accounts} COLUMNS normalized_email;\n\
         DEFINE TABLE IF NOT EXISTS {roles} SCHEMALESS;\n\
         DEFINE INDEX IF NOT EXISTS idx_{roles}_normalized_name \
         ON TABLE {roles} COLUMNS normalized_name;\n"
    )
}

/// Applies all pending migrations for the configured collections.
pub async fn run_migrations<C: Connection>(
    db: &Surreal<C>,
    config: &StoreConfig,
) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL).await?.check()?;

    let mut result = db.query("SELECT version FROM _migration").await?.check()?;
    let applied: Vec<MigrationRecord> = result.take(0)?;
    let applied: HashSet<u32> = applied.into_iter().map(|r| r.version).collect();

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying schema migration"
        );

        let statements = (migration.build)(config);
        db.query(statements).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.name
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()?;
    }

    Ok(())
}
