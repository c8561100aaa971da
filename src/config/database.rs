//! Database configuration module for `ErrorTelemetry`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! It provides functions for establishing database connections and creating the
//! aggregate error table based on the entity definition. The module uses `SeaORM`'s
//! `Schema::create_table_from_entity` method to automatically generate SQL statements
//! from the entity model, ensuring that the database schema matches the Rust struct
//! definition without requiring manual SQL. Lookup indexes (unique fingerprint,
//! category, last-seen) are created the same way from the entity's index annotations.

use crate::entities::AggregateError;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/error_telemetry.sqlite".to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the aggregate error table and its lookup indexes.
///
/// This function uses the `DeriveEntityModel` macros to automatically generate proper
/// SQL statements for table creation, ensuring the database schema matches the Rust
/// struct definition. Fingerprint lookups during flush, category filters in stats
/// queries, and last-seen scans in the retention sweep each rely on one of the
/// generated indexes.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let aggregate_table = schema.create_table_from_entity(AggregateError);
    db.execute(builder.build(&aggregate_table)).await?;

    for index in schema.create_index_from_entity(AggregateError) {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}
