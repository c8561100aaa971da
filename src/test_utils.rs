//! Shared test utilities for `ErrorTelemetry`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records and aggregators with sensible defaults.

use crate::{
    config::telemetry::TelemetryConfig,
    core::aggregator::ErrorAggregator,
    core::context::ContextMap,
    core::fingerprint::normalize_message,
    core::record::ErrorRecord,
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Test configuration with a maintenance interval long enough to stay out of
/// the way unless a test drives it explicitly.
pub fn test_config() -> TelemetryConfig {
    TelemetryConfig {
        flush_interval_secs: 3600,
        ..TelemetryConfig::default()
    }
}

/// Sets up a test database and an aggregator bound to it.
/// Returns (db, aggregator) for common test scenarios.
pub async fn setup_aggregator() -> Result<(DatabaseConnection, ErrorAggregator)> {
    let db = setup_test_db().await?;
    let aggregator = ErrorAggregator::new(db.clone(), test_config());
    Ok((db, aggregator))
}

/// Creates a buffered error record with sensible defaults.
///
/// # Arguments
/// * `fingerprint` - Fingerprint to group under
/// * `message` - Raw error message
///
/// # Defaults
/// * `category`: "database"
/// * `error_type`: "TestError"
/// * `context`: empty
pub fn sample_record(fingerprint: &str, message: &str) -> ErrorRecord {
    ErrorRecord {
        id: Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now(),
        category: "database".to_string(),
        error_type: "TestError".to_string(),
        error_message: message.to_string(),
        fingerprint: fingerprint.to_string(),
        normalized_message: normalize_message(message),
        context: ContextMap::new(),
        traceback: String::new(),
    }
}

/// Initializes test tracing output, once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
