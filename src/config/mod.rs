/// Database configuration and connection management
pub mod database;

/// Telemetry tuning knobs loaded from telemetry.toml
pub mod telemetry;
