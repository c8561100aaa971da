//! Aggregate error entity - The persisted, merged representation of all
//! occurrences sharing one fingerprint.
//!
//! Each row carries first/last-seen timestamps, a monotonically increasing
//! `occurrence_count`, the most recent message/traceback/context, and a
//! bounded `recent_occurrences` JSON list (newest entries retained).
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Aggregated error database model, one row per distinct fingerprint
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "aggregate_errors")]
pub struct Model {
    /// Surrogate primary key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable hash identifying the error's root cause
    #[sea_orm(unique)]
    pub fingerprint: String,
    /// Category tag assigned when the error was first tracked
    #[sea_orm(indexed)]
    pub category: String,
    /// Type name of the originating error
    pub error_type: String,
    /// Raw message of the first tracked occurrence
    pub error_message: String,
    /// Placeholder-substituted message retained for display and grouping
    pub normalized_message: String,
    /// When the first occurrence was tracked
    pub first_seen: DateTimeUtc,
    /// When the most recent occurrence was tracked
    #[sea_orm(indexed)]
    pub last_seen: DateTimeUtc,
    /// Total occurrences merged into this aggregate, monotonically increasing
    pub occurrence_count: i64,
    /// Record id of the most recent occurrence
    pub last_error_id: String,
    /// Message of the most recent occurrence
    pub last_message: String,
    /// Traceback of the most recent occurrence, length-capped at tracking time
    #[sea_orm(column_type = "Text")]
    pub last_traceback: String,
    /// Sanitized context of the most recent occurrence
    pub last_context: Json,
    /// Bounded list of recent occurrence entries, oldest evicted past the cap
    pub recent_occurrences: Json,
}

/// Aggregate errors have no relations to other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
