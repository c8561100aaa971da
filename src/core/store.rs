//! Aggregate persistence - merge, lookup, statistics, retention.
//!
//! Provides the storage-side half of the flush path plus the read-side
//! queries. All functions are async, operate on a `SeaORM` connection, and
//! return Result types for error handling. Merging a fingerprint group is
//! performed inside a database transaction: the occurrence counter is
//! incremented atomically at the database level while the `last_*` fields and
//! the bounded recent-occurrence list are overwritten from the newest record
//! in the group.

use crate::core::record::{ErrorRecord, OccurrenceEntry};
use crate::entities::{AggregateError, aggregate_error};
use crate::errors::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::debug;

/// Rows returned for the top-N and most-recent stats sections
const STATS_LIMIT: u64 = 10;

/// Merges one fingerprint group of buffered records into storage.
///
/// If an aggregate already exists for the group's fingerprint, its occurrence
/// count is incremented by the group size, the `last_*` fields are overwritten
/// from the newest record, and the group's occurrence entries are appended to
/// `recent_occurrences` in buffer order before trimming to `history_cap`
/// (newest retained). Otherwise a new aggregate is inserted, seeded from the
/// group.
pub async fn merge_group(
    db: &DatabaseConnection,
    group: &[ErrorRecord],
    history_cap: usize,
) -> Result<()> {
    let (Some(oldest), Some(newest)) = (group.first(), group.last()) else {
        return Ok(());
    };

    let txn = db.begin().await?;

    let existing = AggregateError::find()
        .filter(aggregate_error::Column::Fingerprint.eq(&newest.fingerprint))
        .one(&txn)
        .await?;

    if let Some(aggregate) = existing {
        let mut recent: Vec<OccurrenceEntry> =
            serde_json::from_value(aggregate.recent_occurrences).unwrap_or_default();
        recent.extend(group.iter().map(ErrorRecord::occurrence));
        trim_oldest(&mut recent, history_cap);

        AggregateError::update_many()
            .col_expr(
                aggregate_error::Column::OccurrenceCount,
                Expr::col(aggregate_error::Column::OccurrenceCount).add(group.len() as i64),
            )
            .col_expr(
                aggregate_error::Column::LastSeen,
                Expr::value(newest.timestamp),
            )
            .col_expr(
                aggregate_error::Column::LastErrorId,
                Expr::value(newest.id.clone()),
            )
            .col_expr(
                aggregate_error::Column::LastMessage,
                Expr::value(newest.error_message.clone()),
            )
            .col_expr(
                aggregate_error::Column::LastTraceback,
                Expr::value(newest.traceback.clone()),
            )
            .col_expr(
                aggregate_error::Column::LastContext,
                Expr::value(serde_json::to_value(&newest.context)?),
            )
            .col_expr(
                aggregate_error::Column::RecentOccurrences,
                Expr::value(serde_json::to_value(&recent)?),
            )
            .filter(aggregate_error::Column::Fingerprint.eq(&newest.fingerprint))
            .exec(&txn)
            .await?;
    } else {
        let mut recent: Vec<OccurrenceEntry> = group.iter().map(ErrorRecord::occurrence).collect();
        trim_oldest(&mut recent, history_cap);

        let aggregate = aggregate_error::ActiveModel {
            fingerprint: Set(newest.fingerprint.clone()),
            category: Set(newest.category.clone()),
            error_type: Set(newest.error_type.clone()),
            error_message: Set(oldest.error_message.clone()),
            normalized_message: Set(newest.normalized_message.clone()),
            first_seen: Set(oldest.timestamp),
            last_seen: Set(newest.timestamp),
            occurrence_count: Set(group.len() as i64),
            last_error_id: Set(newest.id.clone()),
            last_message: Set(newest.error_message.clone()),
            last_traceback: Set(newest.traceback.clone()),
            last_context: Set(serde_json::to_value(&newest.context)?),
            recent_occurrences: Set(serde_json::to_value(&recent)?),
            ..Default::default()
        };
        AggregateError::insert(aggregate).exec(&txn).await?;
    }

    txn.commit().await?;
    Ok(())
}

/// Drops the oldest entries once the list exceeds `cap`.
fn trim_oldest(recent: &mut Vec<OccurrenceEntry>, cap: usize) {
    if recent.len() > cap {
        let excess = recent.len() - cap;
        recent.drain(..excess);
    }
}

/// Looks up the aggregate for a fingerprint, returning None if unknown.
pub async fn get_aggregate(
    db: &DatabaseConnection,
    fingerprint: &str,
) -> Result<Option<aggregate_error::Model>> {
    AggregateError::find()
        .filter(aggregate_error::Column::Fingerprint.eq(fingerprint))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Occurrence count for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    /// Category tag
    pub category: String,
    /// Number of distinct aggregates in the category
    pub count: u64,
}

/// Compact aggregate view used in stats listings
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    /// Stable fingerprint of the aggregate
    pub fingerprint: String,
    /// Category tag
    pub category: String,
    /// Error type name
    pub error_type: String,
    /// Normalized message for display
    pub message: String,
    /// Total merged occurrences
    pub count: i64,
    /// When the aggregate was last seen
    pub last_seen: DateTime<Utc>,
}

impl From<aggregate_error::Model> for AggregateSummary {
    fn from(model: aggregate_error::Model) -> Self {
        Self {
            fingerprint: model.fingerprint,
            category: model.category,
            error_type: model.error_type,
            message: model.normalized_message,
            count: model.occurrence_count,
            last_seen: model.last_seen,
        }
    }
}

/// Read-side statistics over the stored aggregates
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStatistics {
    /// Distinct aggregates matching the filters
    pub total_errors: u64,
    /// Per-category aggregate counts
    pub categories: Vec<CategoryCount>,
    /// Top aggregates by occurrence count
    pub most_frequent: Vec<AggregateSummary>,
    /// Most recently seen aggregates
    pub recent_errors: Vec<AggregateSummary>,
}

/// Computes error statistics over storage, optionally filtered by category
/// and a lookback window on `last_seen`.
///
/// Pure query; the in-memory buffer is never consulted.
pub async fn get_error_stats(
    db: &DatabaseConnection,
    category: Option<&str>,
    since: Option<Duration>,
) -> Result<ErrorStatistics> {
    let mut condition = Condition::all();
    if let Some(category) = category {
        condition = condition.add(aggregate_error::Column::Category.eq(category));
    }
    if let Some(window) = since {
        condition = condition.add(aggregate_error::Column::LastSeen.gte(Utc::now() - window));
    }

    let total_errors = AggregateError::find()
        .filter(condition.clone())
        .count(db)
        .await?;

    let category_rows: Vec<(String, i64)> = AggregateError::find()
        .select_only()
        .column(aggregate_error::Column::Category)
        .column_as(aggregate_error::Column::Id.count(), "count")
        .filter(condition.clone())
        .group_by(aggregate_error::Column::Category)
        .into_tuple()
        .all(db)
        .await?;
    let categories = category_rows
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category,
            count: count.max(0) as u64,
        })
        .collect();

    let most_frequent = AggregateError::find()
        .filter(condition.clone())
        .order_by_desc(aggregate_error::Column::OccurrenceCount)
        .limit(STATS_LIMIT)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let recent_errors = AggregateError::find()
        .filter(condition)
        .order_by_desc(aggregate_error::Column::LastSeen)
        .limit(STATS_LIMIT)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ErrorStatistics {
        total_errors,
        categories,
        most_frequent,
        recent_errors,
    })
}

/// Deletes aggregates whose `last_seen` is older than the retention TTL.
///
/// Returns the number of rows removed.
pub async fn delete_stale_aggregates(db: &DatabaseConnection, retention: Duration) -> Result<u64> {
    let cutoff = Utc::now() - retention;
    let result = AggregateError::delete_many()
        .filter(aggregate_error::Column::LastSeen.lt(cutoff))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        debug!("Deleted {} stale error aggregates", result.rows_affected);
    }
    Ok(result.rows_affected)
}
