//! Error aggregator - buffers tracked errors and periodically persists them
//! as merged aggregates.
//!
//! The aggregator owns the only shared mutable state in the crate: an
//! in-memory buffer of pending records behind a single async lock. A flush
//! swaps the buffer out under the lock and performs storage I/O with the lock
//! released, so a slow database never blocks concurrent tracking. Tracking
//! itself never fails and never propagates errors; a telemetry component must
//! not become a new source of failure on somebody else's error path.
//!
//! Construct one aggregator at application startup and share it by cloning
//! the handle (clones share the same buffer, counters, and maintenance task)
//! with every code path that tracks errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::telemetry::TelemetryConfig;
use crate::core::category::CategoryMatcher;
use crate::core::context::{ContextMap, sanitize_context};
use crate::core::fingerprint::{compute_fingerprint, normalize_message};
use crate::core::record::{
    ErrorRecord, MAX_MESSAGE_LEN, MAX_TRACEBACK_LEN, TrackedError, truncate_chars,
};
use crate::core::store;
use crate::entities::aggregate_error;
use crate::errors::Result;

/// Handle to the running background maintenance task
struct MaintenanceTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Point-in-time snapshot of the aggregator's counters
#[derive(Debug, Clone)]
pub struct AggregatorStats {
    /// Records accepted by `track` since startup
    pub errors_tracked: u64,
    /// Records successfully merged into storage
    pub errors_aggregated: u64,
    /// Successful flushes
    pub flush_count: u64,
    /// Records currently waiting in the buffer
    pub buffered: usize,
    /// When the last successful flush completed
    pub last_flush: Option<DateTime<Utc>>,
}

/// Buffers tracked errors and merges them into persistent aggregates.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ErrorAggregator {
    inner: Arc<AggregatorInner>,
}

struct AggregatorInner {
    db: DatabaseConnection,
    config: TelemetryConfig,
    categories: CategoryMatcher,
    buffer: Mutex<Vec<ErrorRecord>>,
    enabled: AtomicBool,
    errors_tracked: AtomicU64,
    errors_aggregated: AtomicU64,
    flush_count: AtomicU64,
    last_flush: std::sync::Mutex<Option<DateTime<Utc>>>,
    maintenance: Mutex<Option<MaintenanceTask>>,
}

impl ErrorAggregator {
    /// Creates an aggregator bound to the given storage connection, with the
    /// standard category table.
    pub fn new(db: DatabaseConnection, config: TelemetryConfig) -> Self {
        Self::with_categories(db, config, CategoryMatcher::standard())
    }

    /// Creates an aggregator with a host-extended category table.
    pub fn with_categories(
        db: DatabaseConnection,
        config: TelemetryConfig,
        categories: CategoryMatcher,
    ) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            inner: Arc::new(AggregatorInner {
                db,
                config,
                categories,
                buffer: Mutex::new(Vec::new()),
                enabled,
                errors_tracked: AtomicU64::new(0),
                errors_aggregated: AtomicU64::new(0),
                flush_count: AtomicU64::new(0),
                last_flush: std::sync::Mutex::new(None),
                maintenance: Mutex::new(None),
            }),
        }
    }

    /// Tracks one error occurrence.
    ///
    /// Builds a record (fingerprint, category, sanitized context) and appends
    /// it to the buffer; a flush is triggered when `force_flush` is set or the
    /// buffer has reached the configured threshold. Returns the opaque record
    /// id callers may surface to end users ("Error ID: ..."), or `None` when
    /// telemetry is disabled. This method never fails: the common path does
    /// no I/O, and a failed triggered flush only defers records to the next
    /// cycle.
    pub async fn track(
        &self,
        error: &TrackedError,
        context: Option<ContextMap>,
        category: Option<&str>,
        force_flush: bool,
    ) -> Option<String> {
        if !self.inner.enabled.load(Ordering::Relaxed) {
            return None;
        }

        let record = self.build_record(error, context, category);
        let record_id = record.id.clone();
        debug!(
            fingerprint = %record.fingerprint,
            category = %record.category,
            "Tracked error {}", record.error_type
        );

        let should_flush = {
            let mut buffer = self.inner.buffer.lock().await;
            buffer.push(record);
            self.inner.errors_tracked.fetch_add(1, Ordering::Relaxed);
            force_flush || buffer.len() >= self.inner.config.flush_threshold
        };

        if should_flush {
            let _ = self.flush().await;
        }

        Some(record_id)
    }

    fn build_record(
        &self,
        error: &TrackedError,
        context: Option<ContextMap>,
        category: Option<&str>,
    ) -> ErrorRecord {
        let category = self.inner.categories.categorize(error, category);
        let context = sanitize_context(
            context.unwrap_or_default(),
            self.inner.config.max_context_bytes,
        );

        ErrorRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            error_type: error.error_type.clone(),
            error_message: truncate_chars(&error.message, MAX_MESSAGE_LEN).to_string(),
            fingerprint: compute_fingerprint(error),
            normalized_message: normalize_message(&error.message),
            context,
            traceback: error
                .backtrace
                .as_deref()
                .map(|b| truncate_chars(b, MAX_TRACEBACK_LEN).to_string())
                .unwrap_or_default(),
        }
    }

    /// Flushes buffered records to storage, merging them by fingerprint.
    ///
    /// The buffer is swapped out under the lock, so records tracked while the
    /// flush is in progress land in the fresh buffer and are never lost. On a
    /// storage failure the unflushed records are re-queued ahead of the live
    /// buffer, bounded at twice the flush threshold with the oldest dropped
    /// first, and `false` is returned; the retry happens on the next flush
    /// cycle, not immediately.
    pub async fn flush(&self) -> bool {
        let batch = {
            let mut buffer = self.inner.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };

        if batch.is_empty() {
            return true;
        }

        let count = batch.len();
        match self.persist_batch(batch).await {
            Ok(()) => {
                self.inner
                    .errors_aggregated
                    .fetch_add(count as u64, Ordering::Relaxed);
                self.inner.flush_count.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut last_flush) = self.inner.last_flush.lock() {
                    *last_flush = Some(Utc::now());
                }
                debug!("Flushed {count} errors to storage");
                true
            }
            Err(unflushed) => {
                self.requeue(unflushed).await;
                false
            }
        }
    }

    /// Merges the batch group-by-group; on failure returns every record that
    /// did not reach storage.
    async fn persist_batch(
        &self,
        batch: Vec<ErrorRecord>,
    ) -> std::result::Result<(), Vec<ErrorRecord>> {
        let mut pending = group_by_fingerprint(batch).into_iter();

        while let Some(group) = pending.next() {
            if let Err(e) = store::merge_group(
                &self.inner.db,
                &group,
                self.inner.config.max_recent_occurrences,
            )
            .await
            {
                error!("Error flushing telemetry buffer: {e}");
                let mut unflushed = group;
                unflushed.extend(pending.flatten());
                return Err(unflushed);
            }
        }
        Ok(())
    }

    /// Puts unflushed records back in front of the live buffer, dropping the
    /// oldest excess beyond twice the flush threshold.
    async fn requeue(&self, mut unflushed: Vec<ErrorRecord>) {
        let mut buffer = self.inner.buffer.lock().await;
        unflushed.append(&mut buffer);

        let cap = self.inner.config.flush_threshold * 2;
        if unflushed.len() > cap {
            let dropped = unflushed.len() - cap;
            unflushed.drain(..dropped);
            warn!("Telemetry buffer over capacity, dropped {dropped} oldest records");
        }
        *buffer = unflushed;
    }

    /// Read-side statistics over storage; does not touch the buffer.
    pub async fn get_stats(
        &self,
        category: Option<&str>,
        since: Option<chrono::Duration>,
    ) -> Result<store::ErrorStatistics> {
        store::get_error_stats(&self.inner.db, category, since).await
    }

    /// Direct aggregate lookup by fingerprint.
    pub async fn get_aggregate(
        &self,
        fingerprint: &str,
    ) -> Result<Option<aggregate_error::Model>> {
        store::get_aggregate(&self.inner.db, fingerprint).await
    }

    /// Starts the background maintenance task.
    ///
    /// Every flush interval the task flushes the buffer and deletes
    /// aggregates not seen within the retention TTL. Starting while a task is
    /// already running is a no-op.
    pub async fn start_maintenance(&self) {
        let mut maintenance = self.inner.maintenance.lock().await;
        if let Some(task) = maintenance.as_ref() {
            if !task.handle.is_finished() {
                debug!("Error telemetry maintenance task already running");
                return;
            }
        }

        let (shutdown, mut signal) = watch::channel(false);
        let aggregator = self.clone();
        let handle = tokio::spawn(async move {
            // A zero interval would make `interval` panic; floor it at 1s
            let period = aggregator
                .inner
                .config
                .flush_interval()
                .max(std::time::Duration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = aggregator.flush().await;
                        if let Err(e) = store::delete_stale_aggregates(
                            &aggregator.inner.db,
                            aggregator.inner.config.retention(),
                        )
                        .await
                        {
                            warn!("Error telemetry retention sweep failed: {e}");
                        }
                    }
                    _ = signal.changed() => {
                        // One final flush so shutdown never drops buffered records
                        let _ = aggregator.flush().await;
                        break;
                    }
                }
            }
        });

        *maintenance = Some(MaintenanceTask { handle, shutdown });
        info!("Started error telemetry maintenance task");
    }

    /// Stops the maintenance task, waiting for its final flush to complete.
    pub async fn stop_maintenance(&self) {
        let task = self.inner.maintenance.lock().await.take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!("Error telemetry maintenance task ended abnormally: {e}");
                }
            }
            info!("Stopped error telemetry maintenance task");
        }
    }

    /// Re-enables tracking after a [`Self::disable`].
    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::Relaxed);
        info!("Error telemetry enabled");
    }

    /// Disables tracking; subsequent `track` calls become no-ops.
    ///
    /// A soft kill-switch: the buffer keeps its records and the maintenance
    /// task keeps running.
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::Relaxed);
        info!("Error telemetry disabled");
    }

    /// Whether tracking is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Snapshot of the aggregator's counters and buffer depth.
    pub async fn stats_snapshot(&self) -> AggregatorStats {
        let buffered = self.inner.buffer.lock().await.len();
        let last_flush = self.inner.last_flush.lock().map_or(None, |guard| *guard);
        AggregatorStats {
            errors_tracked: self.inner.errors_tracked.load(Ordering::Relaxed),
            errors_aggregated: self.inner.errors_aggregated.load(Ordering::Relaxed),
            flush_count: self.inner.flush_count.load(Ordering::Relaxed),
            buffered,
            last_flush,
        }
    }
}

/// Groups records by fingerprint, preserving first-appearance order between
/// groups and buffer-insertion order within each group.
fn group_by_fingerprint(batch: Vec<ErrorRecord>) -> Vec<Vec<ErrorRecord>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ErrorRecord>> = Vec::new();

    for record in batch {
        match index.get(&record.fingerprint).copied() {
            Some(at) => {
                if let Some(group) = groups.get_mut(at) {
                    group.push(record);
                }
            }
            None => {
                index.insert(record.fingerprint.clone(), groups.len());
                groups.push(vec![record]);
            }
        }
    }
    groups
}
