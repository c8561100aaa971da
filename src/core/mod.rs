//! Core telemetry logic - framework-agnostic error tracking operations.
//!
//! The tracking pipeline runs in this order: an incoming [`record::TrackedError`]
//! is fingerprinted, categorized, and sanitized into an [`record::ErrorRecord`],
//! buffered by the [`aggregator::ErrorAggregator`], and eventually merged into
//! the persistent per-fingerprint aggregates by [`store`].

/// Buffering, flushing, and the background maintenance task
pub mod aggregator;
/// Ordered pattern table mapping errors to category tags
pub mod category;
/// Context sanitization and typed context builders
pub mod context;
/// Stable fingerprinting and message normalization
pub mod fingerprint;
/// Tracked error inputs and per-occurrence records
pub mod record;
/// Aggregate persistence - merge, lookup, statistics, retention
pub mod store;
