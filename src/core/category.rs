//! Error categorization against an ordered pattern table.
//!
//! Categories are string tags used to slice stats and route context
//! extraction. An explicit category supplied by the caller always wins;
//! otherwise `"{type}: {message}"` is matched against the table in
//! declaration order and the first matching category is returned, falling
//! back to [`UNCATEGORIZED`]. Host applications may append their own
//! categories, which are evaluated after the standard table but still ahead
//! of the catch-all.

use crate::core::record::TrackedError;
use regex::Regex;
use tracing::warn;

/// Category assigned when no pattern matches
pub const UNCATEGORIZED: &str = "uncategorized";

/// Standard category patterns, evaluated in order, first match wins.
const STANDARD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "database",
        &[
            r"(?i)database.*error",
            r"(?i)sql.*error",
            r"(?i)connection.*refused",
            r"(?i)transaction.*(aborted|failed)",
        ],
    ),
    (
        "network",
        &[
            r"(?i)network.*error",
            r"(?i)connection.*(reset|closed|failed)",
            r"(?i)dns.*(error|failure)",
            r"(?i)socket.*error",
        ],
    ),
    (
        "permission",
        &[
            r"(?i)permission.*denied",
            r"(?i)missing.*permission",
            r"(?i)not.*authorized",
        ],
    ),
    (
        "validation",
        &[
            r"(?i)invalid.*format",
            r"(?i)validation.*failed",
            r"(?i)invalid.*parameter",
        ],
    ),
    (
        "file_system",
        &[
            r"(?i)file.*not.*found",
            r"(?i)directory.*not.*found",
            r"(?i)no such file",
        ],
    ),
    (
        "timeout",
        &[r"(?i)timeout", r"(?i)timed.*out", r"(?i)took.*too.*long"],
    ),
    (
        "rate_limit",
        &[
            r"(?i)rate.*limit",
            r"(?i)too.*many.*requests",
            r"(?i)slow.*down",
        ],
    ),
    (
        "api",
        &[
            r"(?i)api.*error",
            r"(?i)request.*failed",
            r"(?i)status.*code.*(4|5)\d{2}",
        ],
    ),
];

/// Ordered table of category patterns with first-match-wins semantics.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    table: Vec<(String, Vec<Regex>)>,
}

impl CategoryMatcher {
    /// Builds the matcher with the standard category table.
    pub fn standard() -> Self {
        let table = STANDARD_CATEGORIES
            .iter()
            .map(|(category, patterns)| ((*category).to_string(), compile_patterns(patterns)))
            .collect();
        Self { table }
    }

    /// Appends a host-application category, evaluated ahead of the catch-all.
    #[must_use]
    pub fn with_category(mut self, category: &str, patterns: &[&str]) -> Self {
        self.table
            .push((category.to_string(), compile_patterns(patterns)));
        self
    }

    /// Determines the category for a tracked error.
    ///
    /// An explicit category is returned unchanged regardless of message
    /// content. Otherwise the first pattern match in table order decides.
    pub fn categorize(&self, error: &TrackedError, explicit: Option<&str>) -> String {
        if let Some(category) = explicit {
            return category.to_string();
        }

        let haystack = format!("{}: {}", error.error_type, error.message);
        for (category, patterns) in &self.table {
            if patterns.iter().any(|pattern| pattern.is_match(&haystack)) {
                return category.clone();
            }
        }

        UNCATEGORIZED.to_string()
    }
}

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                warn!("Skipping invalid category pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
}
