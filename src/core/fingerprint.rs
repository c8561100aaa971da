//! Stable fingerprinting and message normalization.
//!
//! The fingerprint identifies an error's root pattern independent of
//! per-occurrence variable data. When backtrace text is available, the
//! innermost frame locations are hashed together with the error type; two
//! call sites raising the same message are still different bugs. Without a
//! backtrace the fingerprint falls back to the error type plus a normalized
//! message with IDs, dates, times, paths, URLs, and addresses replaced by
//! placeholders.

use crate::core::record::{TrackedError, truncate_chars};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Number of stack frames folded into a fingerprint
const MAX_FINGERPRINT_FRAMES: usize = 3;
/// Characters of normalized message hashed when no frames are available
const FALLBACK_MESSAGE_LEN: usize = 100;
/// Characters a message is cut to before normalization
const MAX_NORMALIZED_LEN: usize = 200;

/// Compiled substitution patterns for message normalization.
struct MessagePatterns {
    /// Matches `http(s)://...` URLs
    urls: Regex,
    /// Matches POSIX-like paths with at least one separator-led segment
    paths: Regex,
    /// Matches dotted-quad IPv4 addresses
    ipv4: Regex,
    /// Matches integers of six or more digits (numeric IDs, snowflakes)
    numeric_ids: Regex,
    /// Matches `YYYY-MM-DD` dates
    dates: Regex,
    /// Matches `HH:MM:SS` times
    times: Regex,
}

fn build_patterns() -> Option<MessagePatterns> {
    Some(MessagePatterns {
        urls: Regex::new(r"https?://\S+").ok()?,
        paths: Regex::new(r"(/[\w.-]+)+/?").ok()?,
        ipv4: Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").ok()?,
        numeric_ids: Regex::new(r"\b\d{6,}\b").ok()?,
        dates: Regex::new(r"\d{4}-\d{2}-\d{2}").ok()?,
        times: Regex::new(r"\d{2}:\d{2}:\d{2}").ok()?,
    })
}

static PATTERNS: LazyLock<Option<MessagePatterns>> = LazyLock::new(build_patterns);

/// Matches `at <path>:<line>` frame locations in formatted backtrace text.
static FRAME_LOCATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"at\s+(\S+?):(\d+)").ok());

/// Computes the stable fingerprint for a tracked error.
///
/// The base string is `"{type}:{frame1}:{frame2}:{frame3}"` built from up to
/// the three innermost `basename:line` frame locations, or
/// `"{type}:{normalized_message}"` (message clipped to 100 characters) when no
/// frames can be parsed. The SHA-256 digest of the base string is returned as
/// a hex string. This function is total: it always produces a fingerprint.
pub fn compute_fingerprint(error: &TrackedError) -> String {
    let frames = error
        .backtrace
        .as_deref()
        .map(frame_locations)
        .unwrap_or_default();

    let base = if frames.is_empty() {
        let normalized = normalize_message(&error.message);
        format!(
            "{}:{}",
            error.error_type,
            truncate_chars(&normalized, FALLBACK_MESSAGE_LEN)
        )
    } else {
        format!("{}:{}", error.error_type, frames.join(":"))
    };

    hex::encode(Sha256::digest(base.as_bytes()))
}

/// Extracts up to [`MAX_FINGERPRINT_FRAMES`] `basename:line` locations.
///
/// Rust backtraces list the innermost frame first, so the first matches are
/// the frames nearest the error site.
fn frame_locations(backtrace: &str) -> Vec<String> {
    let Some(pattern) = FRAME_LOCATION.as_ref() else {
        return Vec::new();
    };

    pattern
        .captures_iter(backtrace)
        .take(MAX_FINGERPRINT_FRAMES)
        .map(|caps| {
            let path = caps.get(1).map_or("unknown", |m| m.as_str());
            let line = caps.get(2).map_or("0", |m| m.as_str());
            let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
            format!("{file}:{line}")
        })
        .collect()
}

/// Normalizes an error message by replacing variable data with placeholders.
///
/// The message is truncated to 200 characters, then substitutions run in
/// order from most to least specific so that generic numeric rules cannot
/// corrupt URL or path matches: `<URL>`, `<PATH>`, `<IP>`, `<ID>`, `<DATE>`,
/// `<TIME>`.
pub fn normalize_message(message: &str) -> String {
    if message.is_empty() {
        return "Unknown error".to_string();
    }

    let truncated = truncate_chars(message, MAX_NORMALIZED_LEN);
    let Some(patterns) = PATTERNS.as_ref() else {
        return truncated.to_string();
    };

    let mut normalized = patterns.urls.replace_all(truncated, "<URL>").to_string();
    normalized = patterns.paths.replace_all(&normalized, "<PATH>").to_string();
    normalized = patterns.ipv4.replace_all(&normalized, "<IP>").to_string();
    normalized = patterns
        .numeric_ids
        .replace_all(&normalized, "<ID>")
        .to_string();
    normalized = patterns.dates.replace_all(&normalized, "<DATE>").to_string();
    normalized = patterns.times.replace_all(&normalized, "<TIME>").to_string();

    normalized
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const BACKTRACE_A: &str = "   0: telemetry::track\n             at ./src/core/aggregator.rs:42:9\n   1: app::handler\n             at ./src/handler.rs:117:20\n   2: tokio::runtime::task\n             at /home/user/.cargo/registry/tokio-1.47.1/src/task.rs:300:1\n";
    const BACKTRACE_B: &str = "   0: telemetry::track\n             at ./src/core/aggregator.rs:42:9\n   1: app::other_handler\n             at ./src/handler.rs:205:12\n";

    #[test]
    fn test_same_message_different_ids_same_fingerprint() {
        let first = TrackedError::new("ValueError", "invalid id 123456789");
        let second = TrackedError::new("ValueError", "invalid id 987654321");
        assert_eq!(compute_fingerprint(&first), compute_fingerprint(&second));
    }

    #[test]
    fn test_different_error_types_different_fingerprint() {
        let first = TrackedError::new("ValueError", "something failed");
        let second = TrackedError::new("TypeError", "something failed");
        assert_ne!(compute_fingerprint(&first), compute_fingerprint(&second));
    }

    #[test]
    fn test_traceback_takes_priority_over_message() {
        // Same normalized message, different stack locations: different bugs
        let first =
            TrackedError::new("IoError", "connection refused").with_backtrace(BACKTRACE_A);
        let second =
            TrackedError::new("IoError", "connection refused").with_backtrace(BACKTRACE_B);
        assert_ne!(compute_fingerprint(&first), compute_fingerprint(&second));
    }

    #[test]
    fn test_frame_fingerprint_ignores_message_noise() {
        let first =
            TrackedError::new("IoError", "request 111111 failed").with_backtrace(BACKTRACE_A);
        let second =
            TrackedError::new("IoError", "totally different text").with_backtrace(BACKTRACE_A);
        assert_eq!(compute_fingerprint(&first), compute_fingerprint(&second));
    }

    #[test]
    fn test_frame_locations_use_basenames() {
        let frames = frame_locations(BACKTRACE_A);
        assert_eq!(
            frames,
            vec!["aggregator.rs:42", "handler.rs:117", "task.rs:300"]
        );
    }

    #[test]
    fn test_frame_locations_cap_at_three() {
        let long = format!("{BACKTRACE_A}   3: deeper\n             at ./src/deep.rs:1:1\n");
        assert_eq!(frame_locations(&long).len(), 3);
    }

    #[test]
    fn test_fingerprint_is_hex_digest() {
        let fp = compute_fingerprint(&TrackedError::new("Error", "message"));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_normalize_replaces_ids_dates_times() {
        let normalized =
            normalize_message("user 123456789 failed at 2024-01-15 around 10:30:00 ok");
        assert_eq!(normalized, "user <ID> failed at <DATE> around <TIME> ok");
    }

    #[test]
    fn test_normalize_replaces_urls_paths_ips() {
        let normalized = normalize_message(
            "GET https://api.example.com/v1/items from 192.168.1.100 wrote /var/log/app.log",
        );
        assert_eq!(normalized, "GET <URL> from <IP> wrote <PATH>");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let message = "user 123456789 fetched https://example.com/x at 2024-01-15 10:30:00";
        let once = normalize_message(message);
        let twice = normalize_message(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_empty_message() {
        assert_eq!(normalize_message(""), "Unknown error");
    }

    #[test]
    fn test_normalize_truncates_long_messages() {
        let long = "x".repeat(500);
        assert_eq!(normalize_message(&long).len(), 200);
    }

    #[test]
    fn test_fallback_fingerprint_without_frames() {
        // Backtrace text with no parseable frames falls back to the message
        let with_junk =
            TrackedError::new("ValueError", "invalid id 123456789").with_backtrace("no frames here");
        let without = TrackedError::new("ValueError", "invalid id 987654321");
        assert_eq!(compute_fingerprint(&with_junk), compute_fingerprint(&without));
    }
}
