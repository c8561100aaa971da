//! Context sanitization and typed context builders.
//!
//! Callers attach a key/value map to a tracked error. The map is sanitized
//! rather than rejected: oversized string values are clipped, and
//! a running byte budget bounds the whole map, with a `_truncated` marker set
//! once the budget is exceeded. The typed builders below replace ad-hoc
//! object probing with well-defined context structs per category.

use serde_json::Value;
use std::collections::BTreeMap;

/// Caller-supplied key/value context attached to a tracked error
pub type ContextMap = BTreeMap<String, Value>;

/// Marker key set when context was cut off by the byte budget
pub const TRUNCATION_MARKER: &str = "_truncated";

/// Characters a single string value is clipped to
const MAX_VALUE_CHARS: usize = 1000;

/// Enforces per-value and whole-map size bounds on caller context.
///
/// Entries are admitted in key order until the running byte budget (keys plus
/// serialized values) is exceeded; at that point the [`TRUNCATION_MARKER`] is
/// set and the remaining keys are dropped.
pub fn sanitize_context(context: ContextMap, byte_budget: usize) -> ContextMap {
    let mut sanitized = ContextMap::new();
    let mut used = 0usize;

    for (key, value) in context {
        let value = clip_value(value);
        used += key.len() + rendered_len(&value);
        sanitized.insert(key, value);

        if used > byte_budget {
            sanitized.insert(TRUNCATION_MARKER.to_string(), Value::Bool(true));
            break;
        }
    }

    sanitized
}

/// Merges extracted context with explicit caller context; explicit keys win.
pub fn merge_context(extracted: ContextMap, explicit: ContextMap) -> ContextMap {
    let mut merged = extracted;
    merged.extend(explicit);
    merged
}

fn clip_value(value: Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_VALUE_CHARS => {
            let mut clipped: String = s.chars().take(MAX_VALUE_CHARS).collect();
            clipped.push_str("...");
            Value::String(clipped)
        }
        other => other,
    }
}

fn rendered_len(value: &Value) -> usize {
    serde_json::to_string(value).map_or(0, |s| s.len())
}

/// Context for database-operation errors
#[derive(Debug, Clone)]
pub struct DatabaseContext {
    /// Collection or table the operation targeted
    pub collection: String,
    /// Operation name (e.g. `"update_one"`)
    pub operation: String,
}

impl DatabaseContext {
    /// Renders this context as a [`ContextMap`].
    pub fn into_context(self) -> ContextMap {
        let mut context = ContextMap::new();
        context.insert("collection".to_string(), Value::String(self.collection));
        context.insert("operation".to_string(), Value::String(self.operation));
        context
    }
}

/// Context for network-operation errors
#[derive(Debug, Clone)]
pub struct NetworkContext {
    /// Remote host the operation targeted
    pub host: String,
    /// Operation name (e.g. `"fetch"`)
    pub operation: String,
    /// Remote path, when meaningful for the operation
    pub path: Option<String>,
}

impl NetworkContext {
    /// Renders this context as a [`ContextMap`].
    pub fn into_context(self) -> ContextMap {
        let mut context = ContextMap::new();
        context.insert("host".to_string(), Value::String(self.host));
        context.insert("operation".to_string(), Value::String(self.operation));
        if let Some(path) = self.path {
            context.insert("path".to_string(), Value::String(path));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn entry(key: &str, value: &str) -> (String, Value) {
        (key.to_string(), Value::String(value.to_string()))
    }

    #[test]
    fn test_small_context_passes_through() {
        let context: ContextMap = [entry("guild", "alpha"), entry("command", "stats")].into();
        let sanitized = sanitize_context(context.clone(), 10_240);
        assert_eq!(sanitized, context);
    }

    #[test]
    fn test_budget_sets_marker_and_drops_rest() {
        let context: ContextMap = [
            entry("a", "0123456789"),
            entry("b", "0123456789"),
            entry("c", "0123456789"),
        ]
        .into();

        let sanitized = sanitize_context(context, 20);
        assert_eq!(sanitized.get(TRUNCATION_MARKER), Some(&Value::Bool(true)));
        // "a" fit, "b" blew the budget and was kept, "c" was dropped
        assert!(sanitized.contains_key("a"));
        assert!(sanitized.contains_key("b"));
        assert!(!sanitized.contains_key("c"));
    }

    #[test]
    fn test_long_string_values_are_clipped() {
        let context: ContextMap = [entry("payload", &"x".repeat(5000))].into();
        let sanitized = sanitize_context(context, 10_240);

        let Some(Value::String(clipped)) = sanitized.get("payload") else {
            panic!("payload should remain a string");
        };
        assert_eq!(clipped.len(), 1003);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_merge_explicit_wins() {
        let extracted = DatabaseContext {
            collection: "errors".to_string(),
            operation: "update_one".to_string(),
        }
        .into_context();
        let explicit: ContextMap = [entry("operation", "insert_many")].into();

        let merged = merge_context(extracted, explicit);
        assert_eq!(
            merged.get("operation"),
            Some(&Value::String("insert_many".to_string()))
        );
        assert_eq!(
            merged.get("collection"),
            Some(&Value::String("errors".to_string()))
        );
    }

    #[test]
    fn test_network_context_optional_path() {
        let with_path = NetworkContext {
            host: "files.example.com".to_string(),
            operation: "download".to_string(),
            path: Some("/logs/latest.csv".to_string()),
        }
        .into_context();
        assert!(with_path.contains_key("path"));

        let without = NetworkContext {
            host: "files.example.com".to_string(),
            operation: "connect".to_string(),
            path: None,
        }
        .into_context();
        assert!(!without.contains_key("path"));
    }
}
