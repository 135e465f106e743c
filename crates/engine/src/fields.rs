//! Dotted-path field access over entry content
//!
//! Analysis configuration names fields as dotted paths (`"duration"`,
//! `"content.time"`, `"response.status"`). Resolution strips an optional
//! `content.` prefix, tries a direct key hit, then walks the path one
//! segment at a time. Every miss is absorbed with a type-appropriate
//! default so a malformed record never aborts an aggregation.

use serde_json::Value;
use tracelens_types::Entry;

/// Resolve a dotted path within a content value
///
/// A direct key hit wins before dot traversal, so keys that literally
/// contain dots still resolve.
pub fn resolve<'a>(content: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(found) = content.get(path) {
        return Some(found);
    }

    let mut current = content;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Resolve a dotted path against an entry's content
///
/// `"time"` and `"content.time"` are equivalent spellings.
pub fn resolve_path<'a>(entry: &'a Entry, path: &str) -> Option<&'a Value> {
    let trimmed = path.strip_prefix("content.").unwrap_or(path);
    resolve(&entry.content, trimmed)
}

/// Numeric value at a path; 0.0 when missing or non-numeric
///
/// JSON numbers and numeric strings both count; stores frequently record
/// timings as strings.
pub fn numeric_field(entry: &Entry, path: &str) -> f64 {
    match resolve_path(entry, path) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Text value at a path; empty string when missing
pub fn text_field(entry: &Entry, path: &str) -> String {
    match resolve_path(entry, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Numeric values for a field across a collection of entries
///
/// Missing fields contribute 0.0, keeping positions aligned with the input
/// so anomaly indexes stay meaningful.
pub fn numeric_series(entries: &[Entry], path: &str) -> Vec<f64> {
    entries.iter().map(|e| numeric_field(e, path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracelens_types::EntryKind;

    fn entry(content: Value) -> Entry {
        Entry::new(EntryKind::Request, content)
    }

    #[test]
    fn test_direct_and_nested_lookup() {
        let e = entry(json!({
            "duration": 120.5,
            "response": {"status": 200}
        }));

        assert_eq!(numeric_field(&e, "duration"), 120.5);
        assert_eq!(numeric_field(&e, "response.status"), 200.0);
        assert_eq!(numeric_field(&e, "content.duration"), 120.5);
    }

    #[test]
    fn test_dotted_key_beats_traversal() {
        let e = entry(json!({"a.b": 7.0, "a": {"b": 9.0}}));
        assert_eq!(numeric_field(&e, "a.b"), 7.0);
    }

    #[test]
    fn test_numeric_string_coercion() {
        let e = entry(json!({"time": "42.5", "label": "fast"}));
        assert_eq!(numeric_field(&e, "time"), 42.5);
        assert_eq!(numeric_field(&e, "label"), 0.0);
    }

    #[test]
    fn test_missing_fields_absorbed() {
        let e = entry(json!({}));
        assert_eq!(numeric_field(&e, "duration"), 0.0);
        assert_eq!(text_field(&e, "uri"), "");

        let null = entry(Value::Null);
        assert_eq!(numeric_field(&null, "duration"), 0.0);
    }

    #[test]
    fn test_text_field_coercion() {
        let e = entry(json!({"uri": "/api/users", "status": 200}));
        assert_eq!(text_field(&e, "uri"), "/api/users");
        assert_eq!(text_field(&e, "status"), "200");
    }

    #[test]
    fn test_numeric_series_keeps_positions() {
        let entries = vec![
            entry(json!({"duration": 10.0})),
            entry(json!({})),
            entry(json!({"duration": 30.0})),
        ];
        assert_eq!(numeric_series(&entries, "duration"), vec![10.0, 0.0, 30.0]);
    }
}
