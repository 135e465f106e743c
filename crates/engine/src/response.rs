//! Response shaping and disclosure modes
//!
//! A result can be disclosed three ways: summary (counts and aggregate
//! blocks only), standard (items projected to a per-kind field allowlist),
//! or detailed (records pass through unmodified). Auto mode picks summary
//! once the item count clears the configured threshold. Every shaped
//! payload carries a metadata block with its serialized size and a rough
//! token estimate so callers can warn on oversized responses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;

use crate::config::ResponseConfig;
use tracelens_types::AnalysisError;

/// Disclosure mode for shaped responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Auto,
    Summary,
    Standard,
    Detailed,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Auto => "auto",
            ResponseMode::Summary => "summary",
            ResponseMode::Standard => "standard",
            ResponseMode::Detailed => "detailed",
        }
    }
}

impl FromStr for ResponseMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ResponseMode::Auto),
            "summary" => Ok(ResponseMode::Summary),
            "standard" => Ok(ResponseMode::Standard),
            "detailed" => Ok(ResponseMode::Detailed),
            other => Err(AnalysisError::invalid_argument(
                "mode",
                format!("unknown response mode '{other}'"),
            )),
        }
    }
}

/// Collapse item arrays to their length, keeping scalar and aggregate
/// blocks untouched
fn summarize(result: Value) -> Value {
    match result {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        out.insert(format!("{key}_count"), json!(items.len()));
                    }
                    other => {
                        out.insert(key, other);
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => json!({ "count": items.len() }),
        other => other,
    }
}

fn project_item(item: &Value, fields: &[&str]) -> Value {
    let Some(map) = item.as_object() else {
        return item.clone();
    };

    let mut out = Map::new();
    for key in ["id", "type", "created_at"] {
        if let Some(value) = map.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    if let Some(content) = map.get("content").and_then(|c| c.as_object()) {
        let filtered: Map<String, Value> = content
            .iter()
            .filter(|(key, _)| fields.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        out.insert("content".to_string(), Value::Object(filtered));
    }
    Value::Object(out)
}

/// Shapes results per disclosure mode and annotates them with size metadata
#[derive(Debug, Clone)]
pub struct ResponseShaper {
    config: ResponseConfig,
    summary_threshold: usize,
}

impl ResponseShaper {
    pub fn new(config: ResponseConfig, summary_threshold: usize) -> Self {
        Self {
            config,
            summary_threshold,
        }
    }

    /// Resolve the effective mode: an explicit request wins, auto switches
    /// to summary above the item-count threshold
    pub fn determine_mode(&self, requested: Option<ResponseMode>, item_count: usize) -> ResponseMode {
        let resolved = requested.unwrap_or(self.config.mode);
        if resolved != ResponseMode::Auto {
            return resolved;
        }
        if item_count > self.summary_threshold {
            ResponseMode::Summary
        } else {
            ResponseMode::Standard
        }
    }

    /// Apply the mode to the result and attach the metadata block
    ///
    /// The size figures are computed on the shaped payload before the
    /// metadata itself is attached.
    pub fn shape(&self, result: Value, mode: ResponseMode, fields: &[&str]) -> Value {
        let shaped = match mode {
            ResponseMode::Summary => summarize(result),
            ResponseMode::Standard => self.project_standard(result, fields),
            ResponseMode::Detailed | ResponseMode::Auto => result,
        };
        let meta = self.meta_for(&shaped, mode);

        match shaped {
            Value::Object(mut map) => {
                map.insert("meta".to_string(), meta);
                Value::Object(map)
            }
            other => json!({ "data": other, "meta": meta }),
        }
    }

    fn project_standard(&self, result: Value, fields: &[&str]) -> Value {
        if !self.config.field_filtering {
            return result;
        }

        match result {
            Value::Object(mut map) => {
                if let Some(Value::Array(items)) = map.get("data") {
                    let projected: Vec<Value> =
                        items.iter().map(|item| project_item(item, fields)).collect();
                    map.insert("data".to_string(), Value::Array(projected));
                    Value::Object(map)
                } else if map.contains_key("content") {
                    project_item(&Value::Object(map), fields)
                } else {
                    Value::Object(map)
                }
            }
            Value::Array(items) => Value::Array(
                items.iter().map(|item| project_item(item, fields)).collect(),
            ),
            other => other,
        }
    }

    fn meta_for(&self, payload: &Value, mode: ResponseMode) -> Value {
        let size_bytes = serde_json::to_string(payload).map(|s| s.len()).unwrap_or(0);
        let size_kb = (size_bytes as f64 / 1024.0 * 100.0).round() / 100.0;
        json!({
            "mode": mode,
            "size_bytes": size_bytes,
            "size_kb": size_kb,
            "estimated_tokens": size_bytes / 4,
            "exceeds_max_size": size_bytes > self.config.max_size_kb * 1024,
        })
    }
}

impl Default for ResponseShaper {
    fn default() -> Self {
        Self::new(ResponseConfig::default(), 100)
    }
}
