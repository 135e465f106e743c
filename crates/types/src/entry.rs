//! Telemetry entry types
//!
//! An [`Entry`] is one normalized telemetry record pulled from the external
//! store. Raw store records arrive in several shapes; [`normalize_entry`]
//! converts them all at the ingestion boundary so downstream code only ever
//! sees the normalized form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AnalysisError;

/// Kind of recorded telemetry entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// HTTP request trace
    Request,
    /// Database statement trace
    Query,
    /// Captured exception
    Exception,
    /// Background job execution
    Job,
    /// Cache operation
    Cache,
    /// Application/broadcast event
    Event,
}

impl EntryKind {
    /// String tag used in store records and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Request => "request",
            EntryKind::Query => "query",
            EntryKind::Exception => "exception",
            EntryKind::Job => "job",
            EntryKind::Cache => "cache",
            EntryKind::Event => "event",
        }
    }

    /// All known kinds, in registration order
    pub fn all() -> &'static [EntryKind] {
        &[
            EntryKind::Request,
            EntryKind::Query,
            EntryKind::Exception,
            EntryKind::Job,
            EntryKind::Cache,
            EntryKind::Event,
        ]
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(EntryKind::Request),
            "query" => Ok(EntryKind::Query),
            "exception" => Ok(EntryKind::Exception),
            "job" => Ok(EntryKind::Job),
            "cache" => Ok(EntryKind::Cache),
            "event" => Ok(EntryKind::Event),
            other => Err(AnalysisError::InvalidArgument {
                name: "kind".to_string(),
                reason: format!("unknown entry kind '{}'", other),
            }),
        }
    }
}

/// A normalized telemetry record
///
/// `content` is the kind-specific payload (`duration`, `sql`, `time`,
/// `class`, ...). It may be `Null` or missing fields entirely; consumers
/// substitute zero/empty defaults rather than fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Store-assigned identifier, unique within the store
    pub id: String,
    /// Record kind, tagged `type` on the wire
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Kind-specific payload
    #[serde(default)]
    pub content: Value,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
    /// Monotone store sequence id, when the store provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Store-side grouping hash for related entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_hash: Option<String>,
    /// Tags attached at recording time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Entry {
    /// Create a new entry with a generated id and the current timestamp
    pub fn new(kind: EntryKind, content: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content,
            created_at: Utc::now(),
            sequence: None,
            family_hash: None,
            tags: Vec::new(),
        }
    }

    /// Override the store id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Override the recording timestamp
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Attach a store sequence id
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Attach a family hash
    pub fn with_family_hash(mut self, hash: impl Into<String>) -> Self {
        self.family_hash = Some(hash.into());
        self
    }

    /// Attach a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Seconds elapsed since this entry was recorded
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }
}

/// Convert a raw store record into a normalized [`Entry`].
///
/// Accepts both envelope records (an object with a `content` key holding the
/// payload) and flat records (the payload at the top level). Unknown kinds
/// map to [`EntryKind::Event`]; a missing id gets a fresh UUID; a missing or
/// unparseable timestamp defaults to now. Never fails.
pub fn normalize_entry(raw: &Value) -> Entry {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => return Entry::new(EntryKind::Event, raw.clone()),
    };

    let content = match obj.get("content") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => raw.clone(),
    };

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(|s| EntryKind::from_str(s).ok())
        .unwrap_or(EntryKind::Event);

    let id = match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let created_at = obj
        .get("created_at")
        .or_else(|| obj.get("createdAt"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let sequence = obj.get("sequence").and_then(Value::as_u64);

    let family_hash = obj
        .get("family_hash")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Entry {
        id,
        kind,
        content,
        created_at,
        sequence,
        family_hash,
        tags,
    }
}
