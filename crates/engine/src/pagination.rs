//! Offset and cursor pagination over in-memory result sets
//!
//! Limits are clamped against the configured maximum, never rejected.
//! Cursors are opaque base64 tokens carrying the boundary value plus an
//! issue timestamp; a malformed token decodes to no cursor rather than an
//! error so a stale client falls back to the first page.

use base64::prelude::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::PaginationConfig;

/// Self-describing cursor payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPayload {
    #[serde(rename = "v")]
    pub value: Value,
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

/// Opaque cursor token codec
pub struct Cursor;

impl Cursor {
    /// Base64 token wrapping the value and the issue time
    pub fn encode(value: &Value) -> String {
        let payload = CursorPayload {
            value: value.clone(),
            timestamp: Utc::now().timestamp(),
        };
        match serde_json::to_vec(&payload) {
            Ok(bytes) => BASE64_STANDARD.encode(bytes),
            Err(_) => String::new(),
        }
    }

    /// Soft-failing decode; any malformed token is treated as no cursor
    pub fn decode(token: &str) -> Option<CursorPayload> {
        let bytes = BASE64_STANDARD.decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// One offset-paginated window over a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWindow {
    pub data: Vec<Value>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub current_page: usize,
    pub total_pages: usize,
}

/// One cursor-paginated window over a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage {
    pub data: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Raw pagination arguments as supplied by a client
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub page: Option<i64>,
}

/// Validated limit/offset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub limit: usize,
    pub offset: usize,
}

/// Window computation with configured default and maximum page sizes
#[derive(Debug, Clone)]
pub struct PaginationEngine {
    config: PaginationConfig,
}

impl PaginationEngine {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Configured default when absent, otherwise clamped to the maximum
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(limit) => limit.min(self.config.max_limit),
            None => self.config.default_limit,
        }
    }

    /// Build a window from an already-sliced page and the full count
    pub fn paginate(&self, data: Vec<Value>, total: usize, limit: usize, offset: usize) -> PageWindow {
        let limit = limit.max(1);
        let has_more = (offset + limit) < total;

        PageWindow {
            has_more,
            next_cursor: has_more.then(|| Cursor::encode(&json!(offset + limit))),
            prev_cursor: (offset > 0).then(|| Cursor::encode(&json!(offset.saturating_sub(limit)))),
            current_page: offset / limit + 1,
            total_pages: (total + limit - 1) / limit,
            total,
            limit,
            offset,
            data,
        }
    }

    /// Slice the full collection and build the window for it
    pub fn paginate_slice(&self, all: &[Value], limit: usize, offset: usize) -> PageWindow {
        let limit = limit.max(1);
        let page: Vec<Value> = all.iter().skip(offset).take(limit).cloned().collect();
        self.paginate(page, all.len(), limit, offset)
    }

    /// Cursor window: resume after the item named by the cursor, fetch one
    /// extra to detect a further page without a count query
    pub fn cursor_paginate(&self, all: &[Value], cursor: Option<&str>, limit: usize) -> CursorPage {
        let limit = limit.max(1);
        let start = match cursor {
            Some(token) => match Cursor::decode(token) {
                Some(payload) => all
                    .iter()
                    .position(|item| item.get("id") == Some(&payload.value))
                    .map(|found| found + 1)
                    .unwrap_or(0),
                None => {
                    warn!("malformed cursor token; restarting from the first page");
                    0
                }
            },
            None => 0,
        };

        let mut window: Vec<Value> = all.iter().skip(start).take(limit + 1).cloned().collect();
        let has_more = window.len() > limit;
        window.truncate(limit);

        let next_cursor = if has_more {
            window
                .last()
                .and_then(|item| item.get("id"))
                .map(Cursor::encode)
        } else {
            None
        };

        CursorPage {
            data: window,
            has_more,
            next_cursor,
        }
    }

    /// Clamp a raw request into usable parameters
    ///
    /// An explicit offset wins over a page number; a page derives
    /// `offset = (page - 1) * limit`.
    pub fn validate(&self, request: &PageRequest) -> PageParams {
        let limit = self.effective_limit(request.limit.map(|l| l.max(1) as usize));
        let offset = match (request.offset, request.page) {
            (Some(offset), _) => offset.max(0) as usize,
            (None, Some(page)) => (page.max(1) as usize - 1) * limit,
            (None, None) => 0,
        };
        PageParams { limit, offset }
    }
}

impl Default for PaginationEngine {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}
