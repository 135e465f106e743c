//! Core types and data models for TraceLens
//!
//! This crate provides the fundamental data structures shared across the
//! TraceLens telemetry analysis engine.

pub mod entry;
pub mod errors;

pub use entry::{normalize_entry, Entry, EntryKind};
pub use errors::{AnalysisError, Result};
