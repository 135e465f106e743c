//! Analysis engine for TraceLens telemetry
//!
//! This crate turns captured telemetry entries into summaries, statistics,
//! pattern reports, and paginated listings, with response shaping and a
//! cache-aside layer in front of every expensive computation.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod engine;
pub mod fields;
pub mod pagination;
pub mod patterns;
pub mod performance;
pub mod response;
pub mod stats;
pub mod store;
pub mod tools;

// Re-export commonly used types
pub use engine::AnalysisEngine;

pub use config::{
    AggregationConfig, AnalysisConfig, CacheConfig, CacheTtlConfig, EngineConfig,
    PaginationConfig, ResponseConfig,
};

pub use aggregate::{
    AggregateResult, AggregationEngine, Anomaly, AnomalyReport, Distribution, Histogram,
    HistogramBucket, TrendDirection, TrendReport, DEFAULT_BUCKETS,
};

pub use cache::{
    CacheOrchestrator, CacheStats, CacheTier, CacheTierStats, MemoryCacheTier, OperationKind,
};

pub use pagination::{Cursor, CursorPage, PageParams, PageRequest, PageWindow, PaginationEngine};

pub use patterns::{
    DuplicateGroup, NPlusOnePattern, OptimizationSuggestion, PatternAnalyzer, Severity,
    SlowQuery, SuggestionKind,
};

pub use performance::{
    Bottleneck, BottleneckKind, EndpointBreakdown, PerformanceAnalyzer, PerformanceScore,
    PerformanceTrend, ScoreRating, SlowRequest,
};

pub use response::{ResponseMode, ResponseShaper};

pub use store::{filter_by_period, EntryStore, FetchOptions, MemoryEntryStore, Period};

pub use tools::{Action, KindProfile, QueryTool, RecordTool};
