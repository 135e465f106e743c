//! Configuration types for the analysis engine
//!
//! This module provides configuration structures for every engine component:
//! pagination policy, response shaping, analysis thresholds, cache TTL
//! classes, and aggregation windows. Construction in code is the primary
//! path; [`EngineConfig::from_file`] layers a YAML file and `TRACELENS_`
//! environment overrides on top of the same defaults.

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::response::ResponseMode;
use crate::store::MAX_SPAN_SECS;
use tracelens_types::{AnalysisError, Result};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pagination policy
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Response shaping
    #[serde(default)]
    pub response: ResponseConfig,

    /// Analysis thresholds
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Cache orchestration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Aggregation windows and percentiles
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file with `TRACELENS_` environment
    /// overrides (`TRACELENS_CACHE__ENABLED=false` style)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: EngineConfig = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("TRACELENS_").split("__"))
            .extract()
            .map_err(|e| AnalysisError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pagination.validate()?;
        self.response.validate()?;
        self.analysis.validate()?;
        self.cache.validate()?;
        self.aggregation.validate()?;
        Ok(())
    }

    /// Disable the cache layer
    pub fn with_cache_disabled(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Override the pagination policy
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Override the analysis thresholds
    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Override the computed percentiles
    pub fn with_percentiles(mut self, percentiles: Vec<u8>) -> Self {
        self.aggregation.percentiles = percentiles;
        self
    }
}

/// Pagination policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when the request does not name one
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,

    /// Hard ceiling; requested limits are clamped, never rejected
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Item count above which auto mode switches to summary
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
            summary_threshold: default_summary_threshold(),
        }
    }
}

impl PaginationConfig {
    /// Validate pagination configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(AnalysisError::configuration(
                "default_limit must be greater than 0",
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(AnalysisError::configuration(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        Ok(())
    }
}

/// Response shaping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Disclosure mode; `auto` selects per result cardinality
    #[serde(default)]
    pub mode: ResponseMode,

    /// Soft payload ceiling used for the oversize flag in response metadata
    #[serde(default = "default_max_size_kb")]
    pub max_size_kb: usize,

    /// Project standard-mode items to the per-kind field allowlist
    #[serde(default = "default_true")]
    pub field_filtering: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            mode: ResponseMode::default(),
            max_size_kb: default_max_size_kb(),
            field_filtering: true,
        }
    }
}

impl ResponseConfig {
    /// Validate response configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size_kb == 0 {
            return Err(AnalysisError::configuration(
                "max_size_kb must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Analysis thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Query timing above this is slow (milliseconds)
    #[serde(default = "default_slow_query_ms")]
    pub slow_query_ms: f64,

    /// Same-signature repetitions at or above this count form an N+1 group
    #[serde(default = "default_n_plus_one_threshold")]
    pub n_plus_one_threshold: usize,

    /// Request duration above this is slow (milliseconds)
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: f64,

    /// Request memory above this counts toward the memory bottleneck check
    #[serde(default = "default_high_memory_mb")]
    pub high_memory_mb: f64,

    /// Most entries fetched from the store for one analysis pass
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            slow_query_ms: default_slow_query_ms(),
            n_plus_one_threshold: default_n_plus_one_threshold(),
            slow_request_ms: default_slow_request_ms(),
            high_memory_mb: default_high_memory_mb(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl AnalysisConfig {
    /// Validate analysis thresholds
    pub fn validate(&self) -> Result<()> {
        if self.slow_query_ms <= 0.0 {
            return Err(AnalysisError::configuration(
                "slow_query_ms must be positive",
            ));
        }
        if self.slow_request_ms <= 0.0 {
            return Err(AnalysisError::configuration(
                "slow_request_ms must be positive",
            ));
        }
        if self.high_memory_mb <= 0.0 {
            return Err(AnalysisError::configuration(
                "high_memory_mb must be positive",
            ));
        }
        if self.n_plus_one_threshold < 2 {
            return Err(AnalysisError::configuration(
                "n_plus_one_threshold must be at least 2",
            ));
        }
        if self.scan_limit == 0 {
            return Err(AnalysisError::configuration(
                "scan_limit must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Cache orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, every computation runs directly
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Namespace prefix for every cache key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// TTL classes per operation kind
    #[serde(default)]
    pub ttl: CacheTtlConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: default_key_prefix(),
            ttl: CacheTtlConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(AnalysisError::configuration("key_prefix cannot be empty"));
        }
        self.ttl.validate()
    }
}

/// TTL classes (seconds) per operation kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_ttl_overview")]
    pub overview: u64,

    #[serde(default = "default_ttl_statistics")]
    pub statistics: u64,

    #[serde(default = "default_ttl_analysis")]
    pub analysis: u64,

    #[serde(default = "default_ttl_list")]
    pub list: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            overview: default_ttl_overview(),
            statistics: default_ttl_statistics(),
            analysis: default_ttl_analysis(),
            list: default_ttl_list(),
        }
    }
}

impl CacheTtlConfig {
    /// Validate TTL classes
    pub fn validate(&self) -> Result<()> {
        for (name, ttl) in [
            ("overview", self.overview),
            ("statistics", self.statistics),
            ("analysis", self.analysis),
            ("list", self.list),
        ] {
            if ttl == 0 {
                return Err(AnalysisError::configuration(format!(
                    "ttl.{} must be greater than 0",
                    name
                )));
            }
            if ttl > MAX_SPAN_SECS {
                return Err(AnalysisError::configuration(format!(
                    "ttl.{} exceeds the ten year maximum",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// One named lookback window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window label used as the result key (`"5m"`, `"1h"`, ...)
    pub label: String,
    /// Window length in seconds
    pub seconds: u64,
}

impl TimeWindow {
    pub fn new(label: impl Into<String>, seconds: u64) -> Self {
        Self {
            label: label.into(),
            seconds,
        }
    }
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Percentiles to compute (e.g., [50, 95, 99])
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<u8>,

    /// Lookback windows for time-window aggregation
    #[serde(default = "default_time_windows")]
    pub time_windows: Vec<TimeWindow>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            percentiles: default_percentiles(),
            time_windows: default_time_windows(),
        }
    }
}

impl AggregationConfig {
    /// Validate aggregation configuration
    pub fn validate(&self) -> Result<()> {
        if self.percentiles.is_empty() {
            return Err(AnalysisError::configuration(
                "at least one percentile must be configured",
            ));
        }
        for &p in &self.percentiles {
            if p == 0 || p > 100 {
                return Err(AnalysisError::configuration(format!(
                    "invalid percentile: {}, must be 1-100",
                    p
                )));
            }
        }
        if self.time_windows.is_empty() {
            return Err(AnalysisError::configuration(
                "at least one time window must be configured",
            ));
        }
        for window in &self.time_windows {
            if window.seconds == 0 {
                return Err(AnalysisError::configuration(format!(
                    "time window '{}' must span at least 1 second",
                    window.label
                )));
            }
            if window.seconds > MAX_SPAN_SECS {
                return Err(AnalysisError::configuration(format!(
                    "time window '{}' exceeds the ten year maximum",
                    window.label
                )));
            }
        }
        Ok(())
    }
}

fn default_page_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    200
}

fn default_summary_threshold() -> usize {
    100
}

fn default_max_size_kb() -> usize {
    48
}

fn default_true() -> bool {
    true
}

fn default_slow_query_ms() -> f64 {
    100.0
}

fn default_n_plus_one_threshold() -> usize {
    3
}

fn default_slow_request_ms() -> f64 {
    1000.0
}

fn default_high_memory_mb() -> f64 {
    128.0
}

fn default_scan_limit() -> usize {
    1000
}

fn default_key_prefix() -> String {
    "tracelens".to_string()
}

fn default_ttl_overview() -> u64 {
    300
}

fn default_ttl_statistics() -> u64 {
    600
}

fn default_ttl_analysis() -> u64 {
    900
}

fn default_ttl_list() -> u64 {
    120
}

fn default_percentiles() -> Vec<u8> {
    vec![50, 95, 99]
}

fn default_time_windows() -> Vec<TimeWindow> {
    vec![
        TimeWindow::new("5m", 300),
        TimeWindow::new("1h", 3_600),
        TimeWindow::new("24h", 86_400),
        TimeWindow::new("7d", 604_800),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pagination.default_limit, 50);
        assert_eq!(config.pagination.max_limit, 200);
        assert_eq!(config.cache.ttl.overview, 300);
        assert_eq!(config.aggregation.percentiles, vec![50, 95, 99]);
        assert_eq!(config.aggregation.time_windows.len(), 4);
    }

    #[test]
    fn test_limit_inversion_rejected() {
        let mut config = EngineConfig::default();
        config.pagination.default_limit = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_percentile_rejected() {
        let config = EngineConfig::default().with_percentiles(vec![50, 101]);
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_percentiles(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = EngineConfig::default();
        config.cache.ttl.list = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_spans_rejected() {
        let mut config = EngineConfig::default();
        config.cache.ttl.analysis = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.aggregation.time_windows = vec![TimeWindow::new("forever", u64::MAX)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_n_plus_one_threshold_floor() {
        let mut config = EngineConfig::default();
        config.analysis.n_plus_one_threshold = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_disabled_builder() {
        let config = EngineConfig::default().with_cache_disabled();
        assert!(!config.cache.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_extraction() {
        let yaml = r#"
pagination:
  default_limit: 25
  max_limit: 100
cache:
  enabled: false
analysis:
  slow_query_ms: 250.0
"#;
        let config: EngineConfig = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .expect("yaml should parse");

        assert_eq!(config.pagination.default_limit, 25);
        assert_eq!(config.pagination.max_limit, 100);
        assert!(!config.cache.enabled);
        assert_eq!(config.analysis.slow_query_ms, 250.0);
        // untouched sections keep defaults
        assert_eq!(config.aggregation.percentiles, vec![50, 95, 99]);
        assert!(config.validate().is_ok());
    }
}
