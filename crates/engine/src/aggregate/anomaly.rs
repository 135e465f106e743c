//! Z-score anomaly detection over a numeric field

use serde::{Deserialize, Serialize};

use crate::fields;
use crate::stats;
use tracelens_types::Entry;

/// Default z-score threshold
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Minimum samples before detection is meaningful
const MIN_SAMPLES: usize = 3;

/// One flagged entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Position of the entry in the analyzed window
    pub index: usize,
    /// Entry id, for drill-down
    pub entry_id: String,
    pub value: f64,
    /// Signed z-score
    pub z_score: f64,
    /// Signed deviation from the window mean
    pub deviation: f64,
}

/// Outcome of anomaly detection over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    pub sample_count: usize,
    /// False when the window was below the minimum sample gate
    pub sufficient_data: bool,
}

/// Flag entries whose field value sits more than `threshold` standard
/// deviations from the window mean
///
/// Fewer than three samples yields an insufficient-data report; a window
/// with zero spread yields no anomalies.
pub fn detect_anomalies(entries: &[Entry], field: &str, threshold: f64) -> AnomalyReport {
    let values = fields::numeric_series(entries, field);
    if values.len() < MIN_SAMPLES {
        return AnomalyReport {
            anomalies: Vec::new(),
            mean: 0.0,
            std_dev: 0.0,
            threshold,
            sample_count: values.len(),
            sufficient_data: false,
        };
    }

    let mean = stats::mean(&values);
    let std_dev = stats::std_dev(&values);

    let anomalies = if std_dev == 0.0 {
        Vec::new()
    } else {
        values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let z = stats::z_score(value, mean, std_dev);
                if z.abs() > threshold {
                    Some(Anomaly {
                        index,
                        entry_id: entries[index].id.clone(),
                        value,
                        z_score: z,
                        deviation: value - mean,
                    })
                } else {
                    None
                }
            })
            .collect()
    };

    AnomalyReport {
        anomalies,
        mean,
        std_dev,
        threshold,
        sample_count: values.len(),
        sufficient_data: true,
    }
}
