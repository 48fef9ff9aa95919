//! # Worker Metrics
//!
//! Gauge and histogram samples reported to the runtime.

use serde::{Deserialize, Serialize};

/// A single named value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaugeMetric {
    /// Metric name.
    pub key: String,
    /// Current value.
    pub value: f64,
}

/// One histogram bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive upper bound of the bucket.
    pub upper_bound: f64,
    /// Samples that fell into it.
    pub samples: u32,
}

/// A named histogram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramMetric {
    /// Metric name.
    pub key: String,
    /// Sum of all samples.
    pub sum: f64,
    /// Buckets in ascending bound order.
    pub buckets: Vec<HistogramBucket>,
}

/// A metrics report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Worker load in `[0, 1]`, if reported.
    pub load: Option<f64>,
    /// Gauges.
    pub gauge_metrics: Vec<GaugeMetric>,
    /// Histograms.
    pub histogram_metrics: Vec<HistogramMetric>,
}

impl Metrics {
    /// Adds a gauge sample.
    #[must_use]
    pub fn with_gauge(mut self, key: impl Into<String>, value: f64) -> Self {
        self.gauge_metrics.push(GaugeMetric {
            key: key.into(),
            value,
        });
        self
    }

    /// Sets the load value.
    #[must_use]
    pub fn with_load(mut self, load: f64) -> Self {
        self.load = Some(load);
        self
    }

    /// Returns true if nothing is reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load.is_none() && self.gauge_metrics.is_empty() && self.histogram_metrics.is_empty()
    }
}
