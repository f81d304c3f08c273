//! Report rows and pages.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::dimension::DimensionValue;
use crate::request::{Dimension, Metric, PageSize};

/// A computed metric cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Number(f64),
    /// `null` when the group has no activity.
    Date(Option<DateTime<Utc>>),
}

impl MetricValue {
    pub fn count(n: usize) -> Self {
        Self::Count(n as u64)
    }

    /// Numeric view used for sorting. Dates sort by epoch millis.
    pub fn sort_key(&self) -> Option<f64> {
        match self {
            Self::Count(n) => Some(*n as f64),
            Self::Number(v) => Some(*v),
            Self::Date(d) => d.map(|d| d.timestamp_millis() as f64),
        }
    }
}

/// One aggregate row: the dimension values that formed the group, then the
/// metric values keyed by their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub dimensions: Vec<(Dimension, DimensionValue)>,
    pub metrics: Vec<(Metric, MetricValue)>,
}

impl ReportRow {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionValue> {
        self.dimensions
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v)
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricValue> {
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, v)| v)
    }

    /// Look a metric up by its column label, e.g. `"Pass Rate (%)"`.
    pub fn by_label(&self, label: &str) -> Option<&MetricValue> {
        self.metrics
            .iter()
            .find(|(m, _)| m.label() == label)
            .map(|(_, v)| v)
    }
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.dimensions.len() + self.metrics.len()))?;
        for (dimension, value) in &self.dimensions {
            map.serialize_entry(dimension.as_str(), value)?;
        }
        for (metric, value) in &self.metrics {
            map.serialize_entry(metric.label(), value)?;
        }
        map.end()
    }
}

/// One page of report output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub results: Vec<ReportRow>,
    /// Rows across all pages.
    pub total_count: usize,
    pub page_count: usize,
    pub page: u32,
    pub page_size: PageSize,
}
