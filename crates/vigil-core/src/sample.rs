use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::key::Tags;

/// One recorded data point. Immutable once pushed into a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub tags: Tags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, tags: Tags, unit: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
            tags,
            unit: unit.map(str::to_string),
        }
    }
}
