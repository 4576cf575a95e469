//! Thread-safe metric store.
//!
//! Counters, gauges, histograms and a bounded time-series ring per
//! `MetricKey`, plus the process-wide job tally. Every mutation and every
//! compound read runs under one collector-wide lock so histogram trimming and
//! multi-field snapshots never observe a half-applied write.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Result, VigilError};
use crate::key::{normalize_tags, MetricKey, Tags};
use crate::sample::MetricSample;

pub const API_REQUESTS_TOTAL: &str = "api_requests_total";
pub const API_ERRORS_TOTAL: &str = "api_errors_total";
pub const API_RESPONSE_TIME: &str = "api_response_time";
pub const API_ENDPOINT_RESPONSE_TIME: &str = "api_endpoint_response_time";
pub const JOB_EVENTS_TOTAL: &str = "job_events_total";
pub const JOB_DURATION: &str = "job_duration";

/// Retention limits for each series.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum values kept per histogram; oldest evicted first.
    pub histogram_cap: usize,
    pub retention_hours: usize,
    pub samples_per_hour: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            histogram_cap: 1000,
            retention_hours: 24,
            samples_per_hour: 60,
        }
    }
}

impl CollectorConfig {
    /// Slots in each time-series ring (24h at one per minute = 1440 by default).
    pub fn timeseries_cap(&self) -> usize {
        self.retention_hours
            .saturating_mul(self.samples_per_hour)
            .max(1)
    }
}

/// Distribution summary of one histogram.
///
/// Percentiles pick `sorted[floor(n * p)]` with the index clamped to `n - 1`;
/// there is no interpolation between adjacent ranks. The median uses the same
/// rule with `p = 0.5`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    fn from_values(mut values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let sum: f64 = values.iter().sum();
        Self {
            count: n,
            min: values[0],
            max: values[n - 1],
            mean: sum / n as f64,
            median: percentile(&values, 0.5),
            p95: percentile(&values, 0.95),
            p99: percentile(&values, 0.99),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = (sorted.len() as f64 * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Lifecycle stage reported by `record_job_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEventKind {
    Created,
    Processing,
    Completed,
    Failed,
}

impl JobEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobEventKind::Created => "created",
            JobEventKind::Processing => "processing",
            JobEventKind::Completed => "completed",
            JobEventKind::Failed => "failed",
        }
    }
}

impl FromStr for JobEventKind {
    type Err = VigilError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "created" => Ok(JobEventKind::Created),
            "processing" => Ok(JobEventKind::Processing),
            "completed" => Ok(JobEventKind::Completed),
            "failed" => Ok(JobEventKind::Failed),
            other => Err(VigilError::InvalidInput(format!("unknown job event `{other}`"))),
        }
    }
}

/// Process-wide job counters. Only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct JobTally {
    pub created: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    /// Seconds.
    pub total_processing_time: f64,
}

struct Series {
    name: String,
    tags: Tags,
    counter: i64,
    gauge: Option<f64>,
    histogram: VecDeque<f64>,
    timeseries: VecDeque<MetricSample>,
}

impl Series {
    fn new(name: &str, tags: Tags) -> Self {
        Self {
            name: name.to_string(),
            tags,
            counter: 0,
            gauge: None,
            histogram: VecDeque::new(),
            timeseries: VecDeque::new(),
        }
    }

    fn push_sample(&mut self, value: f64, unit: Option<&str>, cap: usize) {
        self.timeseries
            .push_back(MetricSample::new(self.name.clone(), value, self.tags.clone(), unit));
        while self.timeseries.len() > cap {
            self.timeseries.pop_front();
        }
    }
}

#[derive(Default)]
struct Inner {
    series: HashMap<MetricKey, Series>,
    jobs: JobTally,
}

impl Inner {
    fn series_mut(&mut self, name: &str, tags: Tags) -> &mut Series {
        let key = MetricKey::from_tags(name, &tags);
        self.series
            .entry(key)
            .or_insert_with(|| Series::new(name, tags))
    }

    fn increment(&mut self, cfg: &CollectorConfig, name: &str, tags: Tags, delta: i64) {
        if delta <= 0 {
            tracing::debug!(name = %name, delta, "ignoring non-positive counter delta");
            return;
        }
        let cap = cfg.timeseries_cap();
        let s = self.series_mut(name, tags);
        s.counter = s.counter.saturating_add(delta);
        let total = s.counter as f64;
        s.push_sample(total, None, cap);
    }

    fn set_gauge(&mut self, cfg: &CollectorConfig, name: &str, tags: Tags, value: f64, unit: Option<&str>) {
        if !value.is_finite() {
            tracing::debug!(name = %name, value, "ignoring non-finite gauge value");
            return;
        }
        let cap = cfg.timeseries_cap();
        let s = self.series_mut(name, tags);
        s.gauge = Some(value);
        s.push_sample(value, unit, cap);
    }

    fn observe(&mut self, cfg: &CollectorConfig, name: &str, tags: Tags, value: f64, unit: Option<&str>) {
        if !value.is_finite() {
            tracing::debug!(name = %name, value, "ignoring non-finite histogram value");
            return;
        }
        let cap = cfg.timeseries_cap();
        let hist_cap = cfg.histogram_cap.max(1);
        let s = self.series_mut(name, tags);
        s.histogram.push_back(value);
        while s.histogram.len() > hist_cap {
            s.histogram.pop_front();
        }
        s.push_sample(value, unit, cap);
    }
}

/// The metric mutation and query engine.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct MetricsCollector {
    config: CollectorConfig,
    inner: Mutex<Inner>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl MetricsCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Add `delta` to a counter. Non-positive deltas are ignored.
    ///
    /// The emitted sample carries the new cumulative value.
    pub fn increment_counter(&self, name: &str, delta: i64, tags: &[(&str, &str)]) {
        let tags = normalize_tags(tags);
        self.inner.lock().increment(&self.config, name, tags, delta);
    }

    /// Increment by 1.
    pub fn inc(&self, name: &str, tags: &[(&str, &str)]) {
        self.increment_counter(name, 1, tags);
    }

    /// Last-write-wins assignment.
    pub fn set_gauge(&self, name: &str, value: f64, tags: &[(&str, &str)], unit: Option<&str>) {
        let tags = normalize_tags(tags);
        self.inner
            .lock()
            .set_gauge(&self.config, name, tags, value, unit);
    }

    /// Append to a histogram, evicting the oldest values past the cap.
    pub fn record_histogram(&self, name: &str, value: f64, tags: &[(&str, &str)], unit: Option<&str>) {
        let tags = normalize_tags(tags);
        self.record_histogram_tags(name, value, tags, unit);
    }

    pub(crate) fn record_histogram_tags(&self, name: &str, value: f64, tags: Tags, unit: Option<&str>) {
        self.inner
            .lock()
            .observe(&self.config, name, tags, value, unit);
    }

    /// All samples across every series whose name contains `filter`.
    ///
    /// No ordering across series; insertion order within a series.
    pub fn get_metrics(&self, filter: Option<&str>) -> Vec<MetricSample> {
        let inner = self.inner.lock();
        inner
            .series
            .values()
            .filter(|s| filter.map_or(true, |f| s.name.contains(f)))
            .flat_map(|s| s.timeseries.iter().cloned())
            .collect()
    }

    /// Summary of one histogram, zeroed when it has no values yet.
    pub fn histogram_stats(&self, name: &str, tags: &[(&str, &str)]) -> HistogramStats {
        let key = MetricKey::new(name, tags);
        let values: Vec<f64> = {
            let inner = self.inner.lock();
            match inner.series.get(&key) {
                Some(s) => s.histogram.iter().copied().collect(),
                None => return HistogramStats::default(),
            }
        };
        HistogramStats::from_values(values)
    }

    /// Snapshot copy of a histogram's retained values, oldest first.
    pub fn histogram_values(&self, name: &str, tags: &[(&str, &str)]) -> Vec<f64> {
        let key = MetricKey::new(name, tags);
        self.inner
            .lock()
            .series
            .get(&key)
            .map(|s| s.histogram.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn counter_value(&self, name: &str, tags: &[(&str, &str)]) -> i64 {
        let key = MetricKey::new(name, tags);
        self.inner
            .lock()
            .series
            .get(&key)
            .map(|s| s.counter)
            .unwrap_or(0)
    }

    pub fn gauge_value(&self, name: &str, tags: &[(&str, &str)]) -> Option<f64> {
        let key = MetricKey::new(name, tags);
        self.inner
            .lock()
            .series
            .get(&key)
            .and_then(|s| s.gauge)
    }

    /// Time series of one key; `last` keeps only the most recent points.
    pub fn series(&self, name: &str, tags: &[(&str, &str)], last: Option<usize>) -> Vec<MetricSample> {
        let key = MetricKey::new(name, tags);
        let inner = self.inner.lock();
        let Some(s) = inner.series.get(&key) else {
            return Vec::new();
        };
        let skip = last.map_or(0, |n| s.timeseries.len().saturating_sub(n));
        s.timeseries.iter().skip(skip).cloned().collect()
    }

    /// Sum of every counter whose name contains `name_part`, across all tags.
    pub fn counter_total(&self, name_part: &str) -> i64 {
        self.inner
            .lock()
            .series
            .values()
            .filter(|s| s.name.contains(name_part))
            .fold(0i64, |acc, s| acc.saturating_add(s.counter))
    }

    /// `(requests, errors)` summed under one lock, so a concurrent
    /// `record_api_request` can never make errors outrun requests.
    pub fn api_totals(&self) -> (i64, i64) {
        let inner = self.inner.lock();
        let mut requests = 0i64;
        let mut errors = 0i64;
        for s in inner.series.values() {
            if s.name.contains(API_REQUESTS_TOTAL) {
                requests = requests.saturating_add(s.counter);
            } else if s.name.contains(API_ERRORS_TOTAL) {
                errors = errors.saturating_add(s.counter);
            }
        }
        (requests, errors)
    }

    /// Number of samples newer than `since` across series matching `name_part`.
    pub fn count_samples_since(&self, name_part: &str, since: DateTime<Utc>) -> usize {
        self.inner
            .lock()
            .series
            .values()
            .filter(|s| s.name.contains(name_part))
            .map(|s| {
                s.timeseries
                    .iter()
                    .rev()
                    .take_while(|m| m.timestamp >= since)
                    .count()
            })
            .sum()
    }

    pub fn series_count(&self) -> usize {
        self.inner.lock().series.len()
    }

    pub fn job_tally(&self) -> JobTally {
        self.inner.lock().jobs
    }

    /// Request counter, latency histograms and, for status >= 400, an error
    /// counter, applied as one atomic update.
    pub fn record_api_request(&self, endpoint: &str, method: &str, status_code: u16, response_time_secs: f64) {
        let status = status_code.to_string();
        let tags = normalize_tags(&[("endpoint", endpoint), ("method", method), ("status", &status)]);
        let route = normalize_tags(&[("endpoint", endpoint), ("method", method)]);

        let mut inner = self.inner.lock();
        inner.increment(&self.config, API_REQUESTS_TOTAL, tags.clone(), 1);
        inner.observe(&self.config, API_RESPONSE_TIME, Tags::new(), response_time_secs, Some("seconds"));
        inner.observe(&self.config, API_ENDPOINT_RESPONSE_TIME, route, response_time_secs, Some("seconds"));
        if status_code >= 400 {
            inner.increment(&self.config, API_ERRORS_TOTAL, tags, 1);
        }
    }

    /// Bump the job tally and emit `job_events_total` (plus `job_duration`
    /// when a duration in seconds is given).
    pub fn record_job_event(&self, kind: JobEventKind, job_id: &str, duration: Option<f64>) {
        let duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
        let tags = normalize_tags(&[("event_type", kind.as_str())]);

        let mut inner = self.inner.lock();
        let jobs = &mut inner.jobs;
        match kind {
            JobEventKind::Created => jobs.created += 1,
            JobEventKind::Processing => jobs.processing += 1,
            JobEventKind::Completed => jobs.completed += 1,
            JobEventKind::Failed => jobs.failed += 1,
        }
        if let Some(d) = duration {
            jobs.total_processing_time += d;
        }

        inner.increment(&self.config, JOB_EVENTS_TOTAL, tags.clone(), 1);
        if let Some(d) = duration {
            inner.observe(&self.config, JOB_DURATION, tags, d, Some("seconds"));
        }
        drop(inner);

        tracing::trace!(job_id = %job_id, event = kind.as_str(), "job event recorded");
    }

    /// String entry point for hosts that carry event names around.
    pub fn record_job_event_str(&self, event_type: &str, job_id: &str, duration: Option<f64>) {
        match event_type.parse::<JobEventKind>() {
            Ok(kind) => self.record_job_event(kind, job_id, duration),
            Err(e) => tracing::debug!(error = %e, job_id = %job_id, "ignoring unknown job event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_on_empty_series_are_zeroed() {
        let c = MetricsCollector::default();
        let s = c.histogram_stats("missing", &[]);
        assert!(s.is_empty());
        assert_eq!(s, HistogramStats::default());
    }

    #[test]
    fn percentile_index_is_clamped() {
        let s = HistogramStats::from_values(vec![3.0, 1.0, 2.0]);
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.median, 2.0);
        // floor(3 * 0.99) = 2, the last index
        assert_eq!(s.p99, 3.0);
        assert_eq!(s.p95, 3.0);

        let one = HistogramStats::from_values(vec![7.5]);
        assert_eq!(one.p99, 7.5);
        assert_eq!(one.median, 7.5);
    }

    #[test]
    fn non_positive_delta_is_ignored() {
        let c = MetricsCollector::default();
        c.inc("y", &[]);
        assert_eq!(c.counter_value("y", &[]), 1);
        c.increment_counter("x", 0, &[]);
        c.increment_counter("x", -4, &[]);
        assert_eq!(c.counter_value("x", &[]), 0);
        assert_eq!(c.series_count(), 1);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let c = MetricsCollector::default();
        c.record_histogram("h", f64::NAN, &[], None);
        c.set_gauge("g", f64::INFINITY, &[], None);
        assert!(c.histogram_values("h", &[]).is_empty());
        assert_eq!(c.gauge_value("g", &[]), None);
    }

    #[test]
    fn timeseries_ring_is_bounded() {
        let c = MetricsCollector::new(CollectorConfig {
            histogram_cap: 10,
            retention_hours: 1,
            samples_per_hour: 5,
        });
        for i in 0..12 {
            c.set_gauge("g", i as f64, &[], None);
        }
        let pts = c.series("g", &[], None);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[0].value, 7.0);
        assert_eq!(pts[4].value, 11.0);
        assert_eq!(c.gauge_value("g", &[]), Some(11.0));
    }

    #[test]
    fn unknown_job_event_is_ignored() {
        let c = MetricsCollector::default();
        c.record_job_event_str("exploded", "job9", Some(1.0));
        assert_eq!(c.job_tally(), JobTally::default());
        c.record_job_event_str("failed", "job9", None);
        assert_eq!(c.job_tally().failed, 1);
        assert!(c.histogram_values(JOB_DURATION, &[("event_type", "failed")]).is_empty());
    }
}
