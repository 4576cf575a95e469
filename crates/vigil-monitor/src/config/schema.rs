use std::time::Duration;

use serde::Deserialize;
use vigil_core::error::{Result, VigilError};
use vigil_core::CollectorConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    pub version: u32,

    #[serde(default)]
    pub collector: CollectorSection,

    #[serde(default)]
    pub monitor: MonitorSection,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            version: 1,
            collector: CollectorSection::default(),
            monitor: MonitorSection::default(),
        }
    }
}

impl VigilConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VigilError::UnsupportedVersion);
        }
        self.collector.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(field: &str, v: T, lo: T, hi: T) -> Result<()> {
    if v < lo || v > hi {
        return Err(VigilError::BadConfig(format!(
            "{field} must be between {lo} and {hi}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorSection {
    #[serde(default = "default_histogram_cap")]
    pub histogram_cap: usize,

    #[serde(default = "default_retention_hours")]
    pub retention_hours: usize,

    #[serde(default = "default_samples_per_hour")]
    pub samples_per_hour: usize,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            histogram_cap: default_histogram_cap(),
            retention_hours: default_retention_hours(),
            samples_per_hour: default_samples_per_hour(),
        }
    }
}

impl CollectorSection {
    pub fn validate(&self) -> Result<()> {
        check_range("collector.histogram_cap", self.histogram_cap, 1, 1_000_000)?;
        check_range("collector.retention_hours", self.retention_hours, 1, 168)?;
        check_range("collector.samples_per_hour", self.samples_per_hour, 1, 3600)?;
        Ok(())
    }

    pub fn to_collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            histogram_cap: self.histogram_cap,
            retention_hours: self.retention_hours,
            samples_per_hour: self.samples_per_hour,
        }
    }
}

fn default_histogram_cap() -> usize {
    1000
}
fn default_retention_hours() -> usize {
    24
}
fn default_samples_per_hour() -> usize {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Points kept in each trend of the comprehensive snapshot.
    #[serde(default = "default_trend_points")]
    pub trend_points: usize,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Mount whose usage is reported as disk usage.
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            trend_points: default_trend_points(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            disk_path: default_disk_path(),
        }
    }
}

impl MonitorSection {
    pub fn validate(&self) -> Result<()> {
        check_range("monitor.interval_secs", self.interval_secs, 1, 3600)?;
        check_range("monitor.trend_points", self.trend_points, 1, 10_000)?;
        check_range("monitor.shutdown_grace_ms", self.shutdown_grace_ms, 100, 60_000)?;
        if self.disk_path.is_empty() {
            return Err(VigilError::BadConfig("monitor.disk_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn default_interval_secs() -> u64 {
    60
}
fn default_trend_points() -> usize {
    60
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}
fn default_disk_path() -> String {
    "/".into()
}
