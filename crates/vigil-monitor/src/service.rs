//! Background monitoring loop and the aggregate snapshot.
//!
//! Lifecycle is `Stopped -> Running -> Stopped`. `start` spawns one tokio task
//! that samples the host and the application view every interval and writes
//! a few of those numbers back into the collector as gauges, so they become
//! queryable time series. `stop` cancels that task and waits for it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use vigil_core::collector::API_RESPONSE_TIME;
use vigil_core::error::{Result, VigilError};
use vigil_core::{HistogramStats, JobTally, MetricsCollector};

use crate::config::MonitorSection;
use crate::health::{ApplicationHealthView, ApplicationSnapshot, CacheStats};
use crate::sampler::{ResourceProbe, SystemSnapshot};

pub const SYSTEM_CPU_PERCENT: &str = "system_cpu_percent";
pub const SYSTEM_MEMORY_PERCENT: &str = "system_memory_percent";
pub const SYSTEM_DISK_USAGE_PERCENT: &str = "system_disk_usage_percent";
pub const APP_ACTIVE_JOBS: &str = "app_active_jobs";
pub const APP_CACHE_HIT_RATE: &str = "app_cache_hit_rate";
pub const APP_ERROR_RATE: &str = "app_error_rate";
pub const MONITOR_TICK_DURATION: &str = "monitor_tick_duration";
pub const MONITOR_TICK_FAILURES: &str = "monitor_tick_failures_total";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub cpu_last_hour: Vec<TrendPoint>,
    pub memory_last_hour: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiStats {
    pub total_requests: i64,
    pub total_errors: i64,
    pub response_time: HistogramStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveSnapshot {
    pub system: SystemSnapshot,
    pub application: ApplicationSnapshot,
    pub trends: Trends,
    pub api_stats: ApiStats,
    pub job_stats: JobTally,
    pub cache_stats: CacheStats,
    pub timestamp: DateTime<Utc>,
}

impl ComprehensiveSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VigilError::Internal(format!("snapshot encode failed: {e}")))
    }
}

/// State shared between the service handle and its background task.
struct Shared {
    collector: Arc<MetricsCollector>,
    probe: Arc<dyn ResourceProbe>,
    health: ApplicationHealthView,
}

impl Shared {
    async fn sample_system(&self) -> Result<SystemSnapshot> {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || probe.sample())
            .await
            .map_err(|e| VigilError::Sampling(format!("sampler task failed: {e}")))
    }

    async fn tick(&self) -> Result<()> {
        let _timer = self.collector.timed(MONITOR_TICK_DURATION, &[]);

        let system = self.sample_system().await?;
        let app = self.health.application_snapshot().await;

        let c = &self.collector;
        c.set_gauge(SYSTEM_CPU_PERCENT, system.cpu_percent, &[], Some("percent"));
        c.set_gauge(SYSTEM_MEMORY_PERCENT, system.memory_percent, &[], Some("percent"));
        c.set_gauge(SYSTEM_DISK_USAGE_PERCENT, system.disk_usage_percent, &[], Some("percent"));
        c.set_gauge(APP_ACTIVE_JOBS, app.active_jobs as f64, &[], None);
        c.set_gauge(APP_CACHE_HIT_RATE, app.cache_hit_rate_percent, &[], Some("percent"));
        c.set_gauge(APP_ERROR_RATE, app.error_rate_percent, &[], Some("percent"));

        tracing::debug!(
            cpu = system.cpu_percent,
            memory = system.memory_percent,
            active_jobs = app.active_jobs,
            "monitor tick"
        );
        Ok(())
    }

    async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = AssertUnwindSafe(self.tick()).catch_unwind().await;
                    let failure = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some("tick panicked".to_string()),
                    };
                    if let Some(reason) = failure {
                        self.collector.increment_counter(MONITOR_TICK_FAILURES, 1, &[]);
                        tracing::warn!(reason = %reason, "monitor tick failed; continuing");
                    }
                }
            }
        }
        tracing::info!("monitoring loop stopped");
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the monitoring loop. Construct once and hand it to whoever needs it;
/// there is no global instance.
pub struct MonitoringService {
    shared: Arc<Shared>,
    settings: MonitorSection,
    worker: Mutex<Option<Worker>>,
}

impl MonitoringService {
    pub fn new(health: ApplicationHealthView, probe: Arc<dyn ResourceProbe>, settings: MonitorSection) -> Self {
        Self {
            shared: Arc::new(Shared {
                collector: Arc::clone(health.collector()),
                probe,
                health,
            }),
            settings,
            worker: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.shared.collector
    }

    pub fn health(&self) -> &ApplicationHealthView {
        &self.shared.health
    }

    pub fn settings(&self) -> &MonitorSection {
        &self.settings
    }

    /// Spawn the loop. Returns `false` when it was already running or when
    /// called outside a tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            tracing::debug!("monitoring already running");
            return false;
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("monitoring start requested outside a tokio runtime");
            return false;
        };

        let interval = interval.max(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let handle = rt.spawn(Arc::clone(&self.shared).run(interval, cancel.clone()));
        *worker = Some(Worker { cancel, handle });

        tracing::info!(interval_ms = interval.as_millis() as u64, "monitoring started");
        true
    }

    /// Start with the configured interval.
    pub fn start_default(&self) -> bool {
        self.start(self.settings.interval())
    }

    /// Cancel the loop and wait for it to finish, at most one in-flight tick
    /// plus the configured grace period. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(Worker { cancel, mut handle }) = self.worker.lock().take() else {
            return false;
        };
        cancel.cancel();

        match tokio::time::timeout(self.settings.shutdown_grace(), &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "monitoring task ended abnormally"),
            Err(_) => {
                tracing::warn!("monitoring task did not stop within grace period; aborting");
                handle.abort();
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// On-demand aggregate of everything; independent of the loop.
    pub async fn comprehensive_snapshot(&self) -> ComprehensiveSnapshot {
        let shared = &self.shared;
        let system = match shared.sample_system().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "system sample unavailable");
                SystemSnapshot::zeroed()
            }
        };
        let application = shared.health.application_snapshot().await;
        let cache_stats = shared.health.cache_stats().await;

        let c = &shared.collector;
        let (total_requests, total_errors) = c.api_totals();
        let points = Some(self.settings.trend_points);
        let trend = |name: &str| -> Vec<TrendPoint> {
            c.series(name, &[], points)
                .into_iter()
                .map(|s| TrendPoint {
                    timestamp: s.timestamp,
                    value: s.value,
                })
                .collect()
        };

        ComprehensiveSnapshot {
            system,
            application,
            trends: Trends {
                cpu_last_hour: trend(SYSTEM_CPU_PERCENT),
                memory_last_hour: trend(SYSTEM_MEMORY_PERCENT),
            },
            api_stats: ApiStats {
                total_requests,
                total_errors,
                response_time: c.histogram_stats(API_RESPONSE_TIME, &[]),
            },
            job_stats: c.job_tally(),
            cache_stats,
            timestamp: Utc::now(),
        }
    }
}

impl Drop for MonitoringService {
    fn drop(&mut self) {
        if let Some(w) = self.worker.get_mut().take() {
            w.cancel.cancel();
        }
    }
}
