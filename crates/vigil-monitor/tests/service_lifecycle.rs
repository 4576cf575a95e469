//! MonitoringService start/stop and snapshot behaviour.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use vigil_core::MetricsCollector;
use vigil_monitor::config::MonitorSection;
use vigil_monitor::service::{
    APP_ACTIVE_JOBS, APP_ERROR_RATE, MONITOR_TICK_DURATION, MONITOR_TICK_FAILURES, SYSTEM_CPU_PERCENT,
    SYSTEM_MEMORY_PERCENT,
};
use vigil_monitor::{ApplicationHealthView, MonitoringService, ResourceProbe, SystemSnapshot};

/// Probe with fixed numbers; optionally panics on selected calls.
struct FixedProbe {
    calls: AtomicUsize,
    panic_on_first: bool,
}

impl FixedProbe {
    fn new(panic_on_first: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            panic_on_first,
        }
    }
}

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> SystemSnapshot {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_first && n == 0 {
            panic!("probe exploded");
        }
        SystemSnapshot {
            cpu_percent: 10.0 + n as f64,
            memory_percent: 40.0,
            memory_used_mb: 400.0,
            memory_total_mb: 1000.0,
            disk_usage_percent: 55.0,
            disk_free_gb: 12.0,
            network_bytes_sent: 1,
            network_bytes_recv: 2,
            active_connections: 3,
            load_average: [0.5, 0.4, 0.3],
            timestamp: Utc::now(),
        }
    }
}

fn settings() -> MonitorSection {
    MonitorSection {
        interval_secs: 1,
        trend_points: 3,
        shutdown_grace_ms: 2000,
        disk_path: "/".into(),
    }
}

fn service(probe: Arc<FixedProbe>) -> MonitoringService {
    let health = ApplicationHealthView::new(Arc::new(MetricsCollector::default()));
    MonitoringService::new(health, probe, settings())
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn start_is_idempotent_and_stop_terminates() {
    let probe = Arc::new(FixedProbe::new(false));
    let svc = service(Arc::clone(&probe));

    assert!(!svc.is_running());
    assert!(svc.start(Duration::from_millis(20)));
    assert!(!svc.start(Duration::from_millis(20)));
    assert!(svc.is_running());

    wait_for(|| probe.calls.load(Ordering::SeqCst) >= 2).await;

    let stopped = tokio::time::timeout(Duration::from_secs(3), svc.stop()).await;
    assert_eq!(stopped, Ok(true));
    assert!(!svc.is_running());
    assert!(!svc.stop().await);

    let after = probe.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), after);
}

#[tokio::test]
async fn ticks_write_gauges_back_into_collector() {
    let probe = Arc::new(FixedProbe::new(false));
    let svc = service(Arc::clone(&probe));
    svc.start(Duration::from_millis(10));

    let c = Arc::clone(svc.collector());
    wait_for(|| c.series(SYSTEM_CPU_PERCENT, &[], None).len() >= 3).await;
    svc.stop().await;

    assert_eq!(c.gauge_value(SYSTEM_MEMORY_PERCENT, &[]), Some(40.0));
    assert_eq!(c.gauge_value(APP_ACTIVE_JOBS, &[]), Some(0.0));
    assert_eq!(c.gauge_value(APP_ERROR_RATE, &[]), Some(0.0));
    assert!(c.histogram_stats(MONITOR_TICK_DURATION, &[]).count >= 3);
}

#[tokio::test]
async fn failing_tick_does_not_kill_loop() {
    let probe = Arc::new(FixedProbe::new(true));
    let svc = service(Arc::clone(&probe));
    svc.start(Duration::from_millis(10));

    let c = Arc::clone(svc.collector());
    wait_for(|| c.gauge_value(SYSTEM_CPU_PERCENT, &[]).is_some()).await;
    assert!(svc.is_running());
    svc.stop().await;

    assert_eq!(c.counter_value(MONITOR_TICK_FAILURES, &[]), 1);
}

#[tokio::test]
async fn restart_after_stop() {
    let probe = Arc::new(FixedProbe::new(false));
    let svc = service(Arc::clone(&probe));
    assert!(svc.start(Duration::from_millis(10)));
    svc.stop().await;
    assert!(svc.start(Duration::from_millis(10)));
    assert!(svc.is_running());
    svc.stop().await;
}

#[tokio::test]
async fn comprehensive_snapshot_works_without_loop() {
    let probe = Arc::new(FixedProbe::new(false));
    let svc = service(Arc::clone(&probe));
    let c = Arc::clone(svc.collector());
    for i in 0..5 {
        c.set_gauge(SYSTEM_CPU_PERCENT, i as f64, &[], Some("percent"));
    }
    c.record_api_request("/notes", "GET", 200, 0.05);
    c.record_api_request("/notes", "GET", 500, 0.9);

    let snap = svc.comprehensive_snapshot().await;
    assert!(!svc.is_running());
    assert_eq!(snap.system.cpu_percent, 10.0);
    let cpu: Vec<f64> = snap.trends.cpu_last_hour.iter().map(|p| p.value).collect();
    assert_eq!(cpu, vec![2.0, 3.0, 4.0]);
    assert!(snap.trends.memory_last_hour.is_empty());
    assert_eq!(snap.api_stats.total_requests, 2);
    assert_eq!(snap.api_stats.total_errors, 1);
    assert!((snap.api_stats.response_time.max - 0.9).abs() < 1e-9);
    assert_eq!(snap.application.error_rate_percent, 50.0);

    let json: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
    assert_eq!(json["api_stats"]["total_requests"], 2);
    assert_eq!(json["system"]["load_average"][0], 0.5);
}

#[test]
fn start_outside_runtime_is_refused() {
    let svc = service(Arc::new(FixedProbe::new(false)));
    assert!(!svc.start(Duration::from_millis(10)));
    assert!(!svc.is_running());
}
