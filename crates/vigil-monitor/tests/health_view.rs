//! ApplicationHealthView against fake collaborators.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use vigil_core::error::{Result, VigilError};
use vigil_core::{JobEventKind, MetricsCollector};
use vigil_monitor::{
    ApplicationHealthView, CacheProvider, CacheStats, JobCounts, JobStore, StorageProvider, StorageUsage,
};

struct FakeJobs(JobCounts);

#[async_trait]
impl JobStore for FakeJobs {
    async fn job_counts(&self) -> Result<JobCounts> {
        Ok(self.0)
    }
}

struct FakeCache {
    stats: CacheStats,
    failing: AtomicBool,
}

impl FakeCache {
    fn new(hits: u64, misses: u64) -> Self {
        Self {
            stats: CacheStats { hits, misses },
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CacheProvider for FakeCache {
    async fn cache_stats(&self) -> Result<CacheStats> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(VigilError::collaborator("cache", "connection refused"));
        }
        Ok(self.stats)
    }
}

struct FakeStorage(u64);

#[async_trait]
impl StorageProvider for FakeStorage {
    async fn storage_usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage { bytes_stored: self.0 })
    }
}

fn counts() -> JobCounts {
    JobCounts {
        active: 3,
        pending: 7,
        failed: 1,
        completed_today: 12,
        total_processing_time: 7200.0,
    }
}

#[tokio::test]
async fn snapshot_combines_all_sources() {
    let collector = Arc::new(MetricsCollector::default());
    collector.record_api_request("/notes", "GET", 200, 0.05);
    collector.record_api_request("/notes", "GET", 200, 0.07);
    collector.record_api_request("/notes", "POST", 503, 0.4);
    collector.record_api_request("/users", "GET", 404, 0.01);

    let view = ApplicationHealthView::new(Arc::clone(&collector))
        .with_job_store(Arc::new(FakeJobs(counts())))
        .with_cache(Arc::new(FakeCache::new(90, 10)))
        .with_storage(Arc::new(FakeStorage(3 * (1u64 << 30))));

    let snap = view.application_snapshot().await;
    assert_eq!(snap.active_jobs, 3);
    assert_eq!(snap.pending_jobs, 7);
    assert_eq!(snap.failed_jobs, 1);
    assert_eq!(snap.completed_jobs_today, 12);
    assert_eq!(snap.total_processing_time_hours, 2.0);
    assert_eq!(snap.avg_job_duration_minutes, 10.0);
    assert_eq!(snap.error_rate_percent, 50.0);
    assert_eq!(snap.cache_hit_rate_percent, 90.0);
    assert_eq!(snap.storage_usage_gb, 3.0);
    assert_eq!(snap.api_requests_per_minute, 4.0);
}

#[tokio::test]
async fn failing_cache_zeroes_snapshot_without_error() {
    let collector = Arc::new(MetricsCollector::default());
    collector.record_api_request("/notes", "GET", 500, 0.2);

    let cache = Arc::new(FakeCache::new(5, 5));
    cache.failing.store(true, Ordering::Relaxed);

    let view = ApplicationHealthView::new(collector)
        .with_job_store(Arc::new(FakeJobs(counts())))
        .with_cache(cache.clone())
        .with_storage(Arc::new(FakeStorage(1 << 30)));

    let snap = view.application_snapshot().await;
    assert_eq!(snap.cache_hit_rate_percent, 0.0);
    // whole snapshot falls back, not just the cache field
    assert_eq!(snap.active_jobs, 0);
    assert_eq!(snap.error_rate_percent, 0.0);
    assert_eq!(snap.storage_usage_gb, 0.0);
    assert_eq!(view.cache_stats().await, CacheStats::default());

    cache.failing.store(false, Ordering::Relaxed);
    let snap = view.application_snapshot().await;
    assert_eq!(snap.cache_hit_rate_percent, 50.0);
    assert_eq!(snap.error_rate_percent, 100.0);
}

#[tokio::test]
async fn zero_requests_means_zero_error_rate() {
    let view = ApplicationHealthView::new(Arc::new(MetricsCollector::default()))
        .with_cache(Arc::new(FakeCache::new(0, 0)));
    let snap = view.application_snapshot().await;
    assert_eq!(snap.error_rate_percent, 0.0);
    assert!(!snap.error_rate_percent.is_nan());
    assert_eq!(snap.cache_hit_rate_percent, 0.0);
}

#[tokio::test]
async fn absent_job_store_falls_back_to_tally() {
    let collector = Arc::new(MetricsCollector::default());
    collector.record_job_event(JobEventKind::Created, "a", None);
    collector.record_job_event(JobEventKind::Created, "b", None);
    collector.record_job_event(JobEventKind::Processing, "a", None);
    collector.record_job_event(JobEventKind::Processing, "b", None);
    collector.record_job_event(JobEventKind::Completed, "a", Some(120.0));

    let view = ApplicationHealthView::new(collector);
    let snap = view.application_snapshot().await;
    assert_eq!(snap.active_jobs, 1);
    assert_eq!(snap.pending_jobs, 0);
    assert_eq!(snap.completed_jobs_today, 1);
    assert_eq!(snap.avg_job_duration_minutes, 2.0);
}

#[tokio::test]
async fn error_rate_stays_bounded_under_concurrent_writes() {
    let collector = Arc::new(MetricsCollector::default());
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let c = Arc::clone(&collector);
            std::thread::spawn(move || {
                let endpoint = format!("/w{t}");
                for _ in 0..5000 {
                    c.record_api_request(&endpoint, "POST", 500, 0.001);
                }
            })
        })
        .collect();

    let view = ApplicationHealthView::new(Arc::clone(&collector));
    while !writers.iter().all(|h| h.is_finished()) {
        let snap = view.application_snapshot().await;
        assert!(snap.error_rate_percent <= 100.0, "error rate {}", snap.error_rate_percent);
    }
    for h in writers {
        h.join().unwrap();
    }
    assert_eq!(view.application_snapshot().await.error_rate_percent, 100.0);
}

#[tokio::test]
async fn snapshot_reports_response_latency() {
    let collector = Arc::new(MetricsCollector::default());
    collector.record_api_request("/notes", "GET", 200, 0.1);
    collector.record_api_request("/notes", "GET", 200, 0.3);

    let snap = ApplicationHealthView::new(collector).application_snapshot().await;
    assert!((snap.avg_response_time_ms - 200.0).abs() < 1e-9);
    assert!((snap.p95_response_time_ms - 300.0).abs() < 1e-9);
}
