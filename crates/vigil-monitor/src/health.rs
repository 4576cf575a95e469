//! Application-level health derived from the collector and from three
//! external collaborators.
//!
//! Collaborators sit behind narrow async traits and are injected at
//! construction. A collaborator that is not configured contributes zeros.
//! A collaborator that errors makes the whole snapshot fall back to zeros,
//! so a dashboard never shows a mix of live and missing numbers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use vigil_core::collector::{API_REQUESTS_TOTAL, API_RESPONSE_TIME};
use vigil_core::error::Result;
use vigil_core::{JobTally, MetricsCollector};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Live job counts as reported by the job store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct JobCounts {
    pub active: i64,
    pub pending: i64,
    pub failed: i64,
    pub completed_today: i64,
    /// Seconds.
    pub total_processing_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// `hits / (hits + misses) * 100`, zero when nothing was looked up.
    pub fn hit_rate_percent(&self) -> f64 {
        let total = self.hits.saturating_add(self.misses);
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub bytes_stored: u64,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn job_counts(&self) -> Result<JobCounts>;
}

#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn cache_stats(&self) -> Result<CacheStats>;
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn storage_usage(&self) -> Result<StorageUsage>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSnapshot {
    pub active_jobs: i64,
    pub pending_jobs: i64,
    pub failed_jobs: i64,
    pub completed_jobs_today: i64,
    pub total_processing_time_hours: f64,
    pub avg_job_duration_minutes: f64,
    pub api_requests_per_minute: f64,
    pub error_rate_percent: f64,
    pub avg_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    pub cache_hit_rate_percent: f64,
    pub storage_usage_gb: f64,
    pub timestamp: DateTime<Utc>,
}

impl ApplicationSnapshot {
    pub fn zeroed() -> Self {
        Self {
            active_jobs: 0,
            pending_jobs: 0,
            failed_jobs: 0,
            completed_jobs_today: 0,
            total_processing_time_hours: 0.0,
            avg_job_duration_minutes: 0.0,
            api_requests_per_minute: 0.0,
            error_rate_percent: 0.0,
            avg_response_time_ms: 0.0,
            p95_response_time_ms: 0.0,
            cache_hit_rate_percent: 0.0,
            storage_usage_gb: 0.0,
            timestamp: Utc::now(),
        }
    }
}

pub struct ApplicationHealthView {
    collector: Arc<MetricsCollector>,
    jobs: Option<Arc<dyn JobStore>>,
    cache: Option<Arc<dyn CacheProvider>>,
    storage: Option<Arc<dyn StorageProvider>>,
}

impl ApplicationHealthView {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self {
            collector,
            jobs: None,
            cache: None,
            storage: None,
        }
    }

    pub fn with_job_store(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    /// Derive the application snapshot. Never fails; see module docs for the
    /// fallback policy.
    pub async fn application_snapshot(&self) -> ApplicationSnapshot {
        match self.try_snapshot().await {
            Ok(snap) => snap,
            Err(e) => {
                tracing::warn!(error = %e, code = e.kind().as_str(), "application snapshot failed; reporting zeros");
                ApplicationSnapshot::zeroed()
            }
        }
    }

    /// Raw cache counters, zero when the cache is absent or failing.
    pub async fn cache_stats(&self) -> CacheStats {
        match self.fetch_cache().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "cache stats unavailable");
                CacheStats::default()
            }
        }
    }

    async fn fetch_jobs(&self) -> Result<Option<JobCounts>> {
        match &self.jobs {
            Some(store) => store.job_counts().await.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_cache(&self) -> Result<CacheStats> {
        match &self.cache {
            Some(cache) => cache.cache_stats().await,
            None => Ok(CacheStats::default()),
        }
    }

    async fn fetch_storage(&self) -> Result<StorageUsage> {
        match &self.storage {
            Some(storage) => storage.storage_usage().await,
            None => Ok(StorageUsage::default()),
        }
    }

    async fn try_snapshot(&self) -> Result<ApplicationSnapshot> {
        // collaborator calls run outside the collector lock
        let (jobs, cache, storage) =
            futures_util::future::try_join3(self.fetch_jobs(), self.fetch_cache(), self.fetch_storage()).await?;

        let tally = self.collector.job_tally();
        let jobs = merge_jobs(jobs, &tally);

        let (requests, errors) = self.collector.api_totals();
        let error_rate_percent = errors as f64 / requests.max(1) as f64 * 100.0;

        let latency = self.collector.histogram_stats(API_RESPONSE_TIME, &[]);

        let since = Utc::now() - ChronoDuration::seconds(60);
        let api_requests_per_minute = self.collector.count_samples_since(API_REQUESTS_TOTAL, since) as f64;

        Ok(ApplicationSnapshot {
            active_jobs: jobs.active,
            pending_jobs: jobs.pending,
            failed_jobs: jobs.failed,
            completed_jobs_today: jobs.completed_today,
            total_processing_time_hours: jobs.total_processing_time / 3600.0,
            avg_job_duration_minutes: avg_job_minutes(&tally, &jobs),
            api_requests_per_minute,
            error_rate_percent,
            avg_response_time_ms: latency.mean * 1000.0,
            p95_response_time_ms: latency.p95 * 1000.0,
            cache_hit_rate_percent: cache.hit_rate_percent(),
            storage_usage_gb: storage.bytes_stored as f64 / BYTES_PER_GB,
            timestamp: Utc::now(),
        })
    }
}

/// Prefer the job store's live view; fall back to the in-process tally.
///
/// Both should normally agree. A mismatch is logged as a diagnostic only.
fn merge_jobs(store: Option<JobCounts>, tally: &JobTally) -> JobCounts {
    match store {
        Some(counts) => {
            if counts.failed != tally.failed && tally.failed > 0 {
                tracing::debug!(
                    store_failed = counts.failed,
                    tally_failed = tally.failed,
                    "job store and in-process tally disagree on failed jobs"
                );
            }
            JobCounts {
                total_processing_time: counts.total_processing_time.max(tally.total_processing_time),
                ..counts
            }
        }
        None => {
            let finished = tally.completed.saturating_add(tally.failed);
            JobCounts {
                active: tally.processing.saturating_sub(finished).max(0),
                pending: tally.created.saturating_sub(tally.processing).max(0),
                failed: tally.failed,
                completed_today: tally.completed,
                total_processing_time: tally.total_processing_time,
            }
        }
    }
}

fn avg_job_minutes(tally: &JobTally, jobs: &JobCounts) -> f64 {
    if tally.completed > 0 {
        return tally.total_processing_time / tally.completed as f64 / 60.0;
    }
    if jobs.completed_today > 0 {
        return jobs.total_processing_time / jobs.completed_today as f64 / 60.0;
    }
    0.0
}
