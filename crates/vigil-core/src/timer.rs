//! Scoped duration recording.
//!
//! A `TimedScope` captures `Instant::now()` on creation and records the
//! elapsed seconds into a histogram when dropped. Drop runs on normal return,
//! on early `?` exits and while unwinding from a panic, so every exit path is
//! covered. A scope that is leaked (`mem::forget`) records nothing.

use std::time::{Duration, Instant};

use crate::collector::MetricsCollector;
use crate::key::{normalize_tags, Tags};

#[must_use = "the duration is recorded when the scope is dropped"]
pub struct TimedScope<'a> {
    collector: &'a MetricsCollector,
    name: String,
    tags: Tags,
    start: Instant,
}

impl<'a> TimedScope<'a> {
    pub fn new(collector: &'a MetricsCollector, name: &str, tags: &[(&str, &str)]) -> Self {
        Self {
            collector,
            name: name.to_string(),
            tags: normalize_tags(tags),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimedScope<'_> {
    fn drop(&mut self) {
        let secs = self.start.elapsed().as_secs_f64();
        let tags = std::mem::take(&mut self.tags);
        self.collector
            .record_histogram_tags(&self.name, secs, tags, Some("seconds"));
    }
}

impl MetricsCollector {
    /// Start timing; the histogram sample is written when the guard drops.
    pub fn timed(&self, name: &str, tags: &[(&str, &str)]) -> TimedScope<'_> {
        TimedScope::new(self, name, tags)
    }
}
