//! vigil core: runtime-free metric primitives shared by the monitor and by
//! host applications.
//!
//! This crate owns the metric data model (`MetricSample`, `MetricKey`), the
//! thread-safe `MetricsCollector`, the scoped `TimedScope` and the error
//! surface. It carries no async runtime so it can be linked into any host.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Metrics must never
//! take down the request path that records them: misuse is normalised and
//! logged instead of returned.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod collector;
pub mod error;
pub mod key;
pub mod sample;
pub mod timer;

pub use collector::{CollectorConfig, HistogramStats, JobEventKind, JobTally, MetricsCollector};
/// Shared result type.
pub use error::{ErrorKind, Result, VigilError};
pub use key::{MetricKey, Tags};
pub use sample::MetricSample;
pub use timer::TimedScope;
