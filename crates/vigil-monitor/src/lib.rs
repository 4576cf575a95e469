//! vigil monitor library entry.
//!
//! Wires host resource sampling, collaborator-backed application health, the
//! background monitoring loop and request instrumentation around the core
//! `MetricsCollector`. Consumed by the `vigil-monitor` binary and by host
//! applications that embed the service.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod health;
pub mod instrument;
pub mod logging;
pub mod sampler;
pub mod service;

pub use health::{
    ApplicationHealthView, ApplicationSnapshot, CacheProvider, CacheStats, JobCounts, JobStore, StorageProvider,
    StorageUsage,
};
pub use instrument::{EndpointInstrumentation, Instrumented};
pub use sampler::{ResourceProbe, ResourceSampler, SystemSnapshot};
pub use service::{ComprehensiveSnapshot, MonitoringService};
