//! vigil-monitor
//!
//! Runs the monitoring loop standalone: loads `vigil.yaml` (or the path given
//! as the first argument, or defaults when neither exists), samples until
//! Ctrl-C, then prints the comprehensive snapshot as JSON and stops.

use std::path::Path;
use std::sync::Arc;

use vigil_core::error::Result;
use vigil_core::MetricsCollector;
use vigil_monitor::config::{self, VigilConfig};
use vigil_monitor::{logging, ApplicationHealthView, MonitoringService, ResourceSampler};

const DEFAULT_CONFIG_PATH: &str = "vigil.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("info");

    let path = std::env::args().nth(1);
    let cfg = match path.as_deref() {
        Some(p) => config::load_from_file(p)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => config::load_from_file(DEFAULT_CONFIG_PATH)?,
        None => VigilConfig::default(),
    };

    let collector = Arc::new(MetricsCollector::new(cfg.collector.to_collector_config()));
    let health = ApplicationHealthView::new(collector);
    let sampler = Arc::new(ResourceSampler::new(cfg.monitor.disk_path.clone()));
    let service = MonitoringService::new(health, sampler, cfg.monitor.clone());

    tracing::info!(interval_secs = cfg.monitor.interval_secs, "vigil-monitor starting");
    service.start_default();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed; shutting down");
    }

    let snapshot = service.comprehensive_snapshot().await;
    println!("{}", snapshot.to_json()?);

    service.stop().await;
    Ok(())
}
