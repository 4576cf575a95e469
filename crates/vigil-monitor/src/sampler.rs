//! Host resource sampling.
//!
//! `ResourceSampler::sample` never fails. Each probe that cannot answer
//! (missing `/proc`, unsupported platform, unknown mount) leaves its fields
//! at zero and logs why.
//!
//! `active_connections` is approximated from the kernel TCP tables
//! (`/proc/net/tcp` and `/proc/net/tcp6`): every socket that is not in LISTEN
//! state is counted. This is host-wide rather than per-process, and is zero on
//! platforms without procfs.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Disks, Networks, System};

use vigil_core::error::{Result, VigilError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const TCP_LISTEN_STATE: &str = "0A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub disk_usage_percent: f64,
    pub disk_free_gb: f64,
    pub network_bytes_sent: u64,
    pub network_bytes_recv: u64,
    pub active_connections: u64,
    pub load_average: [f64; 3],
    pub timestamp: DateTime<Utc>,
}

impl SystemSnapshot {
    pub fn zeroed() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            memory_used_mb: 0.0,
            memory_total_mb: 0.0,
            disk_usage_percent: 0.0,
            disk_free_gb: 0.0,
            network_bytes_sent: 0,
            network_bytes_recv: 0,
            active_connections: 0,
            load_average: [0.0; 3],
            timestamp: Utc::now(),
        }
    }
}

/// Source of host snapshots. Implemented by `ResourceSampler`; tests swap in
/// their own.
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> SystemSnapshot;
}

/// sysinfo-backed sampler.
///
/// CPU usage is a delta between two refreshes, so the first sample after
/// construction reads close to zero; later samples reflect the interval
/// since the previous call.
pub struct ResourceSampler {
    sys: Mutex<System>,
    disk_path: String,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new("/")
    }
}

impl ResourceSampler {
    pub fn new(disk_path: impl Into<String>) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        Self {
            sys: Mutex::new(sys),
            disk_path: disk_path.into(),
        }
    }

    fn sample_disk(&self, snap: &mut SystemSnapshot) {
        let disks = Disks::new_with_refreshed_list();
        let target = Path::new(&self.disk_path);
        // longest mount point that contains the configured path
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());

        let Some(disk) = disk else {
            tracing::debug!(path = %self.disk_path, "no disk found for path; disk fields left at zero");
            return;
        };
        let total = disk.total_space();
        let free = disk.available_space();
        if total > 0 {
            snap.disk_usage_percent = total.saturating_sub(free) as f64 / total as f64 * 100.0;
        }
        snap.disk_free_gb = free as f64 / BYTES_PER_GB;
    }

    fn sample_network(snap: &mut SystemSnapshot) {
        let networks = Networks::new_with_refreshed_list();
        for data in networks.list().values() {
            snap.network_bytes_sent = snap.network_bytes_sent.saturating_add(data.total_transmitted());
            snap.network_bytes_recv = snap.network_bytes_recv.saturating_add(data.total_received());
        }
    }
}

impl ResourceProbe for ResourceSampler {
    fn sample(&self) -> SystemSnapshot {
        let mut snap = SystemSnapshot::zeroed();
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            tracing::warn!("host resource sampling is not supported on this platform");
            return snap;
        }

        {
            let mut sys = self.sys.lock();
            sys.refresh_cpu();
            sys.refresh_memory();

            snap.cpu_percent = f64::from(sys.global_cpu_info().cpu_usage());
            let total = sys.total_memory();
            let used = sys.used_memory();
            snap.memory_total_mb = total as f64 / BYTES_PER_MB;
            snap.memory_used_mb = used as f64 / BYTES_PER_MB;
            if total > 0 {
                snap.memory_percent = used as f64 / total as f64 * 100.0;
            }
        }

        self.sample_disk(&mut snap);
        Self::sample_network(&mut snap);

        match count_tcp_connections() {
            Ok(n) => snap.active_connections = n,
            Err(e) => tracing::warn!(error = %e, "connection count unavailable"),
        }

        let load = System::load_average();
        snap.load_average = [load.one, load.five, load.fifteen];

        snap.timestamp = Utc::now();
        snap
    }
}

#[cfg(target_os = "linux")]
fn count_tcp_connections() -> Result<u64> {
    let mut total = 0;
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        match std::fs::read_to_string(table) {
            Ok(body) => total += count_non_listening(&body),
            // tcp6 is absent when IPv6 is disabled
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && table.ends_with('6') => {}
            Err(e) => return Err(VigilError::Sampling(format!("read {table}: {e}"))),
        }
    }
    Ok(total)
}

#[cfg(not(target_os = "linux"))]
fn count_tcp_connections() -> Result<u64> {
    Err(VigilError::Sampling("no procfs TCP tables on this platform".into()))
}

/// Count rows of a procfs TCP table whose state column is not LISTEN.
fn count_non_listening(table: &str) -> u64 {
    table
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .filter(|state| *state != TCP_LISTEN_STATE)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_non_listening_sockets() {
        let table = "  sl  local_address rem_address   st tx_queue rx_queue\n\
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000\n\
   1: 0100007F:1F90 0100007F:A2C4 01 00000000:00000000 00:00000000\n\
   2: 0100007F:A2C4 0100007F:1F90 06 00000000:00000000 00:00000000\n";
        assert_eq!(count_non_listening(table), 2);
        assert_eq!(count_non_listening(""), 0);
    }

    #[test]
    fn sample_is_well_formed() {
        let sampler = ResourceSampler::default();
        let snap = sampler.sample();
        assert!(snap.cpu_percent >= 0.0);
        assert!((0.0..=100.0).contains(&snap.memory_percent));
        assert!((0.0..=100.0).contains(&snap.disk_usage_percent));
        assert!(snap.load_average.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn unknown_mount_leaves_disk_fields_zero() {
        let sampler = ResourceSampler::new("relative/not/a/mount");
        let snap = sampler.sample();
        assert_eq!(snap.disk_usage_percent, 0.0);
        assert_eq!(snap.disk_free_gb, 0.0);
    }
}
