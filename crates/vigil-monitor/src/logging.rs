//! Tracing subscriber setup for hosts and the bundled binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Leaves an already-installed global subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if fmt().with_env_filter(filter).with_target(true).try_init().is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}
