//! Tracing subscriber setup for binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const MAX_FILTER_LEN: usize = 4096;

/// Builds the filter from a raw `RUST_LOG` value. Tracing stays off when the
/// value is missing, blank, oversized or invalid.
#[must_use]
pub fn env_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty() && raw.len() <= MAX_FILTER_LEN)
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("off"))
}

/// Installs the global subscriber with a `fmt` layer filtered by
/// `RUST_LOG`. Later calls are no-ops.
pub fn init_tracing() {
    let raw = std::env::var("RUST_LOG").ok();
    let filter = env_filter(raw.as_deref());
    if tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
