//! Logging setup and segment prefixes.
//!
//! The library only emits `tracing` events. Native binaries and tests install
//! a subscriber with [`init`] or [`init_with_filter`].

#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with the `info` default filter.
#[cfg(not(target_arch = "wasm32"))]
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// `RUST_LOG` takes precedence when set. Safe to call more than once; only
/// the first call installs a subscriber.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Segment prefixes for log lines.
pub mod prefix {
    /// Database operations prefix
    pub const DB: &str = "⊔";
    /// Store opening prefix
    pub const OPEN: &str = "✿";
    /// Store closing prefix
    pub const CLOSE: &str = "❀";
}
