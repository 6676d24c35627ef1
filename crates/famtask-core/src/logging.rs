//! Tracing setup for binaries
//!
//! Libraries only emit `tracing` events; installing a subscriber is left to
//! the binary. The filter comes from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment switch for JSON log lines
pub const LOG_JSON_ENV: &str = "FAMTASK_LOG_JSON";

/// Whether `FAMTASK_LOG_JSON` asks for JSON output
#[must_use]
pub fn json_requested() -> bool {
    std::env::var(LOG_JSON_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Install the global subscriber
///
/// Returns false if a subscriber was already installed.
pub fn init(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}
