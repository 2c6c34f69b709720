//! Structured logging setup.
//!
//! `RUST_LOG` controls filtering; `HERMES_LOG_FORMAT=json` switches to
//! line-oriented JSON for log shippers.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Call once, first thing.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("HERMES_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
