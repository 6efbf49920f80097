//! Logging bootstrap.
//!
//! Library code only emits `tracing` events. Binaries and tests call
//! [`init`] once to install a subscriber; `RUST_LOG` wins over the configured
//! level.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install a global `tracing` subscriber for `config`.
///
/// Returns `false` if a global subscriber was already installed, which
/// makes repeated calls from tests harmless.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(false).boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok()
}

/// Install a subscriber suitable for tests: captured output, `warn` by default.
pub fn init_for_tests() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init().is_ok()
}
