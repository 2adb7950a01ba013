//! Logging setup for processes embedding the querier

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over `log_level`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(log_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
