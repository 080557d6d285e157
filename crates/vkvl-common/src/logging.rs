use tracing_subscriber::{fmt, EnvFilter};

/// Name of the environment variable holding the log filter directive.
pub const LOG_ENV: &str = "VKVL_LOG";

/// Initialize structured logging with environment filter.
/// Set VKVL_LOG=debug (or trace, info, warn, error) for verbosity control.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Same as [`init_logging`], but falls back to `default_filter` when
/// `VKVL_LOG` is unset or unparsable.
///
/// The layer is loaded into someone else's process, which may already have
/// installed a global subscriber. In that case this is a no-op.
pub fn init_logging_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
