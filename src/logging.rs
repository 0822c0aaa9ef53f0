//! Tracing subscriber setup

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging for the binary.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level:
/// 0 is `warn`, 1 is `debug`, anything higher is `trace`.
///
/// ```no_run
/// planit::logging::init(1);
/// ```
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Logging for tests; safe to call more than once.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
