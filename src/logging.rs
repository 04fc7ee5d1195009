use tracing_subscriber::EnvFilter;

/// Initialise logging at `info`, or at `debug` when requested.
/// In debug mode `RUST_LOG` may override the filter; otherwise it is ignored so a stray
/// variable in the user's environment cannot flood the console.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
