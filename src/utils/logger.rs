// Logger initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "asset_publisher=debug"
    } else {
        "asset_publisher=info"
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the verbosity flag.
pub fn init_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
