// Logger initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "media_jobs=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter; `verbose` raises this crate to debug.
pub fn init_logger(verbose: bool) {
    let default = if verbose { "media_jobs=debug" } else { DEFAULT_FILTER };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
