use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// `info` filter; `crate_name` is always allowed at `debug` in debug builds.
pub fn init(crate_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        let directives = if cfg!(debug_assertions) {
            format!("{DEFAULT_FILTER},{}=debug", crate_name.replace('-', "_"))
        } else {
            DEFAULT_FILTER.to_owned()
        };
        EnvFilter::try_new(directives)
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialise tracing for the calling crate.
#[macro_export]
macro_rules! init_tracing {
    () => {
        $crate::logging::init(env!("CARGO_PKG_NAME"))
    };
}
