//! Logging initialization

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `default_level`.
///
/// # Errors
///
/// Fails on an unparseable filter or when a subscriber is already installed.
pub fn init(default_level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{default_level}': {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    // Separate paths because the layer types differ
    if json {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()?;
    }

    Ok(())
}
