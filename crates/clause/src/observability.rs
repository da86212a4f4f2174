//! Log subscriber setup for the `clause` binary and embedders.

use clause_error::{ClauseResult, ConfigError};
use clause_settings::LoggingConfig;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `verbose` forces `debug`; otherwise `RUST_LOG` wins over the configured
/// level. Output goes to stderr so command output on stdout stays clean.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> ClauseResult<()> {
    let env_filter = if verbose {
        EnvFilter::try_new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))
    }
    .map_err(|e| ConfigError::new(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::during("install log subscriber", e))?;

    Ok(())
}
