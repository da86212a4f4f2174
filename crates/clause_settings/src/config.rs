//! Service configuration loaded from TOML at startup.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (`clause.toml` shipped with the workspace)
//! 2. `~/.config/clause/clause.toml`
//! 3. `./clause.toml`
//! 4. An explicit file passed on the command line
//! 5. `CLAUSE__*` environment variables (`CLAUSE__ADMISSION__RECHECK_INTERVAL_MS=250`)
//!
//! Admission *limits* are not part of this file; they live in the runtime
//! settings document so they can change without a restart.

use ::config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use clause_error::{ClauseResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../clause.toml");

/// Top-level service configuration.
///
/// # Example
///
/// ```no_run
/// use clause_settings::ServiceConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServiceConfig::load()?;
/// println!("settings at {}", config.settings.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Where the runtime settings document lives
    #[serde(default)]
    pub settings: SettingsConfig,

    /// Admission control tuning
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location of the runtime settings document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// Path to the JSON settings document
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("data/settings.json")
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

/// Admission control tuning that is fixed for the life of the process.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(default)]
pub struct AdmissionConfig {
    /// How often queued callers re-check the limits, in milliseconds.
    ///
    /// Releases wake queued callers directly; the re-check only matters when
    /// an administrator raises the concurrency limit while callers wait.
    #[serde(default = "default_recheck_interval_ms")]
    recheck_interval_ms: u64,

    /// Length of the per-client rate window in seconds
    #[serde(default = "default_rate_window_secs")]
    rate_window_secs: u64,

    /// Client count above which idle rate-limit entries are purged
    #[serde(default = "default_max_tracked_clients")]
    max_tracked_clients: usize,
}

fn default_recheck_interval_ms() -> u64 {
    1000
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_max_tracked_clients() -> usize {
    10_000
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            recheck_interval_ms: default_recheck_interval_ms(),
            rate_window_secs: default_rate_window_secs(),
            max_tracked_clients: default_max_tracked_clients(),
        }
    }
}

impl AdmissionConfig {
    /// Creates a new admission config builder.
    pub fn builder() -> AdmissionConfigBuilder {
        AdmissionConfigBuilder::default()
    }

    /// Re-check interval for queued callers (never shorter than 1 ms).
    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms.max(1))
    }

    /// Rate window length (never shorter than 1 s).
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs.max(1))
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "clause_admission=debug")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from every source, without an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if a present source cannot be read or parsed.
    pub fn load() -> ClauseResult<Self> {
        Self::load_with(None)
    }

    /// Load configuration from every source, with `explicit` (when given)
    /// overriding the user files. An explicit file must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing or any source
    /// cannot be parsed.
    #[instrument]
    pub fn load_with(explicit: Option<&Path>) -> ClauseResult<Self> {
        debug!("Loading configuration with precedence: env > explicit > current dir > home dir > bundled defaults");

        let mut builder = Self::defaults();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/clause/clause.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("clause").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CLAUSE")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Load configuration from a single file layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> ClauseResult<Self> {
        debug!("Loading configuration from file");
        let builder = Self::defaults().add_source(File::from(path.as_ref()).required(true));
        Self::finish(builder)
    }

    fn defaults() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> ClauseResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::during("build configuration", e))?
            .try_deserialize()
            .map_err(|e| ConfigError::during("parse configuration", e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_match_struct_defaults() {
        let config = ServiceConfig::finish(ServiceConfig::defaults()).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_builder_fills_unset_fields_with_defaults() {
        let admission = AdmissionConfig::builder()
            .recheck_interval_ms(50u64)
            .build()
            .unwrap();

        assert_eq!(admission.recheck_interval(), Duration::from_millis(50));
        assert_eq!(*admission.rate_window_secs(), 60);
        assert_eq!(*admission.max_tracked_clients(), 10_000);
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let admission = AdmissionConfig::builder()
            .recheck_interval_ms(0u64)
            .rate_window_secs(0u64)
            .build()
            .unwrap();

        assert_eq!(admission.recheck_interval(), Duration::from_millis(1));
        assert_eq!(admission.rate_window(), Duration::from_secs(1));
    }
}
