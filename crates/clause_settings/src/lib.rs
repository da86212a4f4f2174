//! Admission limits, the admin-editable settings document, and service configuration.
//!
//! Two kinds of configuration live here:
//!
//! - **Settings** - the JSON document an administrator edits at runtime
//!   (`max_concurrent_requests`, `max_queue_size`, `rate_limit_per_minute`, ...).
//!   Consumers read it through the [`LimitsProvider`] trait on every decision,
//!   so edits take effect without a restart.
//! - **Service configuration** - the TOML file read once at startup
//!   (settings path, re-check interval, rate window, logging).
//!
//! ```no_run
//! use clause_settings::{LimitsProvider, SettingsStore, SettingsUpdate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SettingsStore::new("data/settings.json");
//! store.update(&SettingsUpdate {
//!     max_concurrent_requests: Some(3),
//!     ..Default::default()
//! })?;
//! assert_eq!(store.current_limits()?.max_concurrent, 3);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod json_file;
mod provider;
mod settings;
mod store;

pub use config::{
    AdmissionConfig, AdmissionConfigBuilder, LoggingConfig, ServiceConfig, SettingsConfig,
};
pub use json_file::{read_json_object, write_json_atomic};
pub use provider::{LimitsProvider, SharedSettings};
pub use settings::{AdmissionLimits, Settings, SettingsUpdate};
pub use store::SettingsStore;
