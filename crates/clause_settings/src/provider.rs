//! The contract admission control reads its limits through.

use crate::{AdmissionLimits, Settings, SettingsUpdate};
use clause_error::SettingsResult;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, instrument};

/// Source of the current admission limits.
///
/// Implementations must be safe to call from many tasks at once and must
/// reflect administrative changes without a restart. Callers re-read the
/// limits for every decision and never cache them.
///
/// An `Err` means the limits are unknown; admission control treats that as
/// a reason to reject rather than to run unbounded.
pub trait LimitsProvider: Send + Sync {
    /// Concurrency ceiling and queue size.
    fn current_limits(&self) -> SettingsResult<AdmissionLimits>;

    /// Requests each client may make per rolling minute.
    fn current_rate_limit(&self) -> SettingsResult<u32>;
}

/// In-memory settings shared between an administrator and admission control.
///
/// Cloning yields another handle to the same settings.
///
/// # Example
///
/// ```
/// use clause_settings::{LimitsProvider, SettingsUpdate, SharedSettings};
///
/// let settings = SharedSettings::default();
/// settings
///     .update(&SettingsUpdate {
///         max_queue_size: Some(1),
///         ..Default::default()
///     })
///     .unwrap();
/// assert_eq!(settings.current_limits().unwrap().max_queue, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    /// Create shared settings with the given initial values.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn new(settings: Settings) -> SettingsResult<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    /// Shared settings with only the admission limits changed from the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_concurrent` or `rate_limit_per_minute` is zero.
    pub fn with_limits(
        max_concurrent: usize,
        max_queue: usize,
        rate_limit_per_minute: u32,
    ) -> SettingsResult<Self> {
        Self::new(Settings {
            max_concurrent_requests: max_concurrent,
            max_queue_size: max_queue,
            rate_limit_per_minute,
            ..Settings::default()
        })
    }

    /// Current settings.
    pub fn get(&self) -> Settings {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the settings unchanged if validation fails.
    #[instrument(skip(self))]
    pub fn set(&self, settings: Settings) -> SettingsResult<()> {
        settings.validate()?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
        debug!("Settings replaced");
        Ok(())
    }

    /// Merge an update into the settings, returning the result.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the settings unchanged if the merged
    /// settings fail validation.
    #[instrument(skip(self))]
    pub fn update(&self, update: &SettingsUpdate) -> SettingsResult<Settings> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let merged = guard.merged(update);
        merged.validate()?;
        *guard = merged;
        debug!(?merged, "Settings updated");
        Ok(merged)
    }
}

impl LimitsProvider for SharedSettings {
    fn current_limits(&self) -> SettingsResult<AdmissionLimits> {
        Ok(self.get().limits())
    }

    fn current_rate_limit(&self) -> SettingsResult<u32> {
        Ok(self.get().rate_limit_per_minute)
    }
}
