//! File-backed settings store.
//!
//! The store keeps the settings document in a JSON file so an administrator
//! can change limits while the service runs. Every read fetches the file and
//! compares a digest of its contents with the one behind the cached
//! settings, so edits made through [`SettingsStore::update`] and edits made
//! by hand are both picked up, even when they keep the file's length and
//! modification time.

use crate::json_file::{parse_json_object, read_json_object, write_json_atomic};
use crate::{AdmissionLimits, LimitsProvider, Settings, SettingsUpdate};
use clause_error::{SettingsError, SettingsErrorKind, SettingsResult};
use serde_json::{Map, Value};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

/// What the file held when the cached settings were loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStamp {
    Missing,
    Present { len: usize, digest: u64 },
}

impl FileStamp {
    fn of(contents: Option<&str>) -> Self {
        match contents {
            None => Self::Missing,
            Some(contents) => {
                let mut hasher = DefaultHasher::new();
                contents.hash(&mut hasher);
                Self::Present {
                    len: contents.len(),
                    digest: hasher.finish(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedSettings {
    settings: Settings,
    stamp: FileStamp,
}

/// Settings persisted as a JSON document on disk.
///
/// A missing file means "all defaults". A file that cannot be read, is not
/// valid JSON, or holds invalid limits makes every read fail; admission
/// control then rejects requests instead of running without limits.
///
/// # Example
///
/// ```no_run
/// use clause_settings::{LimitsProvider, SettingsStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SettingsStore::new("data/settings.json");
/// let limits = store.current_limits()?;
/// println!("{} slots, {} queued", limits.max_concurrent, limits.max_queue);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    cache: RwLock<Option<CachedSettings>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Create a store for the document at `path`. The file need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the settings document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings, reloading the file if it changed since the last read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or validated.
    pub fn current(&self) -> SettingsResult<Settings> {
        let contents = self.read_contents()?;
        let stamp = FileStamp::of(contents.as_deref());

        if let Some(cached) = *self.cache.read().unwrap_or_else(PoisonError::into_inner) {
            if cached.stamp == stamp {
                return Ok(cached.settings);
            }
        }

        let settings = self.parse(contents.as_deref())?;
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) =
            Some(CachedSettings { settings, stamp });
        debug!(path = %self.path.display(), ?settings, "Settings reloaded");
        Ok(settings)
    }

    /// The full settings document, including keys this crate does not know,
    /// with defaults filled in for missing settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn document(&self) -> SettingsResult<Map<String, Value>> {
        let mut object = read_json_object(&self.path)?.unwrap_or_default();
        fill_defaults(&mut object)?;
        Ok(object)
    }

    /// Merge an update into the document and persist it atomically.
    ///
    /// Keys not named by the update (including unknown ones) are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the file untouched if the current document
    /// cannot be read or the merged settings fail validation.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn update(&self, update: &SettingsUpdate) -> SettingsResult<Settings> {
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut object = read_json_object(&self.path)?.unwrap_or_default();
        fill_defaults(&mut object)?;
        update.apply_to(&mut object);

        let settings = Settings::from_object(&object)?;
        settings.validate()?;
        write_json_atomic(&self.path, &object)?;
        self.invalidate();

        info!(?settings, "Settings updated");
        Ok(settings)
    }

    /// Overwrite the document with the default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn reset(&self) -> SettingsResult<Settings> {
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let settings = Settings::default();
        write_json_atomic(&self.path, &settings)?;
        self.invalidate();

        warn!("Settings reset to defaults");
        Ok(settings)
    }

    fn parse(&self, contents: Option<&str>) -> SettingsResult<Settings> {
        let settings = match contents {
            Some(contents) => Settings::from_object(&parse_json_object(&self.path, contents)?)?,
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn read_contents(&self) -> SettingsResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn invalidate(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[track_caller]
    fn io_error(&self, err: std::io::Error) -> SettingsError {
        SettingsError::new(SettingsErrorKind::Io(format!(
            "{}: {}",
            self.path.display(),
            err
        )))
    }
}

impl LimitsProvider for SettingsStore {
    fn current_limits(&self) -> SettingsResult<AdmissionLimits> {
        Ok(self.current()?.limits())
    }

    fn current_rate_limit(&self) -> SettingsResult<u32> {
        Ok(self.current()?.rate_limit_per_minute)
    }
}

fn fill_defaults(object: &mut Map<String, Value>) -> SettingsResult<()> {
    let defaults = serde_json::to_value(Settings::default())
        .map_err(|e| SettingsError::new(SettingsErrorKind::Serialize(e.to_string())))?;
    if let Value::Object(defaults) = defaults {
        for (key, value) in defaults {
            object.entry(key).or_insert(value);
        }
    }
    Ok(())
}
