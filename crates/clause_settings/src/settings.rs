//! The admin-editable settings document.

use clause_error::{SettingsError, SettingsErrorKind, SettingsResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Runtime settings persisted as a JSON document.
///
/// Missing keys fall back to their defaults, so a partial file (or no file
/// at all) is a valid settings document.
///
/// # Example
///
/// ```json
/// {
///   "max_file_size_mb": 50,
///   "max_audio_file_size_mb": 100,
///   "max_queue_size": 5,
///   "max_concurrent_requests": 5,
///   "rate_limit_per_minute": 10
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Settings {
    /// Largest accepted document upload in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Largest accepted audio upload in megabytes
    #[serde(default = "default_max_audio_file_size_mb")]
    pub max_audio_file_size_mb: u64,

    /// Callers allowed to wait for a slot
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Callers allowed to run the protected work at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Requests each client may make per rolling minute
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

fn default_max_file_size_mb() -> u64 {
    50
}

fn default_max_audio_file_size_mb() -> u64 {
    100
}

fn default_max_queue_size() -> usize {
    5
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_rate_limit_per_minute() -> u32 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            max_audio_file_size_mb: default_max_audio_file_size_mb(),
            max_queue_size: default_max_queue_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl Settings {
    /// Validates that every limit is usable.
    ///
    /// A queue size of zero is allowed (callers are rejected instead of
    /// queued); every other limit must be at least one.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsErrorKind::Invalid`] naming the first bad field.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.max_concurrent_requests == 0 {
            return Err(invalid("max_concurrent_requests", "must be at least 1"));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(invalid("rate_limit_per_minute", "must be at least 1"));
        }
        if self.max_file_size_mb == 0 {
            return Err(invalid("max_file_size_mb", "must be at least 1"));
        }
        if self.max_audio_file_size_mb == 0 {
            return Err(invalid("max_audio_file_size_mb", "must be at least 1"));
        }
        Ok(())
    }

    /// The admission limits carried by these settings.
    pub fn limits(&self) -> AdmissionLimits {
        AdmissionLimits {
            max_concurrent: self.max_concurrent_requests,
            max_queue: self.max_queue_size,
        }
    }

    /// Upload ceiling for documents in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Upload ceiling for audio files in bytes.
    pub fn max_audio_file_size_bytes(&self) -> u64 {
        self.max_audio_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Parse settings out of a JSON object, ignoring keys this type does not know.
    pub fn from_object(object: &Map<String, Value>) -> SettingsResult<Self> {
        serde_json::from_value(Value::Object(object.clone()))
            .map_err(|e| SettingsError::new(SettingsErrorKind::Parse(e.to_string())))
    }

    /// Apply an update, returning the merged settings.
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            max_file_size_mb: update.max_file_size_mb.unwrap_or(self.max_file_size_mb),
            max_audio_file_size_mb: update
                .max_audio_file_size_mb
                .unwrap_or(self.max_audio_file_size_mb),
            max_queue_size: update.max_queue_size.unwrap_or(self.max_queue_size),
            max_concurrent_requests: update
                .max_concurrent_requests
                .unwrap_or(self.max_concurrent_requests),
            rate_limit_per_minute: update
                .rate_limit_per_minute
                .unwrap_or(self.rate_limit_per_minute),
        }
    }
}

#[track_caller]
fn invalid(field: &str, reason: &str) -> SettingsError {
    SettingsError::new(SettingsErrorKind::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    })
}

/// Snapshot of the admission limits used for a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdmissionLimits {
    /// Slots that may run the protected work at once
    pub max_concurrent: usize,
    /// Callers that may wait for a slot
    pub max_queue: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Settings::default().limits()
    }
}

/// Partial settings change submitted by an administrator.
///
/// Only fields that are `Some` change; everything else keeps its current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    /// New document upload ceiling in megabytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<u64>,
    /// New audio upload ceiling in megabytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_audio_file_size_mb: Option<u64>,
    /// New queue size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue_size: Option<usize>,
    /// New concurrency ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests: Option<usize>,
    /// New per-client rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
}

impl SettingsUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the present fields into a JSON object, leaving other keys alone.
    pub fn apply_to(&self, object: &mut Map<String, Value>) {
        if let Some(v) = self.max_file_size_mb {
            object.insert("max_file_size_mb".into(), v.into());
        }
        if let Some(v) = self.max_audio_file_size_mb {
            object.insert("max_audio_file_size_mb".into(), v.into());
        }
        if let Some(v) = self.max_queue_size {
            object.insert("max_queue_size".into(), v.into());
        }
        if let Some(v) = self.max_concurrent_requests {
            object.insert("max_concurrent_requests".into(), v.into());
        }
        if let Some(v) = self.rate_limit_per_minute {
            object.insert("rate_limit_per_minute".into(), v.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_service_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_concurrent_requests, 5);
        assert_eq!(settings.max_queue_size, 5);
        assert_eq!(settings.rate_limit_per_minute, 10);
        assert_eq!(settings.max_file_size_bytes(), 50 * 1024 * 1024);
        assert_eq!(settings.max_audio_file_size_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let value = json!({ "max_queue_size": 0, "theme": "dark" });
        let Value::Object(object) = value else {
            unreachable!()
        };

        let settings = Settings::from_object(&object).unwrap();
        assert_eq!(settings.max_queue_size, 0);
        assert_eq!(settings.max_concurrent_requests, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let settings = Settings {
            max_concurrent_requests: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err.kind(),
            SettingsErrorKind::Invalid { field, .. } if field == "max_concurrent_requests"
        ));

        let settings = Settings {
            rate_limit_per_minute: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut object = Map::new();
        object.insert("theme".into(), json!("dark"));
        object.insert("max_queue_size".into(), json!(5));

        let update = SettingsUpdate {
            max_queue_size: Some(2),
            rate_limit_per_minute: Some(30),
            ..Default::default()
        };
        update.apply_to(&mut object);

        assert_eq!(object["theme"], json!("dark"));
        assert_eq!(object["max_queue_size"], json!(2));
        assert_eq!(object["rate_limit_per_minute"], json!(30));
        assert!(!object.contains_key("max_concurrent_requests"));

        let merged = Settings::default().merged(&update);
        assert_eq!(merged.max_queue_size, 2);
        assert_eq!(merged.rate_limit_per_minute, 30);
        assert_eq!(merged.max_concurrent_requests, 5);
    }
}
