//! Service configuration errors.

use std::fmt::Display;

/// The startup configuration could not be used.
///
/// Raised while layering the TOML files and `CLAUSE__*` overrides, or while
/// installing the log subscriber they describe. The settings document an
/// administrator edits at runtime reports through [`crate::SettingsError`]
/// instead.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Service configuration error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What went wrong
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new error with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use clause_error::ConfigError;
    ///
    /// let err = ConfigError::new("admission.recheck_interval_ms must be a number");
    /// assert!(err.message.starts_with("admission.recheck_interval_ms"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Wrap a failure from one startup step, naming the step.
    ///
    /// ```
    /// use clause_error::ConfigError;
    ///
    /// let err = ConfigError::during("parse configuration", "invalid type: string \"soon\"");
    /// assert_eq!(err.message, "Failed to parse configuration: invalid type: string \"soon\"");
    /// ```
    #[track_caller]
    pub fn during(step: &str, cause: impl Display) -> Self {
        Self::new(format!("Failed to {}: {}", step, cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_points_at_caller() {
        let err = ConfigError::during("install log subscriber", "already set");
        assert!(err.file.ends_with("config.rs"));
        assert!(err.to_string().starts_with("Service configuration error: Failed to install"));
    }
}
