//! Settings store error types.

/// Kinds of settings errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SettingsErrorKind {
    /// Failed to read or write the settings file
    #[display("Settings file I/O failed: {}", _0)]
    Io(String),
    /// Settings file is not valid JSON or has the wrong shape
    #[display("Failed to parse settings: {}", _0)]
    Parse(String),
    /// Failed to serialize settings
    #[display("Failed to serialize settings: {}", _0)]
    Serialize(String),
    /// A setting holds a value outside its allowed range
    #[display("Invalid value for '{}': {}", field, reason)]
    Invalid {
        /// The setting name
        field: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Settings error with location tracking.
///
/// # Examples
///
/// ```
/// use clause_error::{SettingsError, SettingsErrorKind};
///
/// let err = SettingsError::new(SettingsErrorKind::Invalid {
///     field: "max_concurrent_requests".to_string(),
///     reason: "must be at least 1".to_string(),
/// });
/// assert!(format!("{}", err).contains("max_concurrent_requests"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Settings Error: {} at line {} in {}", kind, line, file)]
pub struct SettingsError {
    /// The kind of error that occurred
    pub kind: SettingsErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SettingsError {
    /// Create a new settings error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SettingsErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SettingsErrorKind {
        &self.kind
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
