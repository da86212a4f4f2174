//! Top-level error wrapper types.

use crate::{AdmissionError, ConfigError, SettingsError};

/// Every error a Clause operation can surface.
///
/// # Examples
///
/// ```
/// use clause_error::{ClauseError, ConfigError};
///
/// let config_err = ConfigError::new("Missing [admission] table");
/// let err: ClauseError = config_err.into();
/// assert!(format!("{}", err).contains("Service configuration error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ClauseErrorKind {
    /// Admission control rejected or abandoned the request
    #[from(AdmissionError)]
    Admission(AdmissionError),
    /// Settings document error
    #[from(SettingsError)]
    Settings(SettingsError),
    /// Service configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Clause error with kind discrimination.
///
/// # Examples
///
/// ```
/// use clause_error::{ClauseResult, ConfigError};
///
/// fn might_fail() -> ClauseResult<()> {
///     Err(ConfigError::new("Missing [logging] level"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Clause Error: {}", _0)]
pub struct ClauseError(Box<ClauseErrorKind>);

impl ClauseError {
    /// Create a new error from a kind.
    pub fn new(kind: ClauseErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ClauseErrorKind {
        &self.0
    }

    /// The admission error, if this error came from admission control.
    pub fn as_admission(&self) -> Option<&AdmissionError> {
        match self.kind() {
            ClauseErrorKind::Admission(err) => Some(err),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to ClauseErrorKind
impl<T> From<T> for ClauseError
where
    T: Into<ClauseErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Clause operations.
pub type ClauseResult<T> = std::result::Result<T, ClauseError>;
