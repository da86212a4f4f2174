//! Admission error types.

/// Reasons a request was not admitted to the protected work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AdmissionErrorKind {
    /// Every slot is busy and the waiting area is full.
    #[display("System overloaded. Try again later (in 1-2 minutes).")]
    Overloaded,

    /// The client exceeded its per-minute request allowance.
    #[display(
        "Request limit exceeded ({} requests per minute). Retry in {} seconds.",
        limit,
        retry_after_secs
    )]
    RateLimited {
        /// Requests allowed per rolling minute
        limit: u32,
        /// Seconds until the client's window frees an attempt
        retry_after_secs: u64,
    },

    /// Admission limits could not be read, so nothing is admitted.
    #[display("Admission limits unavailable: {}", _0)]
    ConfigurationUnavailable(String),

    /// The caller abandoned its place in the queue.
    #[display("Queued request cancelled before a slot became available")]
    Cancelled,
}

/// Admission error with location tracking.
///
/// # Examples
///
/// ```
/// use clause_error::{AdmissionError, AdmissionErrorKind};
///
/// let err = AdmissionError::new(AdmissionErrorKind::RateLimited {
///     limit: 10,
///     retry_after_secs: 42,
/// });
/// assert_eq!(err.retry_after_secs(), Some(42));
/// assert!(format!("{}", err).contains("Retry in 42 seconds"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Admission Error: {} at line {} in {}", kind, line, file)]
pub struct AdmissionError {
    /// The specific error kind
    pub kind: AdmissionErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl AdmissionError {
    /// Create a new admission error with location tracking.
    #[track_caller]
    pub fn new(kind: AdmissionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AdmissionErrorKind {
        &self.kind
    }

    /// Retry hint carried by rate-limit rejections.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.kind {
            AdmissionErrorKind::RateLimited {
                retry_after_secs, ..
            } => Some(retry_after_secs),
            _ => None,
        }
    }

    /// Whether the caller should be told to come back later.
    ///
    /// Overload and rate limiting clear on their own; missing configuration
    /// and cancellation do not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            AdmissionErrorKind::Overloaded | AdmissionErrorKind::RateLimited { .. }
        )
    }
}

impl From<AdmissionErrorKind> for AdmissionError {
    #[track_caller]
    fn from(kind: AdmissionErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overload_and_rate_limit_messages_differ() {
        let overloaded = AdmissionError::new(AdmissionErrorKind::Overloaded);
        let limited = AdmissionError::new(AdmissionErrorKind::RateLimited {
            limit: 10,
            retry_after_secs: 7,
        });

        assert!(overloaded.to_string().contains("System overloaded"));
        assert!(limited.to_string().contains("10 requests per minute"));
        assert_ne!(overloaded.kind.to_string(), limited.kind.to_string());
    }

    #[test]
    fn test_transient_classification() {
        assert!(AdmissionError::new(AdmissionErrorKind::Overloaded).is_transient());
        assert!(!AdmissionError::new(AdmissionErrorKind::Cancelled).is_transient());
        assert!(
            !AdmissionError::new(AdmissionErrorKind::ConfigurationUnavailable(
                "settings.json: bad json".into()
            ))
            .is_transient()
        );
    }

    #[test]
    fn test_location_is_captured() {
        let err = AdmissionError::new(AdmissionErrorKind::Cancelled);
        assert!(err.file.ends_with("admission.rs"));
        assert!(err.line > 0);
    }
}
