//! Per-client sliding-window rate limiting.

use clause_error::{AdmissionError, AdmissionErrorKind, AdmissionResult};
use clause_settings::{AdmissionConfig, LimitsProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The attempt fits in the client's window.
    Allowed {
        /// Attempts left in the current window after this one
        remaining: u32,
    },
    /// The client is over its limit.
    Denied {
        /// Limit in force when the check ran
        limit: u32,
        /// Whole seconds until an attempt leaves the window, at least 1
        retry_after_secs: u64,
    },
}

impl RateDecision {
    /// Whether the attempt may go ahead.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    /// Convert a denial into the caller-facing error.
    #[track_caller]
    pub fn into_result(self) -> AdmissionResult<u32> {
        match self {
            RateDecision::Allowed { remaining } => Ok(remaining),
            RateDecision::Denied {
                limit,
                retry_after_secs,
            } => Err(AdmissionError::new(AdmissionErrorKind::RateLimited {
                limit,
                retry_after_secs,
            })),
        }
    }
}

/// Recent attempts of one client, oldest first.
#[derive(Debug, Default)]
struct AttemptLog {
    attempts: VecDeque<Instant>,
}

impl AttemptLog {
    fn expire(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.attempts.front() {
            if now.duration_since(oldest) < window {
                break;
            }
            self.attempts.pop_front();
        }
    }

    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.attempts
            .back()
            .is_none_or(|&newest| now.duration_since(newest) >= window)
    }
}

/// Rate limiter keyed by client identity.
///
/// Each client gets `rate_limit_per_minute` attempts per rolling window.
/// Every attempt counts, including denied ones, so a client that keeps
/// hammering stays locked out until it backs off. The limit is re-read
/// from the provider on each check.
///
/// # Examples
///
/// ```
/// use clause_admission::ClientRateLimiter;
/// use clause_settings::SharedSettings;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let settings = SharedSettings::with_limits(5, 5, 2).unwrap();
/// let limiter = ClientRateLimiter::with_window(Arc::new(settings), Duration::from_secs(60));
///
/// assert!(limiter.check("10.0.0.1").unwrap().is_allowed());
/// assert!(limiter.check("10.0.0.1").unwrap().is_allowed());
/// assert!(!limiter.check("10.0.0.1").unwrap().is_allowed());
/// assert!(limiter.check("10.0.0.2").unwrap().is_allowed());
/// ```
pub struct ClientRateLimiter {
    limits: Arc<dyn LimitsProvider>,
    window: Duration,
    max_tracked_clients: usize,
    clients: Mutex<HashMap<String, AttemptLog>>,
}

impl ClientRateLimiter {
    /// Create a limiter using the window and client cap from `config`.
    pub fn new(limits: Arc<dyn LimitsProvider>, config: &AdmissionConfig) -> Self {
        Self {
            limits,
            window: config.rate_window(),
            max_tracked_clients: (*config.max_tracked_clients()).max(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Create a limiter with an explicit window and the default client cap.
    pub fn with_window(limits: Arc<dyn LimitsProvider>, window: Duration) -> Self {
        let mut limiter = Self::new(limits, &AdmissionConfig::default());
        limiter.window = window.max(Duration::from_millis(1));
        limiter
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AttemptLog>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an attempt by `client` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionErrorKind::ConfigurationUnavailable`] when the
    /// limit cannot be read; the attempt is not recorded.
    #[instrument(skip(self))]
    pub fn check(&self, client: &str) -> AdmissionResult<RateDecision> {
        let limit = self.limits.current_rate_limit().map_err(|e| {
            warn!(error = %e, "Rate limit unavailable, refusing request");
            AdmissionError::new(AdmissionErrorKind::ConfigurationUnavailable(
                e.to_string(),
            ))
        })?;
        let allowed = limit.max(1) as usize;
        let now = Instant::now();

        let mut clients = self.lock();
        if clients.len() >= self.max_tracked_clients && !clients.contains_key(client) {
            let purged = purge(&mut clients, now, self.window);
            debug!(purged, tracked = clients.len(), "Purged idle clients");
        }

        let log = clients.entry(client.to_owned()).or_default();
        log.expire(now, self.window);

        let decision = if log.attempts.len() < allowed {
            RateDecision::Allowed {
                remaining: (allowed - log.attempts.len() - 1) as u32,
            }
        } else {
            // The count drops below the limit once this attempt expires.
            let blocking = log.attempts[log.attempts.len() - allowed];
            let wait = (blocking + self.window).saturating_duration_since(now);
            RateDecision::Denied {
                limit,
                retry_after_secs: ceil_secs(wait).max(1),
            }
        };

        log.attempts.push_back(now);
        while log.attempts.len() > allowed {
            log.attempts.pop_front();
        }
        drop(clients);

        if let RateDecision::Denied {
            retry_after_secs, ..
        } = decision
        {
            debug!(limit, retry_after_secs, "Client over rate limit");
        }
        Ok(decision)
    }

    /// Forget clients with no attempt inside the window. Returns how many
    /// were removed.
    pub fn purge_idle(&self) -> usize {
        purge(&mut self.lock(), Instant::now(), self.window)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("window", &self.window)
            .field("max_tracked_clients", &self.max_tracked_clients)
            .field("tracked_clients", &self.tracked_clients())
            .finish_non_exhaustive()
    }
}

fn purge(clients: &mut HashMap<String, AttemptLog>, now: Instant, window: Duration) -> usize {
    let before = clients.len();
    clients.retain(|_, log| !log.is_idle(now, window));
    before - clients.len()
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
