//! Rate limiting and admission in front of a unit of work.

use crate::{
    AdmissionController, AdmissionDecision, AdmissionMetrics, AdmissionStatus, ClientRateLimiter,
    RateDecision, SlotGuard,
};
use clause_error::{AdmissionError, AdmissionErrorKind, AdmissionResult};
use clause_settings::{AdmissionConfig, LimitsProvider};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// The request path in one place: per-client rate limit first, then
/// admission, then the work, then release.
///
/// Clones share the controller and the rate limiter.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    controller: AdmissionController,
    rate_limiter: Arc<ClientRateLimiter>,
}

impl AdmissionGate {
    /// Build a gate whose controller and limiter both read `limits`.
    pub fn new(limits: Arc<dyn LimitsProvider>, config: &AdmissionConfig) -> Self {
        let controller =
            AdmissionController::with_config(Arc::clone(&limits), config, AdmissionMetrics::new());
        let rate_limiter = ClientRateLimiter::new(limits, config);
        Self::from_parts(controller, rate_limiter)
    }

    /// Build a gate from existing parts.
    pub fn from_parts(controller: AdmissionController, rate_limiter: ClientRateLimiter) -> Self {
        Self {
            controller,
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Rate-limit `client`, then obtain a slot, waiting in the queue if
    /// needed.
    ///
    /// # Errors
    ///
    /// - `RateLimited` when `client` is over its limit. No slot or queue
    ///   place is taken.
    /// - `Overloaded` when slots and queue are both full.
    /// - `Cancelled` when `cancel` fires while queued.
    /// - `ConfigurationUnavailable` when limits cannot be read.
    #[instrument(skip(self, cancel))]
    pub async fn admit(
        &self,
        client: &str,
        cancel: &CancellationToken,
    ) -> AdmissionResult<SlotGuard> {
        let metrics = self.controller.metrics();

        match self.rate_limiter.check(client) {
            Ok(RateDecision::Allowed { .. }) => {}
            Ok(RateDecision::Denied {
                limit,
                retry_after_secs,
            }) => {
                metrics.record_rate_limited();
                info!(limit, retry_after_secs, "Request rate limited");
                return Err(AdmissionError::new(AdmissionErrorKind::RateLimited {
                    limit,
                    retry_after_secs,
                }));
            }
            Err(e) => {
                metrics.record_config_unavailable();
                return Err(e);
            }
        }

        match self.controller.acquire()? {
            AdmissionDecision::Proceed(guard) => Ok(guard),
            AdmissionDecision::Queued(ticket) => ticket.wait(cancel).await,
            AdmissionDecision::Rejected(reason) => Err(reason.into_error()),
        }
    }

    /// Run `work` inside an admitted slot.
    ///
    /// The slot is released when the work finishes, fails, panics, or the
    /// returned future is dropped.
    ///
    /// # Errors
    ///
    /// Admission errors are converted into `E`; otherwise the work's own
    /// result is returned.
    pub async fn run<F, Fut, T, E>(
        &self,
        client: &str,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AdmissionError>,
    {
        let guard = self.admit(client, cancel).await?;
        let outcome = work().await;
        guard.release();
        outcome
    }

    /// Current active and queued counts.
    pub fn status(&self) -> AdmissionStatus {
        self.controller.status()
    }

    /// Shared admission metrics.
    pub fn metrics(&self) -> &AdmissionMetrics {
        self.controller.metrics()
    }

    /// The underlying controller.
    pub fn controller(&self) -> &AdmissionController {
        &self.controller
    }

    /// The underlying rate limiter.
    pub fn rate_limiter(&self) -> &ClientRateLimiter {
        &self.rate_limiter
    }
}
