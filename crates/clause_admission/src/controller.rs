//! Bounded concurrency with a bounded FIFO waiting area.
//!
//! The controller tracks how many callers hold a slot and how many are
//! waiting for one. Both counts live behind one mutex, so every decision
//! sees a consistent pair and `active + queued` never exceeds the limits
//! that were in force when each caller was admitted.
//!
//! Waiters are woken by the controller itself: whenever a slot frees up
//! the oldest waiter is moved from the queue to the active set under the
//! lock and then signalled. Each ticket also re-checks on a slow interval
//! so a limit raised at runtime reaches callers that are already waiting.

use crate::{AdmissionDecision, AdmissionMetrics, AdmissionStatus, RejectReason};
use clause_error::{AdmissionError, AdmissionErrorKind, AdmissionResult};
use clause_settings::{AdmissionConfig, AdmissionLimits, LimitsProvider};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

struct Waiter {
    ticket: u64,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct AdmissionState {
    active: usize,
    queued: usize,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
}

impl AdmissionState {
    /// Move waiters into free slots, oldest first.
    fn promote(&mut self, max_concurrent: usize) -> usize {
        let mut promoted = 0;
        while self.active < max_concurrent {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.queued = self.queued.saturating_sub(1);
            self.active += 1;
            promoted += 1;
            // If the receiver is gone its ticket is being dropped and will
            // hand the slot back once it sees it has left the queue.
            let _ = waiter.wake.send(());
        }
        promoted
    }

    fn status(&self) -> AdmissionStatus {
        AdmissionStatus {
            active: self.active,
            queued: self.queued,
        }
    }
}

struct Inner {
    state: Mutex<AdmissionState>,
    limits: Arc<dyn LimitsProvider>,
    recheck_interval: Duration,
    metrics: AdmissionMetrics,
}

/// Process-wide admission controller.
///
/// Cheap to clone; clones share the same counts. Create one per protected
/// resource and hand clones to every request handler.
///
/// # Examples
///
/// ```
/// use clause_admission::{AdmissionController, AdmissionDecision};
/// use clause_settings::SharedSettings;
/// use std::sync::Arc;
///
/// let settings = SharedSettings::with_limits(1, 0, 10).unwrap();
/// let controller = AdmissionController::new(Arc::new(settings));
///
/// let AdmissionDecision::Proceed(guard) = controller.acquire().unwrap() else {
///     panic!("first caller should proceed");
/// };
/// assert!(matches!(
///     controller.acquire().unwrap(),
///     AdmissionDecision::Rejected(_)
/// ));
///
/// drop(guard);
/// assert_eq!(controller.status().active, 0);
/// ```
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    /// Create a controller with default tuning and fresh metrics.
    pub fn new(limits: Arc<dyn LimitsProvider>) -> Self {
        Self::with_config(limits, &AdmissionConfig::default(), AdmissionMetrics::new())
    }

    /// Create a controller with explicit tuning, recording into `metrics`.
    pub fn with_config(
        limits: Arc<dyn LimitsProvider>,
        config: &AdmissionConfig,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(AdmissionState::default()),
                limits,
                recheck_interval: config.recheck_interval(),
                metrics,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        // Counts are updated in single steps, so a panic elsewhere cannot
        // leave them half-written.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_limits(&self) -> AdmissionResult<AdmissionLimits> {
        self.inner.limits.current_limits().map_err(|e| {
            self.inner.metrics.record_config_unavailable();
            warn!(error = %e, "Admission limits unavailable, refusing request");
            AdmissionError::new(AdmissionErrorKind::ConfigurationUnavailable(
                e.to_string(),
            ))
        })
    }

    /// Decide whether a new caller may start now, wait, or must go away.
    ///
    /// Limits are re-read on every call. Callers already waiting are
    /// promoted before the new caller is considered, so a newcomer never
    /// overtakes the queue.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionErrorKind::ConfigurationUnavailable`] when the
    /// limits provider fails; no count is changed in that case.
    #[instrument(skip(self))]
    pub fn acquire(&self) -> AdmissionResult<AdmissionDecision> {
        let limits = self.read_limits()?;

        let mut state = self.lock();
        state.promote(limits.max_concurrent);

        if state.active < limits.max_concurrent {
            state.active += 1;
            let status = state.status();
            drop(state);

            self.inner.metrics.record_proceed();
            debug!(active = status.active, queued = status.queued, "Slot acquired");
            return Ok(AdmissionDecision::Proceed(SlotGuard::new(self.clone())));
        }

        if state.queued < limits.max_queue {
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            let (wake, woken) = oneshot::channel();
            state.waiters.push_back(Waiter { ticket, wake });
            state.queued += 1;
            let position = state.queued;
            drop(state);

            self.inner.metrics.record_queued();
            info!(position, "Request queued");
            return Ok(AdmissionDecision::Queued(QueueTicket::new(
                self.clone(),
                ticket,
                position,
                woken,
            )));
        }

        let reason = RejectReason {
            active: state.active,
            queued: state.queued,
            limits,
        };
        drop(state);

        self.inner.metrics.record_rejected();
        warn!(%reason, "Request rejected");
        Ok(AdmissionDecision::Rejected(reason))
    }

    /// Wait until `ticket` is granted a slot or `cancel` fires.
    ///
    /// Equivalent to [`QueueTicket::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionErrorKind::Cancelled`] if `cancel` fires first;
    /// the ticket's place in the queue is given up.
    pub async fn wait_for_slot(
        &self,
        ticket: QueueTicket,
        cancel: &CancellationToken,
    ) -> AdmissionResult<SlotGuard> {
        ticket.wait(cancel).await
    }

    /// Give back the slot held by `guard` and hand it to the oldest waiter.
    ///
    /// Same as [`SlotGuard::release`] or dropping the guard. The guard is
    /// consumed, so each slot is released exactly once. A guard issued by
    /// another controller is returned to the controller that issued it.
    pub fn release(&self, guard: SlotGuard) {
        if let Some(owner) = &guard.controller {
            if !Arc::ptr_eq(&owner.inner, &self.inner) {
                warn!("Slot guard released through a different controller");
            }
        }
        guard.release();
    }

    /// Decrement `active` and promote waiters. A release with no active
    /// slot is ignored.
    fn release_slot(&self) {
        let limits = self.inner.limits.current_limits();

        let mut state = self.lock();
        if state.active == 0 {
            drop(state);
            warn!("Release without an active slot ignored");
            return;
        }
        state.active -= 1;

        match limits {
            Ok(limits) => {
                let promoted = state.promote(limits.max_concurrent);
                let status = state.status();
                drop(state);
                debug!(
                    active = status.active,
                    queued = status.queued,
                    promoted,
                    "Slot released"
                );
            }
            Err(e) => {
                drop(state);
                warn!(error = %e, "Slot released but limits unavailable, waiters not promoted");
            }
        }
    }

    /// Current active and queued counts.
    pub fn status(&self) -> AdmissionStatus {
        self.lock().status()
    }

    /// Metrics this controller records into.
    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.inner.metrics
    }

    /// Periodic re-check from a waiting ticket.
    fn recheck(&self) {
        // An unreadable document keeps everyone where they are.
        let Ok(limits) = self.inner.limits.current_limits() else {
            return;
        };
        let promoted = self.lock().promote(limits.max_concurrent);
        if promoted > 0 {
            debug!(promoted, "Waiters promoted on re-check");
        }
    }

    /// Drop a waiter that stopped waiting.
    fn abandon(&self, ticket: u64) {
        let mut state = self.lock();
        let index = state.waiters.iter().position(|w| w.ticket == ticket);

        match index {
            Some(index) => {
                state.waiters.remove(index);
                state.queued = state.queued.saturating_sub(1);
                let queued = state.queued;
                drop(state);
                self.inner.metrics.record_cancelled();
                info!(queued, "Queued request abandoned");
            }
            None => {
                // Promoted between the cancel and this drop. The slot was
                // granted, so this is not a queue abandonment.
                drop(state);
                debug!("Abandoned request already held a slot, returning it");
                self.release_slot();
            }
        }
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("status", &self.status())
            .field("recheck_interval", &self.inner.recheck_interval)
            .finish_non_exhaustive()
    }
}

/// A held slot. The slot is released when the guard is dropped.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct SlotGuard {
    controller: Option<AdmissionController>,
}

impl SlotGuard {
    fn new(controller: AdmissionController) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    /// Release the slot now.
    pub fn release(mut self) {
        if let Some(controller) = self.controller.take() {
            controller.release_slot();
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.release_slot();
        }
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("held", &self.controller.is_some())
            .finish()
    }
}

/// A place in the waiting queue.
///
/// Dropping the ticket before it is granted gives up the place.
#[must_use = "dropping a ticket gives up its place in the queue"]
pub struct QueueTicket {
    controller: AdmissionController,
    id: u64,
    position: usize,
    queued_at: Instant,
    woken: oneshot::Receiver<()>,
    settled: bool,
}

impl QueueTicket {
    fn new(
        controller: AdmissionController,
        id: u64,
        position: usize,
        woken: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            controller,
            id,
            position,
            queued_at: Instant::now(),
            woken,
            settled: false,
        }
    }

    /// 1-based queue position at the time the ticket was issued.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Wait for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionErrorKind::Cancelled`] if `cancel` fires before
    /// a slot is granted.
    #[instrument(skip_all, fields(ticket = self.id, position = self.position))]
    pub async fn wait(mut self, cancel: &CancellationToken) -> AdmissionResult<SlotGuard> {
        let period = self.controller.inner.recheck_interval;
        let mut recheck = tokio::time::interval_at(Instant::now() + period, period);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                // Only promotion takes a waiter off the queue, and it
                // reserves the slot before signalling.
                _ = &mut self.woken => {
                    self.settled = true;
                    let waited = self.queued_at.elapsed();
                    self.controller.inner.metrics.record_promoted(waited);
                    debug!(waited_ms = waited.as_millis() as u64, "Queued request promoted");
                    return Ok(SlotGuard::new(self.controller.clone()));
                }
                _ = cancel.cancelled() => {
                    return Err(AdmissionError::new(AdmissionErrorKind::Cancelled));
                }
                _ = recheck.tick() => self.controller.recheck(),
            }
        }
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.controller.abandon(self.id);
        }
    }
}

impl std::fmt::Debug for QueueTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTicket")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("settled", &self.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clause_settings::SharedSettings;

    fn controller(max_concurrent: usize, max_queue: usize) -> AdmissionController {
        let settings = SharedSettings::with_limits(max_concurrent, max_queue, 10).unwrap();
        AdmissionController::new(Arc::new(settings))
    }

    #[test]
    fn test_promote_is_oldest_first() {
        let mut state = AdmissionState::default();
        let (first, mut first_rx) = oneshot::channel();
        let (second, mut second_rx) = oneshot::channel();
        state.waiters.push_back(Waiter { ticket: 0, wake: first });
        state.waiters.push_back(Waiter { ticket: 1, wake: second });
        state.queued = 2;

        assert_eq!(state.promote(1), 1);

        assert_eq!(state.status(), AdmissionStatus { active: 1, queued: 1 });
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_err());
    }

    #[test]
    fn test_release_without_slot_is_ignored() {
        let controller = controller(1, 1);
        controller.release_slot();
        assert_eq!(controller.status(), AdmissionStatus::default());
    }

    #[test]
    fn test_dropped_ticket_leaves_queue() {
        let controller = controller(1, 1);
        let AdmissionDecision::Proceed(_guard) = controller.acquire().unwrap() else {
            panic!("expected a slot");
        };
        let AdmissionDecision::Queued(ticket) = controller.acquire().unwrap() else {
            panic!("expected a queue place");
        };
        assert_eq!(ticket.position(), 1);
        assert_eq!(controller.status().queued, 1);

        drop(ticket);

        assert_eq!(controller.status(), AdmissionStatus { active: 1, queued: 0 });
        assert_eq!(controller.metrics().snapshot().cancelled, 1);
    }

    #[test]
    fn test_release_hands_slot_to_waiter() {
        let controller = controller(1, 1);
        let AdmissionDecision::Proceed(guard) = controller.acquire().unwrap() else {
            panic!("expected a slot");
        };
        let AdmissionDecision::Queued(_ticket) = controller.acquire().unwrap() else {
            panic!("expected a queue place");
        };

        guard.release();

        // The waiter owns the slot now, even before it polls.
        assert_eq!(controller.status(), AdmissionStatus { active: 1, queued: 0 });
    }

    #[test]
    fn test_promoted_ticket_dropped_returns_slot_without_counting_cancel() {
        let controller = controller(1, 1);
        let AdmissionDecision::Proceed(guard) = controller.acquire().unwrap() else {
            panic!("expected a slot");
        };
        let AdmissionDecision::Queued(ticket) = controller.acquire().unwrap() else {
            panic!("expected a queue place");
        };

        guard.release();
        drop(ticket);

        assert_eq!(controller.status(), AdmissionStatus::default());
        assert_eq!(controller.metrics().snapshot().cancelled, 0);
    }
}
