//! Admission outcomes and status snapshots.

use crate::{QueueTicket, SlotGuard};
use clause_error::{AdmissionError, AdmissionErrorKind};
use clause_settings::AdmissionLimits;
use serde::{Deserialize, Serialize};

/// Result of [`AdmissionController::acquire`](crate::AdmissionController::acquire).
#[derive(Debug)]
pub enum AdmissionDecision {
    /// A slot was free; the guard holds it.
    Proceed(SlotGuard),
    /// No slot was free but the queue had room; wait on the ticket.
    Queued(QueueTicket),
    /// Slots and queue were both full.
    Rejected(RejectReason),
}

impl AdmissionDecision {
    /// Short outcome name for logs and tallies.
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionDecision::Proceed(_) => "proceed",
            AdmissionDecision::Queued(_) => "queued",
            AdmissionDecision::Rejected(_) => "rejected",
        }
    }
}

/// Why a request was rejected: the state the controller saw when it decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(
    "System overloaded: {}/{} slots busy, {}/{} queued",
    active,
    limits.max_concurrent,
    queued,
    limits.max_queue
)]
pub struct RejectReason {
    /// Active callers at decision time
    pub active: usize,
    /// Queued callers at decision time
    pub queued: usize,
    /// Limits the decision was made against
    pub limits: AdmissionLimits,
}

impl RejectReason {
    /// The caller-facing error for this rejection.
    #[track_caller]
    pub fn into_error(self) -> AdmissionError {
        AdmissionError::new(AdmissionErrorKind::Overloaded)
    }
}

/// Active and queued caller counts at one point in time.
///
/// For observability only; decisions always re-read the live state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("{} active, {} queued", active, queued)]
pub struct AdmissionStatus {
    /// Callers holding a slot
    pub active: usize,
    /// Callers waiting for a slot
    pub queued: usize,
}
