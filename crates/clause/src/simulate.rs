//! Synthetic load driven through an [`AdmissionGate`].
//!
//! Used by `clause simulate` to check a limits document against a burst of
//! callers before rolling it out.

use clause_admission::{AdmissionGate, AdmissionStatus, CancellationToken, MetricsSnapshot};
use clause_error::{AdmissionError, AdmissionErrorKind, AdmissionResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Shape of a simulated burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationPlan {
    /// Callers started at once
    pub callers: usize,
    /// Distinct client keys the callers are spread over
    pub clients: usize,
    /// How long each admitted caller holds its slot
    pub work: Duration,
    /// Cancel callers still queued after this delay
    pub cancel_after: Option<Duration>,
}

impl SimulationPlan {
    /// Client key used by caller `index`.
    pub fn client_for(&self, index: usize) -> String {
        format!("10.0.0.{}", index % self.clients.max(1))
    }
}

/// Outcome tally of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Callers whose work ran to completion
    pub completed: usize,
    /// Callers turned away because slots and queue were full
    pub overloaded: usize,
    /// Callers turned away by their rate limit
    pub rate_limited: usize,
    /// Queued callers cancelled before a slot freed up
    pub cancelled: usize,
    /// Callers refused because limits could not be read
    pub config_unavailable: usize,
    /// Gate counts after every caller finished
    pub status: AdmissionStatus,
    /// Gate metrics after every caller finished
    pub metrics: MetricsSnapshot,
}

impl SimulationReport {
    fn tally(&mut self, outcome: &AdmissionResult<()>) {
        match outcome.as_ref().map_err(AdmissionError::kind) {
            Ok(()) => self.completed += 1,
            Err(AdmissionErrorKind::Overloaded) => self.overloaded += 1,
            Err(AdmissionErrorKind::RateLimited { .. }) => self.rate_limited += 1,
            Err(AdmissionErrorKind::Cancelled) => self.cancelled += 1,
            Err(AdmissionErrorKind::ConfigurationUnavailable(_)) => self.config_unavailable += 1,
        }
    }

    /// Callers accounted for.
    pub fn total(&self) -> usize {
        self.completed
            + self.overloaded
            + self.rate_limited
            + self.cancelled
            + self.config_unavailable
    }
}

/// Run `plan` against `gate` and wait for every caller to finish.
///
/// All callers start together. Admitted callers sleep for `plan.work`
/// while holding their slot; cancellation only affects callers that are
/// still queued.
#[instrument(skip(gate), fields(callers = plan.callers, clients = plan.clients))]
pub async fn simulate(gate: &AdmissionGate, plan: &SimulationPlan) -> SimulationReport {
    let cancel = CancellationToken::new();
    let mut callers = JoinSet::new();

    for index in 0..plan.callers {
        let gate = gate.clone();
        let cancel = cancel.clone();
        let client = plan.client_for(index);
        let work = plan.work;
        callers.spawn(async move {
            gate.run(&client, &cancel, || async move {
                tokio::time::sleep(work).await;
                Ok::<_, AdmissionError>(())
            })
            .await
        });
    }

    let canceller = plan.cancel_after.map(|delay| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            cancel.cancel();
        })
    });

    let mut report = SimulationReport::default();
    while let Some(joined) = callers.join_next().await {
        match joined {
            Ok(outcome) => report.tally(&outcome),
            Err(e) => warn!(error = %e, "Simulated caller did not finish"),
        }
    }
    if let Some(canceller) = canceller {
        canceller.abort();
    }

    report.status = gate.status();
    report.metrics = gate.metrics().snapshot();
    info!(
        completed = report.completed,
        overloaded = report.overloaded,
        rate_limited = report.rate_limited,
        cancelled = report.cancelled,
        "Simulation finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callers_spread_over_clients() {
        let plan = SimulationPlan {
            callers: 5,
            clients: 2,
            work: Duration::ZERO,
            cancel_after: None,
        };
        assert_eq!(plan.client_for(0), "10.0.0.0");
        assert_eq!(plan.client_for(3), "10.0.0.1");
    }

    #[test]
    fn test_zero_clients_means_one() {
        let plan = SimulationPlan {
            callers: 1,
            clients: 0,
            work: Duration::ZERO,
            cancel_after: None,
        };
        assert_eq!(plan.client_for(7), "10.0.0.0");
    }
}
