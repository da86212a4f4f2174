//! Admission control for capacity-constrained work.
//!
//! Three pieces sit in front of expensive calls such as LLM requests:
//!
//! - [`ClientRateLimiter`] caps how often one client may try per minute.
//! - [`AdmissionController`] caps how many callers run at once and how many
//!   may wait, handing freed slots to waiters in arrival order.
//! - [`AdmissionGate`] chains the two and releases the slot when the work
//!   is done, whatever the outcome.
//!
//! Limits come from a [`LimitsProvider`](clause_settings::LimitsProvider)
//! and are re-read on every decision, so edits to the settings document
//! take effect without a restart.
//!
//! # Example
//!
//! ```
//! use clause_admission::{AdmissionGate, CancellationToken};
//! use clause_settings::{AdmissionConfig, SharedSettings};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SharedSettings::with_limits(2, 1, 10)?;
//! let gate = AdmissionGate::new(Arc::new(settings), &AdmissionConfig::default());
//!
//! let answer = gate
//!     .run("10.0.0.1", &CancellationToken::new(), || async {
//!         Ok::<_, clause_error::AdmissionError>(42)
//!     })
//!     .await?;
//! assert_eq!(answer, 42);
//! assert_eq!(gate.status().active, 0);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod controller;
mod decision;
mod gate;
mod metrics;
mod rate_limit;

pub use controller::{AdmissionController, QueueTicket, SlotGuard};
pub use decision::{AdmissionDecision, AdmissionStatus, RejectReason};
pub use gate::AdmissionGate;
pub use metrics::{AdmissionMetrics, MetricsSnapshot};
pub use rate_limit::{ClientRateLimiter, RateDecision};
pub use tokio_util::sync::CancellationToken;
