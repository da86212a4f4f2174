//! Clause - admission control for the contract analysis service.
//!
//! Clause keeps a capacity-constrained backend (LLM calls, transcription,
//! document analysis) from being overrun. Each request passes a per-client
//! rate limit, then an admission decision: proceed now, wait in a bounded
//! FIFO queue, or be rejected as overloaded. Limits live in a JSON settings
//! document that administrators can edit while the service runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use clause::{AdmissionGate, CancellationToken, ServiceConfig, SettingsStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::load()?;
//! let store = Arc::new(SettingsStore::new(&config.settings.path));
//! let gate = AdmissionGate::new(store, &config.admission);
//!
//! let summary = gate
//!     .run("203.0.113.7", &CancellationToken::new(), || async {
//!         // call the model here
//!         Ok::<_, clause::ClauseError>("summary")
//!     })
//!     .await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `clause_error` - error types
//! - `clause_settings` - settings document, limits providers, service config
//! - `clause_admission` - rate limiter, admission controller, gate, metrics
//!
//! This crate re-exports everything for convenience and adds log setup and
//! a load simulator used by the `clause` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod observability;
mod simulate;

pub use clause_admission::*;
pub use clause_error::*;
pub use clause_settings::*;

pub use observability::init_logging;
pub use simulate::{SimulationPlan, SimulationReport, simulate};
