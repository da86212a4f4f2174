//! Error types for the Clause admission-control layer.
//!
//! This crate provides the error types shared by every Clause crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use clause_error::{AdmissionError, AdmissionErrorKind, ClauseResult};
//!
//! fn admit() -> ClauseResult<()> {
//!     Err(AdmissionError::new(AdmissionErrorKind::Overloaded))?
//! }
//!
//! match admit() {
//!     Ok(()) => println!("admitted"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admission;
mod config;
mod error;
mod settings;

pub use admission::{AdmissionError, AdmissionErrorKind, AdmissionResult};
pub use config::ConfigError;
pub use error::{ClauseError, ClauseErrorKind, ClauseResult};
pub use settings::{SettingsError, SettingsErrorKind, SettingsResult};
