//! Status command handler.

use super::commands::OutputFormat;
use super::settings::to_pretty_json;
use clause::{AdmissionGate, AdmissionLimits, AdmissionStatus, ClauseResult, LimitsProvider};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    status: AdmissionStatus,
    #[serde(flatten)]
    limits: AdmissionLimits,
    rate_limit_per_minute: u32,
}

/// Print admission counts alongside the limits in force.
pub fn show_status(
    gate: &AdmissionGate,
    limits: &dyn LimitsProvider,
    format: OutputFormat,
) -> ClauseResult<()> {
    let report = StatusReport {
        status: gate.status(),
        limits: limits.current_limits()?,
        rate_limit_per_minute: limits.current_rate_limit()?,
    };

    match format {
        OutputFormat::Json => println!("{}", to_pretty_json(&report)?),
        OutputFormat::Human => {
            println!(
                "Active:   {} / {}",
                report.status.active, report.limits.max_concurrent
            );
            println!(
                "Queued:   {} / {}",
                report.status.queued, report.limits.max_queue
            );
            println!(
                "Rate:     {} requests per client per minute",
                report.rate_limit_per_minute
            );
        }
    }

    Ok(())
}
