//! Simulate command handler.

use super::commands::OutputFormat;
use super::settings::to_pretty_json;
use clause::{AdmissionGate, ClauseResult, SimulationPlan, simulate};

/// Run a simulated burst and print the tally.
pub async fn run_simulation(
    gate: &AdmissionGate,
    plan: SimulationPlan,
    format: OutputFormat,
) -> ClauseResult<()> {
    let report = simulate(gate, &plan).await;

    match format {
        OutputFormat::Json => println!("{}", to_pretty_json(&report)?),
        OutputFormat::Human => {
            println!(
                "Simulated {} callers over {} clients ({} ms of work each)",
                plan.callers,
                plan.clients.max(1),
                plan.work.as_millis()
            );
            println!("{:-<60}", "");
            println!("  completed            {}", report.completed);
            println!("  overloaded           {}", report.overloaded);
            println!("  rate limited         {}", report.rate_limited);
            println!("  cancelled in queue   {}", report.cancelled);
            println!("  limits unavailable   {}", report.config_unavailable);
            println!("{:-<60}", "");
            println!("  admitted directly    {}", report.metrics.proceeded);
            println!("  admitted from queue  {}", report.metrics.promoted);
            println!(
                "  mean queue wait      {} ms",
                report.metrics.mean_queue_wait().as_millis()
            );
            println!("  final state          {}", report.status);
        }
    }

    Ok(())
}
