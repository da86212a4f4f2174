//! Clause CLI binary.
//!
//! This binary provides command-line access to the admission layer:
//! - Show, change and reset the admin-editable limits
//! - Print the limits in force
//! - Simulate a burst of callers against the current limits

use clap::Parser;
use clause::{AdmissionGate, ServiceConfig, SettingsStore, SimulationPlan, init_logging};
use std::sync::Arc;
use std::time::Duration;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, handle_settings_command, run_simulation, show_status};

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = ServiceConfig::load_with(cli.config.as_deref())?;
    init_logging(&config.logging, cli.verbose)?;

    let store = Arc::new(SettingsStore::new(&config.settings.path));
    tracing::debug!(path = %store.path().display(), "Using settings document");

    // Execute the requested command
    match cli.command {
        Commands::Settings(settings_cmd) => {
            handle_settings_command(&store, settings_cmd)?;
        }

        Commands::Status { format } => {
            let gate = AdmissionGate::new(store.clone(), &config.admission);
            show_status(&gate, &*store, format)?;
        }

        Commands::Simulate {
            callers,
            clients,
            work_ms,
            cancel_after_ms,
            format,
        } => {
            let gate = AdmissionGate::new(store, &config.admission);
            let plan = SimulationPlan {
                callers,
                clients,
                work: Duration::from_millis(work_ms),
                cancel_after: cancel_after_ms.map(Duration::from_millis),
            };
            run_simulation(&gate, plan, format).await?;
        }
    }

    Ok(())
}
