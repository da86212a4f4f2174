//! Settings command handlers.

use super::commands::{OutputFormat, SettingsCommands};
use clause::{ClauseResult, SettingsError, SettingsErrorKind, SettingsStore, SettingsUpdate};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Handle settings subcommands.
pub fn handle_settings_command(store: &SettingsStore, cmd: SettingsCommands) -> ClauseResult<()> {
    match cmd {
        SettingsCommands::Show { format } => show_settings(store, format),

        SettingsCommands::Set {
            max_concurrent,
            max_queue,
            rate_limit,
            max_file_size_mb,
            max_audio_file_size_mb,
        } => {
            let update = SettingsUpdate {
                max_concurrent_requests: max_concurrent,
                max_queue_size: max_queue,
                rate_limit_per_minute: rate_limit,
                max_file_size_mb,
                max_audio_file_size_mb,
            };
            set_settings(store, &update)
        }

        SettingsCommands::Reset => {
            store.reset()?;
            info!(path = %store.path().display(), "Settings reset to defaults");
            println!("Settings reset to defaults in {}", store.path().display());
            show_settings(store, OutputFormat::Human)
        }
    }
}

fn show_settings(store: &SettingsStore, format: OutputFormat) -> ClauseResult<()> {
    let document = store.document()?;
    match format {
        OutputFormat::Json => println!("{}", to_pretty_json(&document)?),
        OutputFormat::Human => print_document(store, &document),
    }
    Ok(())
}

fn set_settings(store: &SettingsStore, update: &SettingsUpdate) -> ClauseResult<()> {
    if update.is_empty() {
        warn!("No settings given, nothing to change");
        eprintln!("Nothing to change. Pass at least one setting, e.g. --max-concurrent 3");
        return Ok(());
    }

    let settings = store.update(update)?;
    info!(
        max_concurrent = settings.max_concurrent_requests,
        max_queue = settings.max_queue_size,
        rate_limit = settings.rate_limit_per_minute,
        "Settings updated"
    );
    println!("Settings updated.");
    show_settings(store, OutputFormat::Human)
}

fn print_document(store: &SettingsStore, document: &Map<String, Value>) {
    println!("Settings from {}:", store.path().display());
    println!("{:-<60}", "");
    for (key, value) in document {
        println!("  {:<28} {}", key, value);
    }
}

pub(super) fn to_pretty_json<T: serde::Serialize>(value: &T) -> ClauseResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| SettingsError::new(SettingsErrorKind::Serialize(e.to_string())).into())
}
