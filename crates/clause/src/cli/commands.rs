//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Clause - admission control for the contract analysis service
#[derive(Parser, Debug)]
#[command(name = "clause")]
#[command(about = "Inspect and tune admission limits for the contract analysis service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Service configuration file (TOML), layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read or change the admin-editable settings document
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Show admission counts and the limits currently in force
    Status {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Drive a burst of simulated callers through the admission gate
    Simulate {
        /// Number of callers started at once
        #[arg(long, default_value = "20")]
        callers: usize,

        /// Number of distinct client keys the callers are spread over
        #[arg(long, default_value = "4")]
        clients: usize,

        /// Milliseconds each admitted caller holds its slot
        #[arg(long, default_value = "500")]
        work_ms: u64,

        /// Cancel callers still queued after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings document
    Show {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Change one or more settings
    Set {
        /// Maximum requests processed at once
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Maximum requests waiting for a slot
        #[arg(long)]
        max_queue: Option<usize>,

        /// Requests allowed per client per minute
        #[arg(long)]
        rate_limit: Option<u32>,

        /// Maximum document upload size in megabytes
        #[arg(long)]
        max_file_size_mb: Option<u64>,

        /// Maximum audio upload size in megabytes
        #[arg(long)]
        max_audio_file_size_mb: Option<u64>,
    },

    /// Restore every setting to its default
    Reset,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
