//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the clause binary.

mod commands;
mod settings;
mod simulate;
mod status;

pub use commands::{Cli, Commands};
pub use settings::handle_settings_command;
pub use simulate::run_simulation;
pub use status::show_status;
