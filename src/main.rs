//! Main application entry point and high-level flow coordination.
//!
//! This module dispatches the action chosen on the command line:
//!
//! - `args`: Command-line argument parsing and help/version display
//! - `commands`: The `simulate`, `params` and `help` commands
//! - `logger`: Centralized logging, optionally mirrored to a file with `--log`

use anyhow::Result;

use wmfx::args::{self, CliAction, ParsedArgs};
use wmfx::commands;
use wmfx::common::constants::EXIT_FAILURE;
use wmfx::logger::{Log, LoggerGuard};
use wmfx::{log_error_standalone, log_pipe};

fn main() -> Result<()> {
    // Parse command-line arguments
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Help { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Params {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug(debug_enabled);
            commands::params::handle_params_command(config_path.as_deref(), debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            config_path,
            log_file,
            options,
        } => {
            Log::set_debug(debug_enabled);
            // Keep the guard alive until the simulation has been written out
            let _log_guard = start_file_logging(log_file)?;

            let result = commands::simulate::handle_simulate_command(
                options,
                config_path.as_deref(),
                debug_enabled,
            );
            if let Err(e) = &result {
                log_pipe!();
                log_error_standalone!("{e:#}");
            }
            result
        }
    }
}

fn start_file_logging(log_file: Option<String>) -> Result<Option<LoggerGuard>> {
    log_file.map(Log::start_file_logging).transpose()
}
