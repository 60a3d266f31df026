//! Implementation of the `params` command.
//!
//! Lists every transition parameter the effects read, with the value that
//! would be used right now and where it comes from.

use anyhow::Result;

use crate::config::{KNOWN_PARAMETERS, ParamDefault, TransitionSettings};

/// Where an effective parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Set in the parameter file
    File(f64),
    /// Compiled-in default
    Default(f64),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::File(value) => write!(f, "{value}"),
            ParamValue::Default(value) => write!(f, "{value} (default)"),
        }
    }
}

/// Effective value of every known parameter, in declaration order.
pub fn effective_parameters(
    settings: &mut TransitionSettings,
) -> Vec<(&'static str, &'static str, ParamValue)> {
    let table = settings.table();

    KNOWN_PARAMETERS
        .iter()
        .map(|&(transition, key, default)| {
            let from_file = table.and_then(|table| match default {
                ParamDefault::Int(_) => table.int(transition, key).ok().map(|v| v as f64),
                ParamDefault::Double(_) => table.double(transition, key).ok(),
            });
            let value = match (from_file, default) {
                (Some(value), _) => ParamValue::File(value),
                (None, ParamDefault::Int(value)) => ParamValue::Default(value as f64),
                (None, ParamDefault::Double(value)) => ParamValue::Default(value),
            };
            (transition, key, value)
        })
        .collect()
}

/// Print the effective parameter table.
pub fn handle_params_command(config_path: Option<&str>, debug_enabled: bool) -> Result<()> {
    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled");
    }

    log_block_start!("Loading transition parameters");
    let mut settings = super::open_settings(config_path);
    let parameters = effective_parameters(&mut settings);
    if !settings.is_loaded() {
        log_indented!("No parameter file loaded, showing compiled-in defaults");
    }

    let mut current = "";
    for (transition, key, value) in parameters {
        if transition != current {
            log_block_start!("[{transition}]");
            current = transition;
        }
        log_indented!("{key:<20} {value}");
    }

    log_end!();
    Ok(())
}

/// Display detailed help for the params command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("params - Show the effective transition parameters");
    log_block_start!("Usage: wmfx [--config <file>] params");
    log_block_start!("Description:");
    log_indented!("Reads the transition parameter file and prints, for every");
    log_indented!("parameter the effects use, the value taken from the file or");
    log_indented!("the compiled-in default when the file does not set it.");
    log_block_start!("Examples:");
    log_indented!("# Parameters from the standard location");
    log_indented!("wmfx params");
    log_pipe!();
    log_indented!("# Parameters from a custom file");
    log_indented!("wmfx --config ./transitions.toml params");
    log_end!();
}
