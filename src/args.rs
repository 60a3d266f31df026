//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. Global options may appear
//! anywhere on the command line; the first non-option argument selects the
//! command and the arguments after it belong to that command.

/// Options of the `simulate` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    /// Orientation to rotate to
    pub goto_portrait: bool,
    /// Request the opposite orientation while the first fade is running
    pub flip: bool,
    /// Emit a damage event this often while the screen is blanked
    pub damage_interval_ms: Option<u64>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            goto_portrait: true,
            flip: false,
            damage_interval_ms: None,
        }
    }
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run a headless rotation and log every phase
    Simulate {
        debug_enabled: bool,
        config_path: Option<String>,
        log_file: Option<String>,
        options: SimulateOptions,
    },
    /// Print the effective transition parameters
    Params {
        debug_enabled: bool,
        config_path: Option<String>,
    },
    /// Show help for a command (or general help)
    Help { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (typically from std::env::args())
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_path: Option<String> = None;
        let mut log_file: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" | "--log" => {
                    let Some(value) = args_vec.get(i + 1).filter(|v| !v.starts_with('-')) else {
                        log_warning!("Missing file for {arg}. Usage: {arg} <file>");
                        return ParsedArgs {
                            action: CliAction::ShowHelpDueToError,
                        };
                    };
                    if arg == "--log" {
                        log_file = Some(value.clone());
                    } else {
                        config_path = Some(value.clone());
                    }
                    i += 1;
                }
                // Command options are checked by the command parser
                "--flip" | "--damage" => positional.push(arg.clone()),
                _ if arg.starts_with('-') => {
                    log_warning!("Unknown option: {arg}");
                    return ParsedArgs {
                        action: CliAction::ShowHelpDueToError,
                    };
                }
                _ => positional.push(arg.clone()),
            }
            i += 1;
        }

        // Help and version take precedence over everything else
        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let Some((command, command_args)) = positional.split_first() else {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        };

        let action = match command.as_str() {
            "simulate" | "s" => match parse_simulate(command_args) {
                Some(options) => CliAction::Simulate {
                    debug_enabled,
                    config_path,
                    log_file,
                    options,
                },
                None => CliAction::ShowHelpDueToError,
            },
            "params" | "p" => {
                if let Some(extra) = command_args.first() {
                    log_warning!("Unexpected argument for params: {extra}");
                    CliAction::ShowHelpDueToError
                } else {
                    CliAction::Params {
                        debug_enabled,
                        config_path,
                    }
                }
            }
            "help" | "h" => CliAction::Help {
                command: command_args.first().cloned(),
            },
            _ => {
                log_warning!("Unknown command: {command}");
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    /// Parse the arguments of the current process.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!("{}", env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("wmfx [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <file>    Use a custom transition parameter file");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("    --log <file>       Also write output to a file");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("simulate, s [portrait|landscape] [--flip] [--damage <ms>]");
    log_indented!("                       Run a headless screen rotation");
    log_indented!("params, p              Show the effective transition parameters");
    log_indented!("help, h [COMMAND]      Show detailed help for a command");
    log_end!();
}

/// Parse `simulate [portrait|landscape] [--flip] [--damage <ms>]`.
fn parse_simulate(args: &[String]) -> Option<SimulateOptions> {
    let mut options = SimulateOptions::default();
    let mut target_seen = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "portrait" | "landscape" if !target_seen => {
                options.goto_portrait = args[i] == "portrait";
                target_seen = true;
            }
            "--flip" => options.flip = true,
            "--damage" => {
                let Some(ms) = args.get(i + 1).and_then(|v| v.parse::<u64>().ok()) else {
                    log_warning!("Invalid interval for --damage. Usage: --damage <ms>");
                    return None;
                };
                if ms == 0 {
                    log_warning!("Damage interval must be greater than zero");
                    return None;
                }
                options.damage_interval_ms = Some(ms);
                i += 1;
            }
            other => {
                log_warning!(
                    "Unexpected argument for simulate: {other}. Usage: wmfx simulate [portrait|landscape] [--flip] [--damage <ms>]"
                );
                return None;
            }
        }
        i += 1;
    }
    Some(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let parsed = ParsedArgs::parse(vec!["wmfx"]);
        assert_eq!(parsed.action, CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_help_flag() {
        assert_eq!(ParsedArgs::parse(vec!["wmfx", "--help"]).action, CliAction::ShowHelp);
        assert_eq!(ParsedArgs::parse(vec!["wmfx", "-h"]).action, CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_version_flags() {
        assert_eq!(ParsedArgs::parse(vec!["wmfx", "--version"]).action, CliAction::ShowVersion);
        assert_eq!(ParsedArgs::parse(vec!["wmfx", "-V"]).action, CliAction::ShowVersion);
        // Version wins over a command
        assert_eq!(
            ParsedArgs::parse(vec!["wmfx", "params", "-V"]).action,
            CliAction::ShowVersion
        );
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let parsed = ParsedArgs::parse(vec!["wmfx", "simulate"]);
        assert_eq!(
            parsed.action,
            CliAction::Simulate {
                debug_enabled: false,
                config_path: None,
                log_file: None,
                options: SimulateOptions::default(),
            }
        );
    }

    #[test]
    fn test_parse_simulate_with_options() {
        let parsed = ParsedArgs::parse(vec![
            "wmfx",
            "-d",
            "simulate",
            "landscape",
            "--flip",
            "--damage",
            "20",
            "--config",
            "/tmp/transitions.toml",
            "--log",
            "/tmp/wmfx.log",
        ]);
        assert_eq!(
            parsed.action,
            CliAction::Simulate {
                debug_enabled: true,
                config_path: Some("/tmp/transitions.toml".to_string()),
                log_file: Some("/tmp/wmfx.log".to_string()),
                options: SimulateOptions {
                    goto_portrait: false,
                    flip: true,
                    damage_interval_ms: Some(20),
                },
            }
        );
    }

    #[test]
    fn test_parse_simulate_rejects_bad_damage() {
        for args in [
            vec!["wmfx", "simulate", "--damage"],
            vec!["wmfx", "simulate", "--damage", "soon"],
            vec!["wmfx", "simulate", "--damage", "0"],
        ] {
            assert_eq!(ParsedArgs::parse(args).action, CliAction::ShowHelpDueToError);
        }
    }

    #[test]
    fn test_parse_simulate_rejects_second_target() {
        let parsed = ParsedArgs::parse(vec!["wmfx", "simulate", "portrait", "landscape"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_params_with_short_alias() {
        let parsed = ParsedArgs::parse(vec!["wmfx", "p", "-c", "custom.toml"]);
        assert_eq!(
            parsed.action,
            CliAction::Params {
                debug_enabled: false,
                config_path: Some("custom.toml".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_help_command() {
        let parsed = ParsedArgs::parse(vec!["wmfx", "help", "simulate"]);
        assert_eq!(
            parsed.action,
            CliAction::Help {
                command: Some("simulate".to_string())
            }
        );
    }

    #[test]
    fn test_parse_missing_config_file() {
        let parsed = ParsedArgs::parse(vec!["wmfx", "params", "--config"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_unknown_flag_and_command() {
        assert_eq!(
            ParsedArgs::parse(vec!["wmfx", "--bogus"]).action,
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            ParsedArgs::parse(vec!["wmfx", "rotate"]).action,
            CliAction::ShowHelpDueToError
        );
    }
}
