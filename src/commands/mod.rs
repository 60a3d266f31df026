//! Command-line command handlers for wmfx.
//!
//! Each command is implemented in its own submodule to keep the code organized
//! and maintainable.

pub mod help;
pub mod params;
pub mod simulate;

use std::path::Path;

use crate::config::{TransitionSettings, resolve_path};

/// Open the transition parameter file selected on the command line, or the
/// first one found in the standard locations.
pub(crate) fn open_settings(config_path: Option<&str>) -> TransitionSettings {
    let path = resolve_path(config_path.map(Path::new));
    log_decorated!("Transition parameters: {}", path.display());
    TransitionSettings::new(path)
}
