//! Parameter file location and parsing.
//!
//! Search order for the parameter file:
//! 1. The path given with `--config`
//! 2. `$XDG_CONFIG_HOME/wmfx/transitions.toml` (or the platform equivalent), if it exists
//! 3. The system-wide file under `/usr/share/wmfx`

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::TransitionTable;
use crate::common::constants::*;

/// Per-user location of the parameter file, whether or not it exists.
pub fn user_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(TRANSITIONS_FILE_NAME))
}

/// Pick the parameter file to use.
///
/// The returned path may not exist; loading it then fails and the caller
/// falls back to compiled-in defaults.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    match user_path() {
        Some(path) if path.exists() => path,
        _ => PathBuf::from(SYSTEM_TRANSITIONS_PATH),
    }
}

/// Read and parse the parameter file at `path`.
pub fn load_from_path(path: &Path) -> Result<TransitionTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_transitions(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse parameter file contents. Every top-level entry must be a table.
pub fn parse_transitions(content: &str) -> Result<TransitionTable> {
    let table: TransitionTable =
        toml::from_str(content).context("Invalid transition parameter syntax")?;
    Ok(table)
}
