//! Transition parameter source with lazy loading and hot reload.
//!
//! Every effect asks this module for its tunables (durations, angles and the
//! rotation damage timeouts). Values come from a TOML file with one table per
//! transition:
//!
//! ```toml
//! [popup]
//! duration_in = 250        # Map animation length (ms)
//! duration_out = 250       # Unmap animation length (ms)
//!
//! [app_close]
//! duration = 500           # Close animation length (ms)
//!
//! [rotate]
//! duration_in = 300        # Fade-out half of the rotation (ms)
//! duration_out = 300       # Fade-in half of the rotation (ms)
//! angle = 40.0             # Tilt applied to the scene (degrees)
//! damage_timeout = 50      # Quiet period that ends WAITING (ms)
//! damage_timeout_max = 1000  # Hard cap on WAITING (ms)
//! ```
//!
//! ## Failure policy
//!
//! Lookups never fail. A missing file, a missing key or a value of the wrong
//! type logs a warning and hands back the caller's default. A reload that
//! fails keeps whatever was loaded before.
//!
//! ## Staleness
//!
//! The loaded table is cached behind a shared staleness flag. The file
//! watcher (see [`watcher`]) or [`TransitionSettings::mark_stale`] sets the
//! flag; the next lookup reloads. If watching was requested but could not be
//! set up, the flag stays raised and every lookup re-reads the file.

pub mod loading;
pub mod watcher;


use anyhow::{Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::constants::*;

pub use loading::{load_from_path, parse_transitions, resolve_path};
pub use watcher::start_config_watcher;

/// Source of named numeric transition parameters.
///
/// Implementations must never fail the caller: on any problem they return
/// `default`.
pub trait ParamSource {
    /// Read an integer parameter.
    fn get_int(&mut self, transition: &str, key: &str, default: i64) -> i64;

    /// Read a floating-point parameter. Integer values are accepted.
    fn get_double(&mut self, transition: &str, key: &str, default: f64) -> f64;
}

/// Compiled-in default of a known parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Int(i64),
    Double(f64),
}

/// Every parameter the effects read, with its compiled-in default.
pub const KNOWN_PARAMETERS: &[(&str, &str, ParamDefault)] = &[
    (TRANSITION_POPUP, KEY_DURATION_IN, ParamDefault::Int(DEFAULT_POPUP_DURATION)),
    (TRANSITION_POPUP, KEY_DURATION_OUT, ParamDefault::Int(DEFAULT_POPUP_DURATION)),
    (TRANSITION_FADE, KEY_DURATION_IN, ParamDefault::Int(DEFAULT_FADE_DURATION)),
    (TRANSITION_FADE, KEY_DURATION_OUT, ParamDefault::Int(DEFAULT_FADE_DURATION)),
    (TRANSITION_NOTIFICATION, KEY_DURATION_IN, ParamDefault::Int(DEFAULT_NOTIFICATION_DURATION)),
    (TRANSITION_NOTIFICATION, KEY_DURATION_OUT, ParamDefault::Int(DEFAULT_NOTIFICATION_DURATION)),
    (TRANSITION_SUBVIEW, KEY_DURATION_IN, ParamDefault::Int(DEFAULT_SUBVIEW_DURATION)),
    (TRANSITION_SUBVIEW, KEY_DURATION_OUT, ParamDefault::Int(DEFAULT_SUBVIEW_DURATION)),
    (TRANSITION_APP_CLOSE, KEY_DURATION, ParamDefault::Int(DEFAULT_APP_CLOSE_DURATION)),
    (TRANSITION_ROTATE, KEY_DURATION_IN, ParamDefault::Int(DEFAULT_ROTATE_DURATION)),
    (TRANSITION_ROTATE, KEY_DURATION_OUT, ParamDefault::Int(DEFAULT_ROTATE_DURATION)),
    (TRANSITION_ROTATE, KEY_ANGLE, ParamDefault::Double(DEFAULT_ROTATE_ANGLE)),
    (TRANSITION_ROTATE, KEY_DAMAGE_TIMEOUT, ParamDefault::Double(DEFAULT_DAMAGE_TIMEOUT)),
    (TRANSITION_ROTATE, KEY_DAMAGE_TIMEOUT_MAX, ParamDefault::Double(DEFAULT_DAMAGE_TIMEOUT_MAX)),
];

/// Parsed parameter file: transition name to its key/value table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TransitionTable {
    sections: BTreeMap<String, toml::Table>,
}

impl TransitionTable {
    fn value(&self, transition: &str, key: &str) -> Result<&toml::Value> {
        let Some(section) = self.sections.get(transition) else {
            bail!("no [{transition}] table");
        };
        match section.get(key) {
            Some(value) => Ok(value),
            None => bail!("key not found"),
        }
    }

    /// Look up an integer value.
    pub fn int(&self, transition: &str, key: &str) -> Result<i64> {
        match self.value(transition, key)? {
            toml::Value::Integer(value) => Ok(*value),
            other => bail!("expected an integer, found {}", other.type_str()),
        }
    }

    /// Look up a floating-point value, accepting integers.
    pub fn double(&self, transition: &str, key: &str) -> Result<f64> {
        match self.value(transition, key)? {
            toml::Value::Float(value) if value.is_finite() => Ok(*value),
            toml::Value::Float(value) => bail!("expected a finite number, found {value}"),
            toml::Value::Integer(value) => Ok(*value as f64),
            other => bail!("expected a number, found {}", other.type_str()),
        }
    }

    /// Names of the transitions present in the file.
    pub fn transitions(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// Lazily loaded, hot-reloadable parameter file.
pub struct TransitionSettings {
    /// File backing the settings (`None` means compiled-in defaults only)
    path: Option<PathBuf>,
    /// Last table that loaded successfully
    table: Option<TransitionTable>,
    /// Raised when the table must be re-read before the next lookup
    stale: Arc<AtomicBool>,
    /// Whether to install a file watcher after the first successful load
    watch: bool,
    /// Keeps the notify watcher alive
    watcher: Option<notify::RecommendedWatcher>,
    /// Whether the most recent load attempt failed (warn once per failure streak)
    load_failed: bool,
    /// Missing keys already reported
    warned_keys: HashSet<(String, String)>,
}

impl TransitionSettings {
    /// Settings backed by the file at `path`. Nothing is read until the first lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            table: None,
            stale: Arc::new(AtomicBool::new(true)),
            watch: false,
            watcher: None,
            load_failed: false,
            warned_keys: HashSet::new(),
        }
    }

    /// Settings backed by the first existing file in the standard search order.
    pub fn from_default_location() -> Self {
        Self::new(resolve_path(None))
    }

    /// Settings that always answer with the caller's default.
    pub fn defaults_only() -> Self {
        Self {
            path: None,
            table: None,
            stale: Arc::new(AtomicBool::new(false)),
            watch: false,
            watcher: None,
            load_failed: false,
            warned_keys: HashSet::new(),
        }
    }

    /// Watch the file for external changes once it has been loaded.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flag an external change; the next lookup reloads the file.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Shared staleness flag, for observers that detect changes themselves.
    pub fn stale_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stale)
    }

    /// Whether a table has been loaded at least once.
    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    /// Current table, reloading first if stale.
    pub fn table(&mut self) -> Option<&TransitionTable> {
        if self.stale.load(Ordering::SeqCst) {
            self.reload();
        }
        self.table.as_ref()
    }

    fn reload(&mut self) {
        let Some(path) = self.path.clone() else {
            self.stale.store(false, Ordering::SeqCst);
            return;
        };

        log_debug!(
            "{} {}",
            if self.table.is_some() { "Reloading" } else { "Loading" },
            path.display()
        );

        match load_from_path(&path) {
            Ok(table) => {
                self.table = Some(table);
                self.load_failed = false;
                self.warned_keys.clear();
            }
            Err(e) => {
                // Keep the previous table, stay stale so the next lookup retries
                if !self.load_failed {
                    log_pipe!();
                    log_warning!("Couldn't load {}: {e:#}", path.display());
                    if self.table.is_none() {
                        log_indented!("Using default transition settings");
                    }
                }
                self.load_failed = true;
                return;
            }
        }

        if !self.watch {
            self.stale.store(false, Ordering::SeqCst);
            return;
        }

        if self.watcher.is_none() {
            match start_config_watcher(&path, Arc::clone(&self.stale)) {
                Ok(watcher) => self.watcher = Some(watcher),
                Err(e) => {
                    log_warning!("Not watching {}: {e:#}", path.display());
                    return;
                }
            }
        }

        // Only stop reloading once changes can be observed
        self.stale.store(false, Ordering::SeqCst);
    }

    fn report_lookup_failure(&mut self, transition: &str, key: &str, error: &anyhow::Error) {
        if self
            .warned_keys
            .insert((transition.to_string(), key.to_string()))
        {
            log_warning!("Couldn't read {transition}::{key} from transition settings: {error}");
        }
    }
}

impl ParamSource for TransitionSettings {
    fn get_int(&mut self, transition: &str, key: &str, default: i64) -> i64 {
        let Some(table) = self.table() else {
            return default;
        };
        match table.int(transition, key) {
            Ok(value) => value,
            Err(e) => {
                self.report_lookup_failure(transition, key, &e);
                default
            }
        }
    }

    fn get_double(&mut self, transition: &str, key: &str, default: f64) -> f64 {
        let Some(table) = self.table() else {
            return default;
        };
        match table.double(transition, key) {
            Ok(value) => value,
            Err(e) => {
                self.report_lookup_failure(transition, key, &e);
                default
            }
        }
    }
}
