//! Structured logging system with visual formatting.
//!
//! Output follows a box-drawing layout so that a rotation sequence or an
//! effect launch reads as one visual block in the terminal or log file:
//!
//! ```text
//! ┏ wmfx v0.3.0 ━━╸
//! ┃
//! ┣ Simulation Mode
//! ┃   Rotating to portrait
//! ┣[DEBUG] Rotation step: phase=Idle direction=landscape new_direction=portrait
//! ╹
//! ```
//!
//! Logging can be switched off at runtime for quiet tests, and `log_debug!`
//! output is gated by a separate debug switch. With `--log` every line is
//! mirrored, without colour codes, to a file written by a background thread.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::thread::JoinHandle;

use anyhow::{Context, Result, anyhow};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set once when `--log` is given; lines go to the file thread from then on
static FILE_SINK: OnceLock<Sender<SinkMessage>> = OnceLock::new();

enum SinkMessage {
    Line(String),
    Shutdown,
}

/// Line prefixes used by the logging macros.
#[doc(hidden)]
pub mod prefix {
    pub const DECORATED: &str = "┣ ";
    pub const INDENTED: &str = "┃   ";
    pub const BLOCK: &str = "┃\n┣ ";
    pub const INFO: &str = "┣[\x1b[32mINFO\x1b[0m] ";
    pub const DEBUG: &str = "┣[\x1b[32mDEBUG\x1b[0m] ";
    pub const WARNING: &str = "┣[\x1b[33mWARNING\x1b[0m] ";
    pub const ERROR: &str = "┣[\x1b[31mERROR\x1b[0m] ";
    pub const CRITICAL: &str = "┣[\x1b[31mCRITICAL\x1b[0m] ";
    pub const WARNING_STANDALONE: &str = "[\x1b[33mWARNING\x1b[0m] ";
    pub const ERROR_STANDALONE: &str = "[\x1b[31mERROR\x1b[0m] ";
}

/// Main logging interface.
///
/// ## Logging Conventions
///
/// - **`log_block_start!`**: begins a new conceptual block (an effect launch,
///   a rotation phase change, loading the parameter file). Prints `┃` then
///   `┣ message`.
/// - **`log_decorated!`**: a line that belongs to the current block, `┣ message`.
/// - **`log_indented!`**: nested detail under the previous line, `┃   message`.
/// - **`log_pipe!`**: a single empty `┃` used before a standalone level message.
/// - **`log_version!`** / **`log_end!`**: header and terminator for the binary.
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_critical!`, `log_debug!`**:
///   semantic messages with a `[LEVEL]` tag.
pub struct Log;

impl Log {
    /// Enable or disable logging temporarily.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Whether `log_debug!` prints. Requires logging to be enabled too.
    pub fn is_debug() -> bool {
        Self::is_enabled() && DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Mirror all further output to `file_path`.
    ///
    /// Can be started once per process. Output keeps flowing to the file until
    /// the returned guard is dropped.
    pub fn start_file_logging(file_path: String) -> Result<LoggerGuard> {
        let mut file = File::create(&file_path)
            .with_context(|| format!("Failed to create log file {file_path}"))?;
        let (tx, rx) = channel();
        FILE_SINK
            .set(tx.clone())
            .map_err(|_| anyhow!("File logging already started"))?;

        let handle = std::thread::spawn(move || -> Result<()> {
            while let Ok(SinkMessage::Line(line)) = rx.recv() {
                file.write_all(line.as_bytes())?;
            }
            file.flush()?;
            Ok(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }
}

/// Keeps file logging alive; flushes and joins the writer thread on drop.
pub struct LoggerGuard {
    tx: Sender<SinkMessage>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(SinkMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Remove `ESC [ ... m` colour sequences.
fn strip_ansi_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("\x1b[") {
        out.push_str(&rest[..start]);
        let sequence = &rest[start + 2..];
        rest = match sequence.find('m') {
            Some(end) => &sequence[end + 1..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

fn line(prefix: &str, message: fmt::Arguments<'_>) -> String {
    format!("{prefix}{message}\n")
}

/// Write raw text to the active sink (needed by the macros).
#[doc(hidden)]
pub fn write_output(text: &str) {
    match FILE_SINK.get() {
        Some(tx) => {
            let _ = tx.send(SinkMessage::Line(strip_ansi_codes(text)));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }
}

/// Write one prefixed line (needed by the macros).
#[doc(hidden)]
pub fn emit(prefix: &str, message: fmt::Arguments<'_>) {
    write_output(&line(prefix, message));
}

// # Logging Macros

/// Shared body of the message macros: check `$gate`, then emit one line.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($gate:ident, $prefix:expr, $fmt:literal $($arg:tt)*) => {{
        if $crate::logger::Log::$gate() {
            $crate::logger::emit($prefix, format_args!($fmt $($arg)*));
        }
    }};
    ($gate:ident, $prefix:expr, $expr:expr) => {{
        if $crate::logger::Log::$gate() {
            $crate::logger::emit($prefix, format_args!("{}", $expr));
        }
    }};
}

/// Log a line that belongs to the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::DECORATED, $($message)+)
    };
}

/// Log a detail line nested under the previous one.
#[macro_export]
macro_rules! log_indented {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::INDENTED, $($message)+)
    };
}

/// Log an empty pipe for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("┃\n");
        }
    }};
}

/// Start a new block.
#[macro_export]
macro_rules! log_block_start {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::BLOCK, $($message)+)
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {{
        if $crate::logger::Log::is_enabled() {
            let version = env!("CARGO_PKG_VERSION");
            $crate::logger::write_output(&format!("┏ wmfx v{version} ━━╸\n"));
        }
    }};
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output("╹\n");
        }
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::INFO, $($message)+)
    };
}

/// Log a debug message. Silent unless debug output is switched on.
#[macro_export]
macro_rules! log_debug {
    ($($message:tt)+) => {
        $crate::__log_line!(is_debug, $crate::logger::prefix::DEBUG, $($message)+)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::WARNING, $($message)+)
    };
}

/// Log a warning outside of any block.
#[macro_export]
macro_rules! log_warning_standalone {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::WARNING_STANDALONE, $($message)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::ERROR, $($message)+)
    };
}

/// Log an error outside of any block.
#[macro_export]
macro_rules! log_error_standalone {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::ERROR_STANDALONE, $($message)+)
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($message:tt)+) => {
        $crate::__log_line!(is_enabled, $crate::logger::prefix::CRITICAL, $($message)+)
    };
}
