//! Logging utilities with colored module prefixes.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `vlog!` macro for verbose-only detail lines
//! - a process-wide verbosity level set once from the CLI
//!
//! # Example
//!
//! ```ignore
//! // Simple logging
//! log!("build"; "compiled {} pages", count);
//!
//! // Only shown with --verbose
//! vlog!("deploy"; "remote dir ensured: {}", path);
//! ```

use colored::{ColoredString, Colorize};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicU8, Ordering},
};

/// Process-wide verbosity, set once at startup.
static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

/// Output verbosity level.
///
/// Quiet mode suppresses everything except errors and warnings;
/// verbose mode additionally prints per-file and per-task detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Verbosity {
    Quiet = 0,
    Normal = 1,
    Verbose = 2,
}

/// Install the verbosity level (called once from `main`).
pub fn init(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// True when `--verbose` was given.
#[inline]
pub fn verbose() -> bool {
    VERBOSITY.load(Ordering::Relaxed) == Verbosity::Verbose as u8
}

/// True when `--quiet` was given.
#[inline]
pub fn quiet() -> bool {
    VERBOSITY.load(Ordering::Relaxed) == Verbosity::Quiet as u8
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a message only when `--verbose` is active.
#[macro_export]
macro_rules! vlog {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix.
///
/// In quiet mode only `error` and `warn` modules are printed.
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();

    if quiet() && !matches!(module_lower.as_str(), "error" | "warn") {
        return;
    }

    let prefix = colorize_prefix(module, &module_lower);
    let mut stdout = stdout().lock();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "deploy" => prefix.bright_cyan().bold(),
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.yellow().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

// ============================================================================
// Tests
// ============================================================================
