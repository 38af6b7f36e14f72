#![deny(missing_docs)]
//! Shared logging utilities for the consent clicker workspace.
//!
//! This crate provides the `clicker_*` logging macros used across the codebase,
//! a helper for keeping credentials out of log lines, and a minimal test
//! initializer for the global logger.

/// Number of leading characters of a secret that may appear in a log line.
const REDACT_VISIBLE: usize = 4;

/// Masks a credential for logging, keeping only a short prefix.
///
/// Empty input is rendered as `<empty>` so that a missing key is still
/// distinguishable from a present one in the logs.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<empty>".to_string();
    }
    let visible: String = secret.chars().take(REDACT_VISIBLE).collect();
    if visible.len() == secret.len() {
        return "****".to_string();
    }
    format!("{visible}****")
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! clicker_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! clicker_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! clicker_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! clicker_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! clicker_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]);
}
