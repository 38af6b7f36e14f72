//! Logging for the host process.
//!
//! Stdout carries protocol frames, so logs go to `clicker_host.log` next to
//! the host's other files, and optionally to stderr (which the browser
//! forwards to its own log).

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILENAME: &str = "clicker_host.log";

/// Destination for log output.
pub enum LogDestination {
    /// Write to the log file only.
    File,
    /// Write to the log file and stderr.
    FileAndStderr,
}

/// Initialize the logger with the specified destination.
pub fn initialize(dir: &Path, destination: LogDestination) {
    let level = LevelFilter::Info;
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let LogDestination::FileAndStderr = destination {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Never,
        ));
    }
    if let Some(file_logger) = create_file_logger(dir, level, config) {
        loggers.push(file_logger);
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    dir: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    let log_path = dir.join(LOG_FILENAME);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
