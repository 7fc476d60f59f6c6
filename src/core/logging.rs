use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use crate::core::error::{Error, ErrorKind, Result};

/// How much source context each line carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogStyle {
    Plain,     // level, time, target, message
    Source,    // + file:line
    Threads,   // + thread names
    Full,      // + thread ids
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,          // Used when RUST_LOG is unset
    pub style: LogStyle,
    pub file: Option<PathBuf>,  // Log to this file instead of stderr
    pub truncate: bool,         // Clear `file` before writing
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            style: LogStyle::Plain,
            file: None,
            truncate: false,
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(config.style >= LogStyle::Source)
        .with_line_number(config.style >= LogStyle::Source)
        .with_thread_names(config.style >= LogStyle::Threads)
        .with_thread_ids(config.style >= LogStyle::Full);

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(!config.truncate)
                .truncate(config.truncate)
                .open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| Error::new(ErrorKind::Configuration, format!("logging already initialised: {}", e)))
}

/// Safe to call from every test.
pub fn init_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let config = LogConfig {
            level: "warn".to_string(),
            ..LogConfig::default()
        };
        let _ = init(&config);
    });
}
