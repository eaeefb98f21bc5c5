//! Structured logging for the METAR map service
//!
//! Provides context-rich logging with component and station identifiers,
//! timestamps, and severity levels. Supports both console output and
//! file-based logging for unattended operation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use std::thread;

use crate::model::MetarError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Which part of the service produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// aviationweather.gov data API
    Awc,
    /// Indicator strip writes
    Leds,
    Display,
    Scheduler,
    Rotation,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Awc => write!(f, "AWC"),
            Component::Leds => write!(f, "LEDS"),
            Component::Display => write!(f, "DISPLAY"),
            Component::Scheduler => write!(f, "SCHED"),
            Component::Rotation => write!(f, "ROTATE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - transient network trouble that the next refresh will likely clear
    Expected,
    /// Unexpected failure - indicates an API change or a configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Log file, opened once in append mode
    log_file: Option<File>,
    /// Whether to include timestamps in console output. Off when running
    /// under a supervisor that stamps lines itself.
    console_timestamps: bool,
}

/// One log line's fields.
pub struct Entry<'a> {
    pub level: LogLevel,
    pub component: Component,
    /// Name of the emitting thread when it is not the control thread,
    /// e.g. `blink-3`.
    pub thread: Option<&'a str>,
    pub station_id: Option<&'a str>,
    pub message: &'a str,
}

impl Entry<'_> {
    /// `WARN  SCHED blink-3 [KBOS]: message`
    pub fn format_body(&self) -> String {
        let mut line = format!("{:<5} {}", self.level.to_string(), self.component);
        if let Some(thread) = self.thread {
            line.push(' ');
            line.push_str(thread);
        }
        if let Some(station) = self.station_id {
            line.push_str(&format!(" [{}]", station));
        }
        line.push_str(": ");
        line.push_str(self.message);
        line
    }

    pub fn format_stamped(&self, now: DateTime<Utc>) -> String {
        format!("{} {}", now.format("%Y-%m-%d %H:%M:%S%.3f UTC"), self.format_body())
    }
}

impl Logger {
    /// Initialize the global logger. A log file that cannot be opened is
    /// reported on stderr and logging continues on the console only.
    pub fn init(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
        let log_file = log_file.and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(file),
                Err(e) => {
                    eprintln!("Failed to open log file {}: {}", path, e);
                    None
                }
            }
        });

        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, entry: &Entry<'_>) {
        if entry.level < self.min_level {
            return;
        }

        let stamped = entry.format_stamped(Utc::now());
        let console = if self.console_timestamps {
            stamped.clone()
        } else {
            entry.format_body()
        };

        match entry.level {
            LogLevel::Error | LogLevel::Warning => eprintln!("{}", console),
            LogLevel::Info | LogLevel::Debug => println!("{}", console),
        }

        if let Some(mut file) = self.log_file.as_ref() {
            if let Err(e) = writeln!(file, "{}", stamped) {
                eprintln!("Failed to write to log file: {}", e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file, console_timestamps);
}

fn dispatch(level: LogLevel, component: Component, station_id: Option<&str>, message: &str) {
    let current = thread::current();
    let thread = current.name().filter(|name| *name != "main");
    let entry = Entry {
        level,
        component,
        thread,
        station_id,
        message,
    };

    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(&entry);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, station_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, station_id, message);
}

/// Log a warning message
pub fn warn(component: Component, station_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, station_id, message);
}

/// Log an error message
pub fn error(component: Component, station_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, station_id, message);
}

/// Log a debug message
pub fn debug(component: Component, station_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, station_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a weather fetch failure.
pub fn classify_fetch_failure(err: &MetarError) -> FailureType {
    match err {
        // Timeouts and dropped connections come and go with the network.
        MetarError::Transport(_) => FailureType::Expected,
        // The API briefly returns 5xx during maintenance windows.
        MetarError::Http(code) if *code >= 500 => FailureType::Unknown,
        // 4xx or an unreadable body suggests a bad station list or an API change.
        MetarError::Http(_) | MetarError::Parse(_) => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

/// Log a weather fetch failure with automatic classification and the
/// station set that was requested.
pub fn log_fetch_failure(station_ids: &[&str], err: &MetarError) {
    let failure_type = classify_fetch_failure(err);

    let message = format!(
        "METAR fetch for {} stations [{}] failed [{}]: {}",
        station_ids.len(),
        station_ids.join(","),
        failure_type,
        err
    );

    match failure_type {
        FailureType::Expected => warn(Component::Awc, None, &message),
        FailureType::Unexpected => error(Component::Awc, None, &message),
        FailureType::Unknown => warn(Component::Awc, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Refresh Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one weather refresh
pub fn log_refresh_summary(requested: usize, reporting: usize, unknown_category: usize) {
    let message = format!(
        "Weather refresh: {}/{} stations reporting, {} without flight category",
        reporting,
        requested,
        unknown_category
    );

    if reporting == requested && unknown_category == 0 {
        info(Component::Awc, None, &message);
    } else if reporting == 0 && requested > 0 {
        error(Component::Awc, None, &message);
    } else {
        warn(Component::Awc, None, &message);
    }
}
