// Logger - Session log for the emulator host
//
// Provides:
// - Configurable log levels
// - Bounded in-memory entry buffer
// - Optional mirroring to a log file and to stderr

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging
    None,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warning,
    /// Info, warnings, and errors
    Info,
    /// Debug information
    Debug,
    /// Verbose per-frame tracing
    Trace,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::None => "NONE",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Local>,
    /// Severity of the entry
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:<5}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level.label(),
            self.message
        )
    }
}

/// Logger
///
/// Collects host log entries in a bounded buffer.
/// Entries can additionally be written to a file and echoed to stderr.
pub struct Logger {
    /// Current log level
    log_level: LogLevel,

    /// In-memory entry buffer
    entries: Vec<LogEntry>,

    /// Maximum number of entries in the buffer (0 = unlimited)
    max_buffer_size: usize,

    /// Output file
    output_file: Option<File>,

    /// Echo entries to stderr
    echo_stderr: bool,
}

impl Logger {
    /// Create a new logger
    ///
    /// # Returns
    ///
    /// A logger at `Info` level that keeps the last 1000 entries in memory
    pub fn new() -> Self {
        Logger {
            log_level: LogLevel::Info,
            entries: Vec::new(),
            max_buffer_size: 1000,
            output_file: None,
            echo_stderr: false,
        }
    }

    /// Set the log level
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    /// Get the current log level
    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Check whether a message at `level` would be recorded
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.log_level
    }

    /// Enable or disable mirroring entries to stderr
    pub fn set_echo_stderr(&mut self, echo: bool) {
        self.echo_stderr = echo;
    }

    /// Set maximum buffer size
    ///
    /// When the buffer exceeds this size, old entries are removed.
    /// Set to 0 for unlimited size.
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum number of entries (0 = unlimited)
    pub fn set_max_buffer_size(&mut self, size: usize) {
        self.max_buffer_size = size;

        if size > 0 && self.entries.len() > size {
            self.entries.drain(0..self.entries.len() - size);
        }
    }

    /// Open a log file for output
    ///
    /// Entries are appended so consecutive sessions share one file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the log file
    pub fn open_log_file<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.output_file = Some(file);
        Ok(())
    }

    /// Close the log file
    pub fn close_log_file(&mut self) {
        self.output_file = None;
    }

    /// Log a message
    ///
    /// # Arguments
    ///
    /// * `level` - The log level for this message
    /// * `message` - The message to log
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if !self.enabled(level) {
            return;
        }

        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };
        self.add_entry(entry);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn trace(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    fn add_entry(&mut self, entry: LogEntry) {
        if let Some(ref mut file) = self.output_file {
            let _ = writeln!(file, "{}", entry);
        }
        if self.echo_stderr {
            eprintln!("{}", entry);
        }

        self.entries.push(entry);

        if self.max_buffer_size > 0 && self.entries.len() > self.max_buffer_size {
            self.entries.remove(0);
        }
    }

    /// All buffered entries, oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Clear the buffer
    pub fn clear_buffer(&mut self) {
        self.entries.clear();
    }

    /// Get the last N entries
    pub fn last_entries(&self, count: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    /// Check whether any buffered entry at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_creation() {
        let logger = Logger::new();
        assert_eq!(logger.log_level(), LogLevel::Info);
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn test_level_filtering() {
        let mut logger = Logger::new();
        logger.set_log_level(LogLevel::Warning);

        logger.info("dropped");
        logger.warn("kept");
        logger.error("also kept");

        assert_eq!(logger.entries().len(), 2);
        assert_eq!(logger.entries()[0].message, "kept");
        assert_eq!(logger.entries()[1].level, LogLevel::Error);
    }

    #[test]
    fn test_level_none_records_nothing() {
        let mut logger = Logger::new();
        logger.set_log_level(LogLevel::None);
        logger.error("nothing");
        logger.log(LogLevel::None, "nothing either");
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn test_max_buffer_size() {
        let mut logger = Logger::new();
        logger.set_max_buffer_size(3);

        for i in 1..=4 {
            logger.info(i.to_string());
        }

        assert_eq!(logger.entries().len(), 3);
        assert_eq!(logger.entries()[0].message, "2");
    }

    #[test]
    fn test_last_entries() {
        let mut logger = Logger::new();
        logger.info("1");
        logger.info("2");
        logger.info("3");

        let last = logger.last_entries(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].message, "2");
        assert_eq!(last[1].message, "3");
    }

    #[test]
    fn test_entry_display_includes_level() {
        let mut logger = Logger::new();
        logger.warn("audio underrun");
        let line = logger.entries()[0].to_string();
        assert!(line.contains("[WARN ]"));
        assert!(line.ends_with("audio underrun"));
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }
}
