//! Append-only `backup_log.txt` writer.
//!
//! Every line is `[DD-MM-YYYY HH:MM:SS] [CATEGORY] message` and is mirrored to
//! `tracing` so the console shows the same events.

use crate::backup::result_error::result::Result;
use chrono::Local;
use derive_more::Display;
use itertools::Itertools;
use std::fs::OpenOptions;
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

static LOG_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const SEPARATOR_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum LogCategory {
    #[display("[INFO]")]
    Info,
    #[display("[BACKUP]")]
    Backup,
    #[display("[CLEANUP]")]
    Cleanup,
    #[display("[WARNING]")]
    Warning,
    #[display("[ERROR]")]
    Error,
}

pub struct EventLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl EventLog {
    /// Opens (or creates) the log file in append mode.
    pub fn open_append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(LineWriter::new(writer))),
        }
    }

    pub fn info<S: AsRef<str>>(&self, msg: S) {
        self.record(LogCategory::Info, msg)
    }

    pub fn backup<S: AsRef<str>>(&self, msg: S) {
        self.record(LogCategory::Backup, msg)
    }

    pub fn cleanup<S: AsRef<str>>(&self, msg: S) {
        self.record(LogCategory::Cleanup, msg)
    }

    pub fn warning<S: AsRef<str>>(&self, msg: S) {
        self.record(LogCategory::Warning, msg)
    }

    pub fn error<S: AsRef<str>>(&self, msg: S) {
        self.record(LogCategory::Error, msg)
    }

    pub fn separator(&self) {
        self.write_line("-".repeat(SEPARATOR_WIDTH).as_str());
    }

    /// Multi-line messages, such as nested errors, are folded onto one line.
    pub fn record<S: AsRef<str>>(&self, category: LogCategory, msg: S) {
        let msg = msg
            .as_ref()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .join(" ");
        match category {
            LogCategory::Warning => tracing::warn!("{category} {msg}"),
            LogCategory::Error => tracing::error!("{category} {msg}"),
            _ => tracing::info!("{category} {msg}"),
        }
        self.write_line(format!("{category} {msg}").as_str());
    }

    fn write_line(&self, body: &str) {
        let line = format!("[{}] {body}\n", Local::now().format(LOG_TIME_FORMAT));
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        // Reported, never propagated.
        if let Err(e) = sink.write_all(line.as_bytes()) {
            tracing::warn!("Writing backup log failed: {e}");
        }
    }

    /// Flushes and releases the underlying handle.
    pub fn close(self) -> Result<()> {
        let mut sink = self
            .sink
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_line_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup_log.txt");

        let log = EventLog::open_append(&path).unwrap();
        log.backup("Created ZIP: /b/docs_2024-01-01_00-00-00.zip");
        log.close().unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.starts_with('['));
        let stamp = &line[1..20];
        assert!(NaiveDateTime::parse_from_str(stamp, LOG_TIME_FORMAT).is_ok());
        assert_eq!(
            &line[20..],
            "] [BACKUP] Created ZIP: /b/docs_2024-01-01_00-00-00.zip"
        );
    }

    #[test]
    fn test_appends_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup_log.txt");

        let log = EventLog::open_append(&path).unwrap();
        log.info("Watching source: /data/docs");
        log.separator();
        log.close().unwrap();

        let log = EventLog::open_append(&path).unwrap();
        log.cleanup("Removed old backup: docs_2024-01-01_00-00-00");
        log.warning("Failed to remove docs_2024-01-01_00-00-01");
        log.error("Source path does not exist: /nope");
        drop(log);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("] [INFO] Watching source: /data/docs"));
        assert!(lines[1].ends_with(&format!("] {}", "-".repeat(60))));
        assert!(lines[2].ends_with("] [CLEANUP] Removed old backup: docs_2024-01-01_00-00-00"));
        assert!(lines[3].contains("] [WARNING] "));
        assert!(lines[4].contains("] [ERROR] "));
    }

    #[test]
    fn test_multi_line_message_folded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup_log.txt");

        let log = EventLog::open_append(&path).unwrap();
        log.error("Backup failed:\n  \"/data/docs\" write_snapshot failed:\n    disk full\n");
        log.close().unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(
            "] [ERROR] Backup failed: \"/data/docs\" write_snapshot failed: disk full"
        ));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(LogCategory::Info.to_string(), "[INFO]");
        assert_eq!(LogCategory::Cleanup.to_string(), "[CLEANUP]");
    }
}
