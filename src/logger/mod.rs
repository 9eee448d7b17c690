//! JSONL activity logger: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in
//! memory and written atomically via `write_all` so a tailing process
//! never sees a partial line.
//!
//! Three-level fallback chain:
//! 1. Primary file path
//! 2. stderr with `[BD-JSONL]` prefix
//! 3. Silent discard (the client must never crash for logging failures)

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Log event types matching the client activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Login,
    PageLoad,
    WatchAdd,
    WatchRemove,
    CheckComplete,
    Resolve,
    TranslateStart,
    TranslatePoll,
    ClientStart,
    ClientStop,
    Error,
}

/// A single JSONL log entry; all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Record path or branch key involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Count of unresolved items after a check/resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<usize>,
    /// Whether a cascading (deep) resolve was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep: Option<bool>,
    /// BD error code if the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity,
            path: None,
            unresolved: None,
            deep: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_unresolved(mut self, count: usize) -> Self {
        self.unresolved = Some(count);
        self
    }

    #[must_use]
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = Some(deep);
        self
    }

    #[must_use]
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Append-only JSONL writer with the fallback chain described above.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    path: PathBuf,
}

impl JsonlLogger {
    /// Create a logger targeting `path`. Parent directories are created
    /// lazily on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Failures fall back to stderr, then discard.
    pub fn log(&self, entry: &LogEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');

        if self.append(&line).is_ok() {
            return;
        }
        // Primary path failed; fall back to stderr and otherwise give up.
        let _ = write!(std::io::stderr(), "[BD-JSONL] {line}");
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_append_as_single_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonlLogger::new(dir.path().join("activity.jsonl"));

        logger.log(
            &LogEntry::new(EventType::CheckComplete, Severity::Info)
                .with_path("DAZHO-R")
                .with_unresolved(3),
        );
        logger.log(
            &LogEntry::new(EventType::Error, Severity::Error)
                .with_error("BD-2002", "service returned HTTP 503"),
        );

        let raw = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event, EventType::CheckComplete);
        assert_eq!(first.unresolved, Some(3));
        assert_eq!(first.path.as_deref(), Some("DAZHO-R"));

        let second: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.error_code.as_deref(), Some("BD-2002"));
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("log.jsonl");
        let logger = JsonlLogger::new(&nested);
        logger.log(&LogEntry::new(EventType::ClientStart, Severity::Info));
        assert!(nested.exists());
    }

    #[test]
    fn optional_fields_are_omitted_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonlLogger::new(dir.path().join("log.jsonl"));
        logger.log(&LogEntry::new(EventType::ClientStop, Severity::Info));
        let raw = fs::read_to_string(logger.path()).unwrap();
        assert!(!raw.contains("error_code"));
        assert!(!raw.contains("unresolved"));
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let logger = JsonlLogger::new("/proc/definitely/not/writable.jsonl");
        logger.log(&LogEntry::new(EventType::Error, Severity::Error));
    }
}
