//! # Append Log
//!
//! Durable, append-only text files with one timestamp-prefixed line per entry.
//! The feed monitor keeps two of these: every raw inbound message, and every
//! extracted "amount raised" value.

use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A destination that accepts complete log lines.
///
/// Implementations must append and never rewrite existing content. The line
/// passed in carries no trailing newline.
pub trait LineSink: Send + Sync {
    /// Appends a single line.
    fn append_line(&self, line: &str) -> io::Result<()>;
}

/// Prefixes `text` with the current UTC time, e.g.
/// `[2024-05-01T12:00:00.123Z] hello`.
pub fn timestamped(text: &str) -> String {
    format!("[{}] {}", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true), text)
}

/// # Append Log
///
/// File-backed [`LineSink`]. The file is opened in append mode (and created if
/// missing) on every write, so external rotation of the file is tolerated.
pub struct AppendLog {
    /// The file all lines are appended to.
    path: PathBuf,
    /// Serialises writers so lines from concurrent callers never interleave.
    write_lock: Mutex<()>,
}

impl AppendLog {
    /// Creates a sink for `path`. Missing parent directories are created
    /// lazily on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The file this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSink for AppendLog {
    fn append_line(&self, line: &str) -> io::Result<()> {
        // A poisoned lock only means another writer panicked mid-line; the file itself is still usable.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}
