/// Append-only, timestamp-prefixed line files.
pub mod appendlog;
