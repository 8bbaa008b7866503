//! Append-only NDJSON audit log.
//!
//! Every dispatched command and every failed authentication attempt is
//! recorded as one JSON line in `audit.log` under the state directory.
//! Writes are single-producer (the bridge) and flushed per entry; write
//! failures are logged at WARN and never propagated -- a broken audit log
//! must not interrupt command dispatch.

mod sanitize;

pub use sanitize::{sanitize_params, MAX_STRING_LEN, TRUNCATION_MARKER};

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

/// One structured JSON line in the audit log.
#[derive(Debug, Serialize)]
pub struct AuditRecord {
    /// RFC-3339 UTC timestamp of the dispatch.
    pub timestamp: String,
    /// Command name, or `"auth_failed"` for a rejected handshake.
    pub action: String,
    /// Command parameters with long string values truncated.
    pub params: Value,
}

impl AuditRecord {
    /// Build a record, sanitizing `params` in the process.
    pub fn new(action: impl Into<String>, params: &Value) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: action.into(),
            params: sanitize_params(params),
        }
    }
}

/// Append-only audit log writer.
///
/// The file handle is opened lazily on first append and cached for the
/// process lifetime. The parent directory is created at mode 0o700 and the
/// log file at 0o600.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl AuditLog {
    /// Create a log writer for `<state_dir>/audit.log`. No file is touched
    /// until the first append.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("audit.log"),
            file: Mutex::new(None),
        }
    }

    /// Path of the log file, for operator display.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Errors are swallowed after a WARN event.
    pub async fn append(&self, record: &AuditRecord) {
        if let Err(e) = self.try_append(record).await {
            tracing::warn!(err = %e, "audit log write failed");
        }
    }

    /// Convenience: record a command dispatch.
    pub async fn record(&self, action: &str, params: &Value) {
        self.append(&AuditRecord::new(action, params)).await;
    }

    async fn try_append(&self, record: &AuditRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record).map_err(std::io::Error::other)? + "\n";

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
                set_mode(parent, 0o700).await;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            set_mode(&self.path, 0o600).await;
            *guard = Some(file);
        }

        let file = guard.as_mut().expect("file cached above");
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await;
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) {}
