//! Single instance lock using Unix socket.
//!
//! Prevents two services from driving the same settings lock button on the
//! same endpoint. The socket name is derived from the endpoint host and the
//! panel id, so one machine can still serve several endpoints. The OS removes
//! the socket when the process dies, avoiding stale lock files.

use std::io;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance is already serving this endpoint and panel.
    #[error("another instance is already running for {0}")]
    AlreadyRunning(String),

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for as long as the service runs; the socket file is removed on drop.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Attempt to acquire the lock for `host` / `panel_id`.
    pub fn acquire(host: &str, panel_id: &str) -> Result<Self, InstanceLockError> {
        let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        Self::acquire_in(&dir, host, panel_id)
    }

    fn acquire_in(dir: &Path, host: &str, panel_id: &str) -> Result<Self, InstanceLockError> {
        let path = Self::socket_path(dir, host, panel_id);
        let owner = format!("{panel_id}@{host}");

        // A socket file nobody answers on was left behind by a killed process
        if path.exists() {
            match std::os::unix::net::UnixStream::connect(&path) {
                Ok(_) => return Err(InstanceLockError::AlreadyRunning(owner)),
                Err(_) => {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(owner))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    /// Socket path for `host` / `panel_id` under `dir`.
    pub fn socket_path(dir: &Path, host: &str, panel_id: &str) -> PathBuf {
        let sanitize = |s: &str| -> String {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect()
        };
        dir.join(format!(
            "settings-lock-{}-{}.sock",
            sanitize(host),
            sanitize(panel_id)
        ))
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
