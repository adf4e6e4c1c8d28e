//! Single-instance guard backed by a PID marker file.
//!
//! - `InstanceGuard::acquire(path)`: refuse to start when the marker names a live
//!   process, discard a stale marker, then write our own PID.
//! - `InstanceGuard::release()`: delete the marker. Idempotent; also run on drop.
//! - `remove_marker(path)`: the same deletion for paths that must not borrow the
//!   guard (the panic hook).
//!
//! Liveness is tested with signal 0, which checks that the PID exists without
//! delivering anything. A marker that cannot be parsed, names PID 0 or names our
//! own PID (recycled after a container restart) is treated as stale.

use digest_common::{AgentError, Result};
use log::{error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ownership of the instance marker for the lifetime of the process.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    released: AtomicBool,
}

impl InstanceGuard {
    /// Claim the marker at `path`.
    ///
    /// Fails with `AgentError::AlreadyRunning` when another live process owns it;
    /// the caller must exit without starting anything else.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let own_pid = process::id();

        match fs::read_to_string(&path) {
            Ok(content) => match content.trim().parse::<u32>() {
                Ok(pid) if pid != own_pid && is_process_alive(pid) => {
                    error!("Another bot instance is already running (PID: {})", pid);
                    return Err(AgentError::AlreadyRunning { pid });
                }
                _ => {
                    remove_marker(&path)?;
                    info!("Removed stale PID file {}", path.display());
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(AgentError::Io(e)),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, own_pid.to_string())?;
        info!("Created PID file {}: {}", path.display(), own_pid);

        Ok(Self {
            path,
            released: AtomicBool::new(false),
        })
    }

    /// Marker location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the marker. Only the first call does any work.
    pub fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if remove_marker(&self.path)? {
            info!("Removed PID file {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to remove PID file on drop: {}", e);
        }
    }
}

/// Delete the marker at `path`. Returns `false` if there was none.
pub fn remove_marker(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AgentError::Io(e)),
    }
}

/// Whether a process with `pid` exists.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let pid = match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 0 => pid,
        _ => return false,
    };
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to another user
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Whether a process with `pid` exists.
#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    false
}
