//! Cross-process lock files guarding requirement writes.
//!
//! A lock file records the process that created it. A lock whose holder has
//! exited on this host is stale and is cleared by the next writer.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long a lock file without readable holder metadata is honoured.
///
/// The holder writes its metadata right after creating the file, so an
/// older empty or garbled file was left by a process that died in between.
const UNREADABLE_GRACE: Duration = Duration::from_secs(60);

/// The process holding a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Holder {
    pub pid: u32,
    pub host: String,
    pub acquired_at: DateTime<Utc>,
}

impl Holder {
    pub(crate) fn current() -> Self {
        Self {
            pid: std::process::id(),
            host: host_name(),
            acquired_at: Utc::now(),
        }
    }

    /// Whether the holder has exited. Holders on other hosts cannot be
    /// checked and are assumed alive.
    fn is_gone(&self) -> bool {
        self.host == host_name() && !is_running(self.pid)
    }
}

pub(crate) fn host_name() -> String {
    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(unix)]
fn is_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks that the process exists.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM means it exists but belongs to someone else.
    io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn is_running(_pid: u32) -> bool {
    true
}

/// An exclusively created lock file, removed on drop.
#[derive(Debug)]
pub(crate) struct LockFile(PathBuf);

impl LockFile {
    /// Take the lock at `path`, clearing it first if it is stale.
    ///
    /// Returns `None` while a live process holds the lock.
    pub(crate) fn acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(lock) = Self::create(path)? {
            return Ok(Some(lock));
        }
        if !is_stale(path)? {
            return Ok(None);
        }

        tracing::warn!("removing stale lock file {}", path.display());
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        Self::create(path)
    }

    fn create(path: &Path) -> io::Result<Option<Self>> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e),
        };
        // Owned from here, so a failed write still removes the file.
        let lock = Self(path.to_path_buf());

        let holder = serde_json::to_vec(&Holder::current()).map_err(io::Error::other)?;
        file.write_all(&holder)?;
        file.sync_all()?;
        Ok(Some(lock))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.0) {
            tracing::warn!("failed to remove lock file {}: {e}", self.0.display());
        }
    }
}

fn is_stale(path: &Path) -> io::Result<bool> {
    let gone = |e: &io::Error| e.kind() == io::ErrorKind::NotFound;

    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if gone(&e) => return Ok(true),
        Err(e) => return Err(e),
    };
    if let Ok(holder) = serde_json::from_slice::<Holder>(&content) {
        return Ok(holder.is_gone());
    }

    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if gone(&e) => return Ok(true),
        Err(e) => return Err(e),
    };
    Ok(modified.elapsed().unwrap_or_default() > UNREADABLE_GRACE)
}
