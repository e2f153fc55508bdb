//! PID file for daemon-style operation.
//!
//! `serve` writes its PID to `server.pid_file` and holds an `fs2` exclusive
//! lock on it for its lifetime, so a second instance pointed at the same
//! file refuses to start.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use fs2::FileExt;

/// Lock `path` and write the current PID into it. Keep the returned handle
/// alive for as long as the lock should be held.
pub fn write_pid_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("opening PID file {}", path.display()))?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "another raisechat instance is running (PID file {} is locked)",
            path.display()
        )
    })?;

    // Truncate only once the lock is ours, so a running instance's PID
    // survives a failed second start.
    file.set_len(0)?;
    let pid = std::process::id();
    (&file).write_all(format!("{pid}\n").as_bytes())?;
    (&file).flush()?;

    tracing::info!(path = %path.display(), pid, "PID file written");
    Ok(file)
}

/// Delete the PID file; the lock goes with the handle.
pub fn remove_pid_file(path: &Path, handle: File) {
    match fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
    drop(handle);
}
