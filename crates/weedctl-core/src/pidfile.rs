//! On-disk projection of the process table: one `<service>.pid` per launched
//! service, next to its `<service>.log`.
//!
//! The first line holds the PID, each following line one element of the
//! launch argv. A file with the PID alone is still accepted.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use weedctl_types::ServiceName;

use crate::{
    error::{Error, Result},
    process_manager::Pid,
    table::{ProcessTable, RunningProcess},
};

#[must_use]
pub fn pid_path(dir: &Path, service: ServiceName) -> PathBuf {
    dir.join(format!("{service}.pid"))
}

#[must_use]
pub fn log_path(dir: &Path, service: ServiceName) -> PathBuf {
    dir.join(format!("{service}.log"))
}

/// Persist one entry.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write(dir: &Path, process: &RunningProcess) -> Result<()> {
    let path = pid_path(dir, process.service);
    let mut text = format!("{}\n", process.pid);
    for arg in &process.cmd {
        text.push_str(arg);
        text.push('\n');
    }
    fs::write(&path, text).map_err(|source| Error::PidFile { path, source })
}

/// Remove a service's PID file. Returns `false` if there was none.
///
/// # Errors
/// Returns an error if an existing file cannot be removed.
pub fn remove(dir: &Path, service: ServiceName) -> io::Result<bool> {
    match fs::remove_file(pid_path(dir, service)) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Rebuild a process table from the PID files in `dir`, in startup order.
/// Unreadable files are skipped with a warning; liveness is not checked here.
///
/// # Errors
/// Returns an error if `dir` exists but cannot be read.
pub fn load(dir: &Path) -> Result<ProcessTable> {
    let mut table = ProcessTable::new();
    if !dir.exists() {
        return Ok(table);
    }

    for service in ServiceName::ALL {
        let path = pid_path(dir, service);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => return Err(Error::PidFile { path, source }),
        };

        let mut lines = text.lines();
        let Some(Ok(pid)) = lines.next().map(|line| line.trim().parse::<u32>()) else {
            tracing::warn!("Ignoring malformed pid file {}", path.display());
            continue;
        };
        let cmd = lines.filter(|l| !l.is_empty()).map(str::to_owned).collect();

        let started_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        table.insert(RunningProcess {
            service,
            pid: Pid(pid),
            started_at,
            log_file: log_path(dir, service),
            cmd,
        });
    }

    Ok(table)
}
