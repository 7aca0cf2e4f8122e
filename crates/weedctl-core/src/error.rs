use std::{io, path::PathBuf};

use weedctl_config::ConfigError;
use weedctl_types::ServiceName;

use crate::process_manager::Pid;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot prepare directory {}: {source}", .path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{service}: port {port} on {host} is already in use")]
    PortInUse {
        service: ServiceName,
        host: String,
        port: u16,
    },

    #[error("{service}: port {port} on {host} was not released after stop")]
    PortStillBusy {
        service: ServiceName,
        host: String,
        port: u16,
    },

    #[error("{service}: failed to launch: {source}")]
    Launch {
        service: String,
        #[source]
        source: io::Error,
    },

    #[error("{service}: not ready at {address} after {attempts} attempts")]
    ReadinessTimeout {
        service: ServiceName,
        address: String,
        attempts: u32,
        log_tail: Vec<String>,
    },

    #[error("pid file {}: {source}", .path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot send {signal} to {pid}: {source}")]
    Signal {
        pid: Pid,
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Problems met while tearing services down. They are reported, never fatal.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum Warning {
    #[error("{service} (pid {pid}) ignored graceful termination and was killed")]
    ForceKilled { service: ServiceName, pid: Pid },

    #[error("{service} (pid {pid}) is stale: no longer running {service}, treating it as stopped")]
    StaleProcess { service: ServiceName, pid: Pid },

    #[error("{service} has no PID file; treating it as stopped")]
    NotRecorded { service: ServiceName },

    #[error("{service} (pid {pid}): {message}")]
    SignalFailed {
        service: ServiceName,
        pid: Pid,
        message: String,
    },

    #[error("removed unreadable pid file {}", .path.display())]
    MalformedPidFile { path: PathBuf },

    #[error("cannot remove {}: {message}", .path.display())]
    PidFileRemoval { path: PathBuf, message: String },

    #[error("leftover process {pid} could not be killed: {message}")]
    LeftoverSurvived { pid: Pid, message: String },
}
