use std::{fmt, path::PathBuf, time::SystemTime};

use weedctl_types::ServiceName;

use crate::{error::Warning, process_manager::Pid};

/// Lifecycle of a single service as seen by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServiceState {
    NotStarted,
    Starting,
    Ready,
    Stopping,
    Stopped,
    /// The readiness probe never succeeded. Terminal.
    Failed,
    /// Found dead after having been ready. Never restarted.
    Crashed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceState::NotStarted => "NOT_STARTED",
            ServiceState::Starting => "STARTING",
            ServiceState::Ready => "READY",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Stopped => "STOPPED",
            ServiceState::Failed => "FAILED",
            ServiceState::Crashed => "CRASHED",
        })
    }
}

pub(crate) fn transition(service: ServiceName, state: ServiceState) {
    match state {
        ServiceState::Failed => tracing::error!(%service, %state, "{service} -> {state}"),
        ServiceState::Crashed => tracing::warn!(%service, %state, "{service} -> {state}"),
        _ => tracing::info!(%service, %state, "{service} -> {state}"),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service: ServiceName,
    pub pid: Pid,
    pub alive: bool,
    pub address: Option<String>,
    pub started_at: SystemTime,
    pub log_file: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub services: Vec<ServiceStatus>,
}

impl StatusReport {
    #[must_use]
    pub fn running(&self) -> usize {
        self.services.iter().filter(|s| s.alive).count()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn all_running(&self) -> bool {
        !self.services.is_empty() && self.running() == self.total()
    }
}

/// Outcome of a teardown. Teardown never fails, it only accumulates warnings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Services in the order they were stopped.
    pub stopped: Vec<ServiceName>,
    pub swept: Vec<Pid>,
    pub warnings: Vec<Warning>,
}
