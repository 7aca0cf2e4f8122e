use std::{path::PathBuf, time::SystemTime};

use weedctl_types::ServiceName;

use crate::process_manager::Pid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningProcess {
    pub service: ServiceName,
    pub pid: Pid,
    pub started_at: SystemTime,
    pub log_file: PathBuf,
    /// Launch argv. Empty when the PID file predates it.
    pub cmd: Vec<String>,
}

/// Launched services keyed by name, kept in startup order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessTable {
    entries: Vec<RunningProcess>,
}

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a launch. A previous entry for the same service is replaced and
    /// returned; the new one goes to the end of the startup order.
    pub fn insert(&mut self, process: RunningProcess) -> Option<RunningProcess> {
        let previous = self.remove(process.service);
        self.entries.push(process);
        previous
    }

    pub fn remove(&mut self, service: ServiceName) -> Option<RunningProcess> {
        let index = self.entries.iter().position(|p| p.service == service)?;
        Some(self.entries.remove(index))
    }

    #[must_use]
    pub fn get(&self, service: ServiceName) -> Option<&RunningProcess> {
        self.entries.iter().find(|p| p.service == service)
    }

    #[must_use]
    pub fn contains(&self, service: ServiceName) -> bool {
        self.get(service).is_some()
    }

    /// Entries in startup order.
    pub fn iter(&self) -> std::slice::Iter<'_, RunningProcess> {
        self.entries.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<ServiceName> {
        self.entries.iter().map(|p| p.service).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProcessTable {
    type Item = &'a RunningProcess;
    type IntoIter = std::slice::Iter<'a, RunningProcess>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
