use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use weedctl_types::SweepPattern;

use crate::{
    error::{Error, Result},
    process_manager::{CommandSpec, Pid, ProcessManager, Spawned, Swept},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Spawn(String),
    Shutdown(Pid),
    Kill(Pid),
    Sweep,
}

#[derive(Debug, Default)]
struct MockState {
    next_pid: u32,
    alive: HashMap<Pid, Vec<String>>,
    stubborn: HashSet<String>,
    failing: HashSet<String>,
    unkillable: HashSet<Pid>,
    opaque: HashSet<Pid>,
    events: Vec<MockEvent>,
}

/// In-memory process manager. Clones share state, so a test can keep a handle
/// after moving one into a controller.
#[derive(Debug, Clone, Default)]
pub struct MockProcessManager {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessManager {
    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Processes named `name` ignore graceful termination.
    pub fn stubborn(&self, name: &str) {
        self.with_state(|s| s.stubborn.insert(name.to_owned()));
    }

    /// Spawning `name` fails.
    pub fn failing(&self, name: &str) {
        self.with_state(|s| s.failing.insert(name.to_owned()));
    }

    /// Killing `pid` fails, e.g. a process owned by another user.
    pub fn unkillable(&self, pid: Pid) {
        self.with_state(|s| s.unkillable.insert(pid));
    }

    /// The command line of `pid` cannot be read.
    pub fn opaque(&self, pid: Pid) {
        self.with_state(|s| s.opaque.insert(pid));
    }

    /// Pretend a process died on its own.
    pub fn crash(&self, pid: Pid) {
        self.with_state(|s| s.alive.remove(&pid));
    }

    /// Register a process this manager never spawned.
    pub fn adopt(&self, pid: Pid, cmd: &[&str]) {
        self.with_state(|s| {
            s.alive
                .insert(pid, cmd.iter().map(|c| (*c).to_owned()).collect())
        });
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.with_state(|s| s.events.clone())
    }

    pub fn alive_count(&self) -> usize {
        self.with_state(|s| s.alive.len())
    }
}

#[async_trait]
impl ProcessManager for MockProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        self.with_state(|s| {
            s.events.push(MockEvent::Spawn(spec.name.clone()));
            if s.failing.contains(&spec.name) {
                return Err(Error::Launch {
                    service: spec.name.clone(),
                    source: std::io::Error::other("mock spawn failure"),
                });
            }
            s.next_pid += 1;
            let pid = Pid(1000 + s.next_pid);
            let mut cmd = spec.cmd.clone();
            // Mark stubborn processes so shutdown can find them by pid.
            if s.stubborn.contains(&spec.name) {
                cmd.push("#stubborn".to_owned());
            }
            s.alive.insert(pid, cmd);
            Ok(Spawned { pid })
        })
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        self.with_state(|s| s.alive.contains_key(&pid))
    }

    fn cmdline(&mut self, pid: Pid) -> Option<Vec<String>> {
        self.with_state(|s| {
            if s.opaque.contains(&pid) {
                return None;
            }
            s.alive.get(&pid).cloned()
        })
    }

    async fn shutdown(&mut self, pid: Pid) -> Result<()> {
        self.with_state(|s| {
            s.events.push(MockEvent::Shutdown(pid));
            let stubborn = s
                .alive
                .get(&pid)
                .is_some_and(|cmd| cmd.last().is_some_and(|c| c == "#stubborn"));
            if !stubborn {
                s.alive.remove(&pid);
            }
        });
        Ok(())
    }

    async fn wait(&mut self, pid: Pid, _d: Duration) -> Result<bool> {
        Ok(!self.is_alive(pid))
    }

    async fn kill(&mut self, pid: Pid) -> Result<()> {
        self.with_state(|s| {
            s.events.push(MockEvent::Kill(pid));
            if s.unkillable.contains(&pid) {
                return Err(Error::Signal {
                    pid,
                    signal: "SIGKILL",
                    source: std::io::Error::from_raw_os_error(libc::EPERM),
                });
            }
            s.alive.remove(&pid);
            Ok(())
        })
    }

    async fn sweep(&mut self, patterns: &[SweepPattern]) -> Swept {
        let mut leftovers: Vec<Pid> = self.with_state(|s| {
            s.events.push(MockEvent::Sweep);
            s.alive
                .iter()
                .filter(|(_, cmd)| patterns.iter().any(|p| p.matches(cmd.as_slice())))
                .map(|(pid, _)| *pid)
                .collect()
        });
        leftovers.sort();

        let mut swept = Swept::default();
        for pid in leftovers {
            match self.kill(pid).await {
                Ok(()) => swept.killed.push(pid),
                Err(err) => swept.failed.push((pid, err)),
            }
        }
        swept
    }
}
