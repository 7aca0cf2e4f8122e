use std::time::Duration;

use weedctl_types::SweepPattern;

use crate::{
    error::Result,
    process_manager::types::{CommandSpec, Pid, Spawned, Swept},
};

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new detached process.
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned>;
    /// Check whether a process still exists without disturbing it.
    fn is_alive(&mut self, pid: Pid) -> bool;
    /// Command line of a live process, when it can be read.
    fn cmdline(&mut self, pid: Pid) -> Option<Vec<String>>;
    /// Gracefully shutdown a process.
    async fn shutdown(&mut self, pid: Pid) -> Result<()>;
    /// Wait up to `d` for a process to exit. Returns `true` once it is gone.
    async fn wait(&mut self, pid: Pid, d: Duration) -> Result<bool>;
    /// Forcefully kill a process.
    async fn kill(&mut self, pid: Pid) -> Result<()>;
    /// Kill every process matching one of `patterns`, carrying on past failures.
    async fn sweep(&mut self, patterns: &[SweepPattern]) -> Swept;
}
