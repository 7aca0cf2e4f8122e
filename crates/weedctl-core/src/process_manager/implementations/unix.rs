use std::{collections::HashMap, fs::File, io, process::Stdio, time::Duration};

use libc::{setsid, SIGKILL, SIGTERM};
use sysinfo::{ProcessRefreshKind, ProcessStatus, System, UpdateKind};
use tokio::{
    process::{Child, Command},
    time::{sleep, Instant},
};
use weedctl_types::SweepPattern;

use crate::{
    error::{Error, Result},
    process_manager::{
        base::ProcessManager,
        types::{CommandSpec, Pid, Spawned, Swept},
    },
};

const POLL: Duration = Duration::from_millis(50);
const REAP_AFTER_KILL: Duration = Duration::from_secs(1);

/// Plain refreshes leave `Process::cmd` empty.
fn with_cmd() -> ProcessRefreshKind {
    ProcessRefreshKind::new().with_cmd(UpdateKind::Always)
}

/// Unix-specific process manager.
///
/// Every process is started as the leader of a new session, so signals are
/// delivered to its whole process group. Processes spawned by this manager are
/// reaped through their `Child` handle; processes known only by PID (read back
/// from disk) are probed with signal 0.
#[derive(Debug)]
pub struct UnixProcessManager {
    children: HashMap<Pid, ChildRec>,
    system: System,
}

#[derive(Debug)]
struct ChildRec {
    child: Child,
    cmd: Vec<String>,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            children: HashMap::new(),
            system: System::new(),
        }
    }

    fn signal(&mut self, pid: Pid, signal: libc::c_int, name: &'static str) -> Result<()> {
        let raw = libc::pid_t::try_from(pid.0)
            .map_err(|_| Error::Internal(format!("pid {pid} does not fit pid_t")))?;

        #[allow(unsafe_code)]
        let rc = unsafe { libc::killpg(raw, signal) };
        if rc == 0 {
            return Ok(());
        }

        // Not a group leader: fall back to the process itself.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(raw, signal) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(Error::Signal {
            pid,
            signal: name,
            source: err,
        })
    }
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let launch = |source| Error::Launch {
            service: spec.name.clone(),
            source,
        };

        let Some((program, args)) = spec.cmd.split_first() else {
            return Err(launch(io::Error::other("empty command")));
        };

        let log = File::create(&spec.log).map_err(launch)?;
        let log_err = log.try_clone().map_err(launch)?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        let child = cmd.spawn().map_err(launch)?;
        let pid = child
            .id()
            .map(Pid)
            .ok_or_else(|| launch(io::Error::other("pid not available")))?;

        tracing::debug!("Spawned {} as pid {pid}", spec.name);
        self.children.insert(
            pid,
            ChildRec {
                child,
                cmd: spec.cmd.clone(),
            },
        );

        Ok(Spawned { pid })
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        if let Some(rec) = self.children.get_mut(&pid) {
            match rec.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::trace!("pid {pid} exited with {status}");
                    self.children.remove(&pid);
                    return false;
                }
                Ok(None) => return true,
                Err(err) => tracing::debug!("try_wait on {pid} failed: {err}"),
            }
        }

        let Ok(raw) = libc::pid_t::try_from(pid.0) else {
            return false;
        };
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(raw, 0) };
        if rc != 0 && io::Error::last_os_error().raw_os_error() != Some(libc::EPERM) {
            return false;
        }

        // Someone else's child that exited but was not reaped yet.
        let pid = sysinfo::Pid::from_u32(pid.0);
        if self.system.refresh_process(pid) {
            if let Some(process) = self.system.process(pid) {
                return process.status() != ProcessStatus::Zombie;
            }
        }
        true
    }

    fn cmdline(&mut self, pid: Pid) -> Option<Vec<String>> {
        // Our own children may not have reached exec yet.
        if let Some(rec) = self.children.get(&pid) {
            return Some(rec.cmd.clone());
        }
        let pid = sysinfo::Pid::from_u32(pid.0);
        if !self.system.refresh_process_specifics(pid, with_cmd()) {
            return None;
        }
        let cmd = self.system.process(pid)?.cmd();
        if cmd.is_empty() {
            None
        } else {
            Some(cmd.to_vec())
        }
    }

    async fn shutdown(&mut self, pid: Pid) -> Result<()> {
        self.signal(pid, SIGTERM, "SIGTERM")
    }

    async fn wait(&mut self, pid: Pid, d: Duration) -> Result<bool> {
        let deadline = Instant::now() + d;
        loop {
            if !self.is_alive(pid) {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(POLL.min(deadline - now)).await;
        }
    }

    async fn kill(&mut self, pid: Pid) -> Result<()> {
        self.signal(pid, SIGKILL, "SIGKILL")?;
        self.wait(pid, REAP_AFTER_KILL).await?;
        Ok(())
    }

    async fn sweep(&mut self, patterns: &[SweepPattern]) -> Swept {
        self.system.refresh_processes_specifics(with_cmd());
        let own = std::process::id();

        let leftovers: Vec<Pid> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own)
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter(|(_, process)| {
                let cmd = process.cmd();
                patterns.iter().any(|pattern| pattern.matches(cmd))
            })
            .map(|(pid, _)| Pid(pid.as_u32()))
            .collect();

        let mut swept = Swept::default();
        for pid in leftovers {
            tracing::warn!("Killing leftover process {pid}");
            match self.kill(pid).await {
                Ok(()) => swept.killed.push(pid),
                Err(err) => {
                    tracing::debug!("Leftover {pid} survived: {err}");
                    swept.failed.push((pid, err));
                }
            }
        }
        swept
    }
}
