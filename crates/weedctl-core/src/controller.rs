use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use weedctl_config::ClusterConfig;
use weedctl_types::{ServiceName, ServiceSpec, SweepPattern};

use crate::{
    error::{Error, Result, Warning},
    logs, pidfile, ports,
    probe::{self, Probe},
    process_manager::{CommandSpec, ProcessManager},
    table::{ProcessTable, RunningProcess},
    types::{transition, ServiceState, ServiceStatus, StatusReport, StopReport},
};

/// Lines of a failed service's log shown to the operator.
const LOG_TAIL_LINES: usize = 20;

/// Drives a cluster through start, status, stop and restart.
///
/// The controller is the only writer of the process table it is handed. Startup
/// walks the registry in dependency order and waits for each service to become
/// reachable before launching the next; teardown walks the table backwards.
#[derive(Debug)]
pub struct Controller<P: ProcessManager, R: Probe> {
    registry: Vec<ServiceSpec>,
    state_dir: PathBuf,
    grace_period: Duration,
    process_manager: P,
    probe: R,
}

impl<P: ProcessManager, R: Probe> Controller<P, R> {
    pub fn new(config: &ClusterConfig, process_manager: P, probe: R) -> Self {
        Self::from_parts(
            config.service_specs(),
            config.data_dir.clone(),
            config.stop_timeout,
            process_manager,
            probe,
        )
    }

    pub fn from_parts(
        registry: Vec<ServiceSpec>,
        state_dir: PathBuf,
        grace_period: Duration,
        process_manager: P,
        probe: R,
    ) -> Self {
        Self {
            registry,
            state_dir,
            grace_period,
            process_manager,
            probe,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &[ServiceSpec] {
        &self.registry
    }

    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn spec(&self, service: ServiceName) -> Option<&ServiceSpec> {
        self.registry.iter().find(|s| s.name == service)
    }

    /// Check that no enabled service's port is taken before launching anything.
    ///
    /// # Errors
    /// Returns `Error::PortInUse` for the first busy port.
    pub async fn preflight(&self) -> Result<()> {
        ports::ensure_free(&self.registry).await
    }

    /// Reconstruct the process table persisted by an earlier invocation.
    ///
    /// # Errors
    /// Returns an error if the state directory cannot be read.
    pub fn load_table(&self) -> Result<ProcessTable> {
        pidfile::load(&self.state_dir)
    }

    /// Launch every enabled service in dependency order, filling `table` as
    /// processes are spawned so that an interrupted start can still be torn
    /// down by the caller.
    ///
    /// On any failure everything already launched is stopped again before the
    /// error is returned, leaving `table` empty.
    ///
    /// # Errors
    /// Returns the first data directory, launch, PID file or readiness error.
    pub async fn start_all(&mut self, table: &mut ProcessTable) -> Result<()> {
        if let Err(err) = self.launch_all(table).await {
            tracing::error!("Startup failed: {err}");
            let report = self.stop_all(table).await;
            tracing::info!(
                "Rolled back {} service(s) after failed startup",
                report.stopped.len()
            );
            return Err(err);
        }
        Ok(())
    }

    async fn launch_all(&mut self, table: &mut ProcessTable) -> Result<()> {
        fs::create_dir_all(&self.state_dir).map_err(|source| Error::DataDir {
            path: self.state_dir.clone(),
            source,
        })?;

        let enabled: Vec<ServiceSpec> = self
            .registry
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();

        for spec in &enabled {
            self.launch(spec, table).await?;
        }
        Ok(())
    }

    async fn launch(&mut self, spec: &ServiceSpec, table: &mut ProcessTable) -> Result<()> {
        if let Some(running) = table.get(spec.name).cloned() {
            if self.owns(&running) {
                tracing::info!("{} is already running as pid {}", spec.name, running.pid);
                return Ok(());
            }
        }

        transition(spec.name, ServiceState::Starting);

        fs::create_dir_all(&spec.data_dir).map_err(|source| Error::DataDir {
            path: spec.data_dir.clone(),
            source,
        })?;

        let spawned = self
            .process_manager
            .spawn(CommandSpec {
                name: spec.name.to_string(),
                cmd: spec.cmd(),
                cwd: Some(spec.data_dir.clone()),
                env: vec![],
                log: spec.log_file.clone(),
            })
            .await?;

        let process = RunningProcess {
            service: spec.name,
            pid: spawned.pid,
            started_at: SystemTime::now(),
            log_file: spec.log_file.clone(),
            cmd: spec.cmd(),
        };
        table.insert(process.clone());
        pidfile::write(&self.state_dir, &process)?;

        tracing::info!(
            "{} started as pid {}, waiting for {} (up to {:?})",
            spec.name,
            spawned.pid,
            spec.probe.address(),
            spec.probe.budget()
        );

        if let Some(attempts) = probe::wait_ready(&self.probe, &spec.probe).await {
            tracing::debug!("{} answered after {attempts} poll(s)", spec.name);
            transition(spec.name, ServiceState::Ready);
            return Ok(());
        }

        transition(spec.name, ServiceState::Failed);
        let log_tail = logs::tail(&spec.log_file, LOG_TAIL_LINES);
        tracing::error!(
            "{} did not become reachable at {}; last lines of {}:",
            spec.name,
            spec.probe.address(),
            spec.log_file.display()
        );
        for line in &log_tail {
            tracing::error!("  {} | {line}", spec.name);
        }

        Err(Error::ReadinessTimeout {
            service: spec.name,
            address: spec.probe.address(),
            attempts: spec.probe.max_attempts,
            log_tail,
        })
    }

    /// Stop everything in `table`, newest first, then kill leftovers matching
    /// any known service. Safe on an empty or partially filled table, and safe
    /// to call repeatedly.
    pub async fn stop_all(&mut self, table: &mut ProcessTable) -> StopReport {
        let mut report = StopReport::default();

        // Recorded launches may have used other ports than the registry has now.
        let mut patterns: Vec<SweepPattern> = table
            .iter()
            .filter_map(|p| SweepPattern::from_launch(p.service.subcommand(), &p.cmd))
            .collect();
        patterns.extend(self.registry.iter().map(ServiceSpec::sweep_pattern));

        let order: Vec<ServiceName> = table.names().into_iter().rev().collect();
        for service in order {
            let Some(process) = table.get(service).cloned() else {
                continue;
            };

            self.stop_one(&process, &mut report).await;
            table.remove(service);

            if let Err(err) = pidfile::remove(&self.state_dir, service) {
                let warning = Warning::PidFileRemoval {
                    path: pidfile::pid_path(&self.state_dir, service),
                    message: err.to_string(),
                };
                tracing::warn!("{warning}");
                report.warnings.push(warning);
            }
        }

        let swept = self.process_manager.sweep(&patterns).await;
        if !swept.killed.is_empty() {
            tracing::warn!(
                "Killed {} untracked leftover process(es)",
                swept.killed.len()
            );
        }
        report.swept = swept.killed;
        for (pid, err) in swept.failed {
            let warning = Warning::LeftoverSurvived {
                pid,
                message: err.to_string(),
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }

        report
    }

    /// `stop_all` for a table reloaded from disk. Enabled services without a
    /// PID file are reported, and PID files that could not be loaded are
    /// removed.
    pub async fn stop_recorded(&mut self, table: &mut ProcessTable) -> StopReport {
        let mut warnings = Vec::new();
        for spec in &self.registry {
            let service = spec.name;
            if table.contains(service) {
                continue;
            }
            let path = pidfile::pid_path(&self.state_dir, service);
            let warning = match pidfile::remove(&self.state_dir, service) {
                Ok(true) => Warning::MalformedPidFile { path },
                Ok(false) if spec.enabled => Warning::NotRecorded { service },
                Ok(false) => continue,
                Err(err) => Warning::PidFileRemoval {
                    path,
                    message: err.to_string(),
                },
            };
            tracing::warn!("{warning}");
            warnings.push(warning);
        }

        let mut report = self.stop_all(table).await;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        report
    }

    async fn stop_one(&mut self, process: &RunningProcess, report: &mut StopReport) {
        let service = process.service;
        let pid = process.pid;

        if !self.owns(process) {
            let warning = Warning::StaleProcess { service, pid };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
            return;
        }

        transition(service, ServiceState::Stopping);

        if let Err(err) = self.process_manager.shutdown(pid).await {
            let warning = Warning::SignalFailed {
                service,
                pid,
                message: err.to_string(),
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }

        let exited = match self.process_manager.wait(pid, self.grace_period).await {
            Ok(exited) => exited,
            Err(err) => {
                tracing::debug!("Waiting for {service} failed: {err}");
                false
            }
        };

        if !exited {
            let warning = Warning::ForceKilled { service, pid };
            tracing::warn!("{warning}");
            report.warnings.push(warning);

            if let Err(err) = self.process_manager.kill(pid).await {
                let warning = Warning::SignalFailed {
                    service,
                    pid,
                    message: err.to_string(),
                };
                tracing::warn!("{warning}");
                report.warnings.push(warning);
                return;
            }
        }

        transition(service, ServiceState::Stopped);
        report.stopped.push(service);
    }

    /// Whether `process` is alive and still runs the service it was recorded
    /// for. A PID taken over by an unrelated program counts as gone, and so
    /// does one whose command line cannot be read.
    fn owns(&mut self, process: &RunningProcess) -> bool {
        if !self.process_manager.is_alive(process.pid) {
            return false;
        }
        let Some(pattern) = self.identity(process) else {
            return false;
        };
        let Some(cmd) = self.process_manager.cmdline(process.pid) else {
            tracing::debug!(
                "Cannot read the command line of pid {}; not touching it",
                process.pid
            );
            return false;
        };
        if pattern.matches(cmd.as_slice()) {
            return true;
        }
        tracing::debug!(
            "pid {} no longer runs {} ({})",
            process.pid,
            process.service,
            cmd.join(" ")
        );
        false
    }

    /// What a recorded process must look like to still be `process.service`.
    /// PID files without a launch argv only pin the program and subcommand.
    fn identity(&self, process: &RunningProcess) -> Option<SweepPattern> {
        let subcommand = process.service.subcommand();
        if let Some(pattern) = SweepPattern::from_launch(subcommand, &process.cmd) {
            return Some(pattern);
        }
        let SweepPattern { program, .. } = self.spec(process.service)?.sweep_pattern();
        Some(SweepPattern {
            program,
            args: vec![subcommand.to_owned()],
        })
    }

    /// Liveness of every tracked service. Does not touch the processes.
    pub fn status(&mut self, table: &ProcessTable) -> StatusReport {
        let mut services = Vec::with_capacity(table.len());
        for process in table {
            services.push(ServiceStatus {
                service: process.service,
                pid: process.pid,
                alive: self.owns(process),
                address: self.spec(process.service).map(|s| s.probe.address()),
                started_at: process.started_at,
                log_file: process.log_file.clone(),
            });
        }
        StatusReport { services }
    }

    /// Report services found dead since the last call. Each crash is reported
    /// once; crashed services are not restarted.
    pub fn detect_crashes(
        &mut self,
        table: &ProcessTable,
        reported: &mut HashSet<ServiceName>,
    ) -> Vec<ServiceName> {
        let mut crashed = Vec::new();
        for process in table {
            if reported.contains(&process.service) || self.owns(process) {
                continue;
            }
            transition(process.service, ServiceState::Crashed);
            reported.insert(process.service);
            crashed.push(process.service);
        }
        crashed
    }

    /// Stop everything, wait until the old processes have released their
    /// ports, then start afresh into the same (now empty) table.
    ///
    /// # Errors
    /// Returns `Error::PortStillBusy` if an old port is never released, or any
    /// error from `start_all`.
    pub async fn restart(&mut self, table: &mut ProcessTable) -> Result<StopReport> {
        let report = self.stop_all(table).await;
        ports::wait_released(&self.registry, self.grace_period).await?;
        self.start_all(table).await?;
        Ok(report)
    }
}
