use std::{
    io::{self, Stdout, Write},
    path::Path,
    time::{Duration, SystemTime},
};

use weedctl_core::{StatusReport, StopReport};
use weedctl_types::ServiceSpec;

/// Human-facing output. Diagnostics go through `tracing` on stderr; this is
/// what the operator reads on stdout.
pub struct Printer<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Printer<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn status(&mut self, report: &StatusReport, state_dir: &Path) -> io::Result<()> {
        let now = SystemTime::now();
        for service in &report.services {
            let state = if service.alive { "running" } else { "down" };
            let uptime = if service.alive {
                uptime(now.duration_since(service.started_at).unwrap_or_default())
            } else {
                "-".to_owned()
            };
            writeln!(
                self.output,
                "{:<7} {:<8} pid {:<8} {:<22} up {:<10} {}",
                service.service.as_str(),
                state,
                service.pid,
                service.address.as_deref().unwrap_or("-"),
                uptime,
                service.log_file.display()
            )?;
        }

        if report.total() == 0 {
            writeln!(
                self.output,
                "0/0 services running (nothing recorded in {})",
                state_dir.display()
            )
        } else {
            writeln!(
                self.output,
                "{}/{} services running",
                report.running(),
                report.total()
            )
        }
    }

    pub fn started(&mut self, specs: &[ServiceSpec]) -> io::Result<()> {
        for spec in specs.iter().filter(|s| s.enabled) {
            writeln!(
                self.output,
                "{:<7} ready at {:<22} log {}",
                spec.name.as_str(),
                spec.probe.address(),
                spec.log_file.display()
            )?;
        }
        Ok(())
    }

    pub fn stopped(&mut self, report: &StopReport) -> io::Result<()> {
        let names: Vec<&str> = report.stopped.iter().map(|s| s.as_str()).collect();
        if names.is_empty() {
            writeln!(self.output, "Nothing was running")?;
        } else {
            writeln!(self.output, "Stopped {}", names.join(", "))?;
        }
        if !report.swept.is_empty() {
            writeln!(
                self.output,
                "Killed {} leftover process(es)",
                report.swept.len()
            )?;
        }
        Ok(())
    }
}

impl Printer {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

fn uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}
