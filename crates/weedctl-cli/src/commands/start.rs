use std::{collections::HashSet, process::ExitCode};

use anyhow::Result;
use tokio::time::{interval, MissedTickBehavior};
use weedctl_config::ClusterConfig;
use weedctl_core::ProcessTable;

use super::{controller, teardown};
use crate::{exit, report::Printer, signal::Shutdown};

/// How many poll intervals pass between two crash checks.
const MONITOR_FACTOR: u32 = 5;

pub async fn start(config: &ClusterConfig) -> Result<ExitCode> {
    let config = config.with_resolved_binary()?;
    let mut shutdown = Shutdown::install()?;
    let mut controller = controller(&config)?;

    controller.preflight().await?;

    let mut table = ProcessTable::new();
    let started = tokio::select! {
        result = controller.start_all(&mut table) => Some(result),
        signal = shutdown.recv() => {
            tracing::warn!("Received {signal} during startup, tearing down");
            None
        }
    };

    match started {
        Some(result) => result?,
        None => {
            let report = teardown(controller.stop_all(&mut table), &mut shutdown).await;
            Printer::stdout().stopped(&report)?;
            return Ok(ExitCode::from(exit::INTERRUPTED));
        }
    }

    Printer::stdout().started(controller.registry())?;
    tracing::info!("Cluster is up; press Ctrl+C to stop");

    let mut reported = HashSet::new();
    let mut monitor = interval(config.poll_interval * MONITOR_FACTOR);
    monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);
    monitor.tick().await;

    let signal = loop {
        tokio::select! {
            signal = shutdown.recv() => break signal,
            _ = monitor.tick() => {
                let crashed = controller.detect_crashes(&table, &mut reported);
                for process in crashed.iter().filter_map(|s| table.get(*s)) {
                    tracing::error!(
                        "{} exited unexpectedly; see {}",
                        process.service,
                        process.log_file.display()
                    );
                }
            }
        }
    };

    tracing::info!("Received {signal}, stopping the cluster");
    let report = teardown(controller.stop_all(&mut table), &mut shutdown).await;
    Printer::stdout().stopped(&report)?;
    Ok(ExitCode::SUCCESS)
}
