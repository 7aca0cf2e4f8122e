use std::process::ExitCode;

use anyhow::Result;
use weedctl_config::ClusterConfig;

use super::{controller, teardown};
use crate::{exit, report::Printer, signal::Shutdown};

/// Replace the recorded cluster with a fresh one and leave it running in the
/// background; `weedctl stop` tears it down later.
pub async fn restart(config: &ClusterConfig) -> Result<ExitCode> {
    let config = config.with_resolved_binary()?;
    let mut shutdown = Shutdown::install()?;
    let mut controller = controller(&config)?;
    let mut table = controller.load_table()?;

    let restarted = tokio::select! {
        result = controller.restart(&mut table) => Some(result),
        signal = shutdown.recv() => {
            tracing::warn!("Received {signal} during restart, tearing down");
            None
        }
    };

    let Some(result) = restarted else {
        let report = teardown(controller.stop_all(&mut table), &mut shutdown).await;
        Printer::stdout().stopped(&report)?;
        return Ok(ExitCode::from(exit::INTERRUPTED));
    };

    let report = result?;
    let mut printer = Printer::stdout();
    printer.stopped(&report)?;
    printer.started(controller.registry())?;
    Ok(ExitCode::SUCCESS)
}
