use std::process::ExitCode;

use anyhow::Result;
use weedctl_config::ClusterConfig;

use super::{controller, teardown};
use crate::{report::Printer, signal::Shutdown};

pub async fn stop(config: &ClusterConfig) -> Result<ExitCode> {
    let mut shutdown = Shutdown::install()?;
    let mut controller = controller(config)?;
    let mut table = controller.load_table()?;

    let report = teardown(controller.stop_recorded(&mut table), &mut shutdown).await;
    Printer::stdout().stopped(&report)?;
    Ok(ExitCode::SUCCESS)
}
