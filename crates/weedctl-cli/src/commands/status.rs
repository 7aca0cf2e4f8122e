use std::process::ExitCode;

use anyhow::Result;
use weedctl_config::ClusterConfig;

use super::controller;
use crate::{exit, report::Printer};

pub fn status(config: &ClusterConfig) -> Result<ExitCode> {
    let mut controller = controller(config)?;
    let table = controller.load_table()?;
    let report = controller.status(&table);

    Printer::stdout().status(&report, controller.state_dir())?;

    Ok(if report.total() == 0 {
        ExitCode::from(exit::NOTHING_TRACKED)
    } else if report.all_running() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(exit::SOME_DOWN)
    })
}
