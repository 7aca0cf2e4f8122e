mod restart;
mod start;
mod status;
mod stop;

pub use restart::restart;
pub use start::start;
pub use status::status;
pub use stop::stop;

use std::future::Future;

use anyhow::Result;
use weedctl_config::ClusterConfig;
use weedctl_core::{Controller, NetworkProbe, StopReport, UnixProcessManager};

use crate::signal::Shutdown;

type ClusterController = Controller<UnixProcessManager, NetworkProbe>;

fn controller(config: &ClusterConfig) -> Result<ClusterController> {
    Ok(Controller::new(
        config,
        UnixProcessManager::new(),
        NetworkProbe::new()?,
    ))
}

/// Drive a stop to completion. Further signals are logged and ignored so the
/// teardown happens exactly once.
async fn teardown(stop: impl Future<Output = StopReport>, shutdown: &mut Shutdown) -> StopReport {
    tokio::pin!(stop);

    loop {
        tokio::select! {
            report = &mut stop => return report,
            signal = shutdown.recv() => {
                tracing::warn!("Received {signal} while stopping; teardown continues");
            }
        }
    }
}
