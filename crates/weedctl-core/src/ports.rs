use std::time::Duration;

use tokio::{
    net::TcpListener,
    time::{sleep, Instant},
};
use weedctl_types::ServiceSpec;

use crate::error::{Error, Result};

const RETRY: Duration = Duration::from_millis(100);

/// Whether `host:port` can be bound right now.
pub async fn is_free(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).await.is_ok()
}

/// Fail if any port of an enabled service is already taken.
///
/// # Errors
/// Returns `Error::PortInUse` for the first busy port.
pub async fn ensure_free(specs: &[ServiceSpec]) -> Result<()> {
    for spec in specs.iter().filter(|s| s.enabled) {
        for &port in &spec.ports {
            if !is_free(&spec.probe.host, port).await {
                return Err(Error::PortInUse {
                    service: spec.name,
                    host: spec.probe.host.clone(),
                    port,
                });
            }
        }
    }
    Ok(())
}

/// Wait until every port of every enabled service can be bound again.
///
/// # Errors
/// Returns `Error::PortStillBusy` if a port is still held after `timeout`.
pub async fn wait_released(specs: &[ServiceSpec], timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    for spec in specs.iter().filter(|s| s.enabled) {
        for &port in &spec.ports {
            while !is_free(&spec.probe.host, port).await {
                if Instant::now() >= deadline {
                    return Err(Error::PortStillBusy {
                        service: spec.name,
                        host: spec.probe.host.clone(),
                        port,
                    });
                }
                sleep(RETRY).await;
            }
        }
    }
    Ok(())
}
