use tokio::{
    net::TcpStream,
    time::{sleep_until, timeout, timeout_at, Instant},
};
use weedctl_types::{ProbeKind, ProbeSpec};

use crate::error::{Error, Result};

/// One readiness attempt against a service endpoint.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Returns `true` if the endpoint answered. Implementations should respect
    /// `spec.attempt_timeout`; `wait_ready` cuts them off at the poll interval
    /// regardless.
    async fn check(&self, spec: &ProbeSpec) -> bool;
}

/// Probes over the network: a TCP connect for TCP and gRPC endpoints, any HTTP
/// response at all for HTTP endpoints.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    client: reqwest::Client,
}

impl NetworkProbe {
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|err| Error::Internal(format!("cannot build http client: {err}")))?;
        Ok(Self { client })
    }

    async fn tcp(spec: &ProbeSpec) -> bool {
        let connect = TcpStream::connect((spec.host.as_str(), spec.port));
        matches!(timeout(spec.attempt_timeout, connect).await, Ok(Ok(_)))
    }

    async fn http(&self, spec: &ProbeSpec) -> bool {
        let deadline = Instant::now() + spec.attempt_timeout;
        let primary = spec.path.as_deref().unwrap_or("/");
        let paths = std::iter::once(primary).chain(spec.fallback_path.as_deref());

        for path in paths {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let url = format!("http://{}{path}", spec.address());
            match self.client.get(&url).timeout(remaining).send().await {
                Ok(response) => {
                    tracing::trace!("{url} answered {}", response.status());
                    return true;
                }
                Err(err) => tracing::trace!("{url}: {err}"),
            }
        }
        false
    }
}

#[async_trait::async_trait]
impl Probe for NetworkProbe {
    async fn check(&self, spec: &ProbeSpec) -> bool {
        match spec.kind {
            ProbeKind::Tcp | ProbeKind::GrpcAsTcp => Self::tcp(spec).await,
            ProbeKind::Http => self.http(spec).await,
        }
    }
}

/// Poll until the endpoint answers or `max_attempts` polls are used up.
///
/// Each poll owns a slot of one `interval`: the attempt is cut off at the end
/// of its slot and the next one starts when the slot ends, so the whole call
/// never takes longer than `interval * max_attempts`. Returns the number of
/// polls it took, or `None` once they are exhausted.
pub async fn wait_ready<P: Probe + ?Sized>(probe: &P, spec: &ProbeSpec) -> Option<u32> {
    for attempt in 1..=spec.max_attempts {
        let slot_end = Instant::now() + spec.interval;

        if timeout_at(slot_end, probe.check(spec)).await.unwrap_or(false) {
            return Some(attempt);
        }
        tracing::trace!(
            "{} not ready (attempt {attempt}/{})",
            spec.address(),
            spec.max_attempts
        );

        if attempt < spec.max_attempts {
            sleep_until(slot_end).await;
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{mock::MockProbe, *};

    fn spec(port: u16, max_attempts: u32) -> ProbeSpec {
        ProbeSpec {
            kind: ProbeKind::Tcp,
            host: "127.0.0.1".to_owned(),
            port,
            path: None,
            fallback_path: None,
            interval: Duration::from_millis(20),
            attempt_timeout: Duration::from_millis(20),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn returns_the_poll_that_succeeded() {
        let probe = MockProbe::default();
        probe.ready_after(9333, 3);

        assert_eq!(wait_ready(&probe, &spec(9333, 5)).await, Some(3));
        assert_eq!(probe.polls(9333), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let probe = MockProbe::default();

        assert_eq!(wait_ready(&probe, &spec(8080, 4)).await, None);
        assert_eq!(probe.polls(8080), 4);
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl Probe for Hanging {
        async fn check(&self, _spec: &ProbeSpec) -> bool {
            std::future::pending::<()>().await;
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_checks_are_cut_at_the_interval() {
        let spec = spec(1, 5);
        let started = Instant::now();

        assert_eq!(wait_ready(&Hanging, &spec).await, None);
        assert!(started.elapsed() <= spec.budget());
    }
}
