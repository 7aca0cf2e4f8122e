use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

/// Logical services of a local cluster, in dependency order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ServiceName {
    Master,
    Volume,
    Filer,
    S3,
    Mq,
}

impl ServiceName {
    /// Every service, master first. Startup walks this order, shutdown walks it backwards.
    pub const ALL: [ServiceName; 5] = [
        ServiceName::Master,
        ServiceName::Volume,
        ServiceName::Filer,
        ServiceName::S3,
        ServiceName::Mq,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::Master => "master",
            ServiceName::Volume => "volume",
            ServiceName::Filer => "filer",
            ServiceName::S3 => "s3",
            ServiceName::Mq => "mq",
        }
    }

    /// Subcommand of the storage binary that runs this service.
    #[must_use]
    pub fn subcommand(self) -> &'static str {
        match self {
            ServiceName::Mq => "mq.broker",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownService(pub String);

impl fmt::Display for UnknownService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown service `{}`", self.0)
    }
}

impl std::error::Error for UnknownService {}

impl FromStr for ServiceName {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownService(s.to_owned()))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeKind {
    Tcp,
    Http,
    /// gRPC endpoints are only checked for an accepting socket.
    GrpcAsTcp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeSpec {
    pub kind: ProbeKind,
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
    pub fallback_path: Option<String>,
    pub interval: Duration,
    /// Upper bound for a single connection or request.
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
}

impl ProbeSpec {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Hard upper bound on how long waiting for readiness may take.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Arguments that identify a running service process, used to find leftovers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPattern {
    /// File name of the program, e.g. `weed`.
    pub program: String,
    /// Arguments that must all be present verbatim.
    pub args: Vec<String>,
}

impl SweepPattern {
    /// Identity of a process launched as `cmd`: its program, `subcommand` and
    /// whatever `-port=` argument it was given. `None` for an empty command.
    #[must_use]
    pub fn from_launch(subcommand: &str, cmd: &[String]) -> Option<Self> {
        let program = std::path::Path::new(cmd.first()?)
            .file_name()?
            .to_str()?
            .to_owned();
        let ports = cmd.iter().filter(|arg| arg.starts_with("-port=")).cloned();
        Some(Self {
            program,
            args: std::iter::once(subcommand.to_owned()).chain(ports).collect(),
        })
    }

    /// The program may sit behind an interpreter (`bash /opt/weed master ...`),
    /// so it is looked for in the first two argv slots.
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, cmdline: &[S]) -> bool {
        let is_program = |arg: &S| {
            std::path::Path::new(arg.as_ref())
                .file_name()
                .and_then(|name| name.to_str())
                == Some(self.program.as_str())
        };
        let Some(position) = cmdline.iter().take(2).position(is_program) else {
            return false;
        };
        let args = &cmdline[position + 1..];
        self.args
            .iter()
            .all(|wanted| args.iter().any(|arg| arg.as_ref() == wanted))
    }
}

/// Static launch and readiness description of one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: ServiceName,
    pub enabled: bool,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub probe: ProbeSpec,
    /// Ports the service binds, used for pre-flight and reap checks.
    pub ports: Vec<u16>,
}

impl ServiceSpec {
    #[must_use]
    pub fn cmd(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn sweep_pattern(&self) -> SweepPattern {
        let program = self
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        SweepPattern {
            program,
            args: vec![
                self.name.subcommand().to_owned(),
                format!("-port={}", self.probe.port),
            ],
        }
    }
}
