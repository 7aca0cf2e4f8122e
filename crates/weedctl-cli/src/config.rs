use std::path::PathBuf;

use clap::{builder::BoolishValueParser, ArgAction, Args, Parser, Subcommand};
use weedctl_config::{load_from_path, ClusterConfig, ConfigError, Overrides};

/// CLI for weedctl
#[derive(Parser, Debug)]
#[command(name = "weedctl", version, about = "Local SeaweedFS cluster supervisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the cluster and supervise it until interrupted (default)
    Start,
    /// Stop the cluster recorded in the data directory
    Stop,
    /// Report which recorded services are running
    Status,
    /// Stop the recorded cluster, then start it again in the background
    Restart,
}

/// Cluster options. Flags win over `WEEDCTL_*` variables, which win over the
/// config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Options {
    /// Configuration file (TOML)
    #[arg(long, env = "WEEDCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding PID files, logs and service storage
    #[arg(long, env = "WEEDCTL_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage binary, looked up on PATH unless it contains a slash
    #[arg(long, env = "WEEDCTL_BINARY", global = true)]
    pub binary: Option<PathBuf>,

    /// Address every service binds to
    #[arg(long, env = "WEEDCTL_HOST", global = true)]
    pub host: Option<String>,

    #[arg(long, env = "WEEDCTL_MASTER_PORT", global = true)]
    pub master_port: Option<u32>,
    #[arg(long, env = "WEEDCTL_VOLUME_PORT", global = true)]
    pub volume_port: Option<u32>,
    #[arg(long, env = "WEEDCTL_FILER_PORT", global = true)]
    pub filer_port: Option<u32>,
    #[arg(long, env = "WEEDCTL_S3_PORT", global = true)]
    pub s3_port: Option<u32>,
    #[arg(long, env = "WEEDCTL_MQ_PORT", global = true)]
    pub mq_port: Option<u32>,

    /// Run the master (`--master=false` to skip it)
    #[arg(long, env = "WEEDCTL_ENABLE_MASTER", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub master: Option<bool>,
    /// Run a volume server
    #[arg(long, env = "WEEDCTL_ENABLE_VOLUME", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub volume: Option<bool>,
    /// Run a filer
    #[arg(long, env = "WEEDCTL_ENABLE_FILER", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub filer: Option<bool>,
    /// Run the S3 gateway (needs a filer)
    #[arg(long, env = "WEEDCTL_ENABLE_S3", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub s3: Option<bool>,
    /// Run the message queue broker
    #[arg(long, env = "WEEDCTL_ENABLE_MQ", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub mq: Option<bool>,

    /// Maximum number of volumes
    #[arg(long, env = "WEEDCTL_VOLUME_MAX", global = true)]
    pub volume_max: Option<u32>,
    /// Volume size limit in MB
    #[arg(long, env = "WEEDCTL_VOLUME_SIZE_LIMIT_MB", global = true)]
    pub volume_size_limit_mb: Option<u32>,
    /// Filer chunk size limit in MB
    #[arg(long, env = "WEEDCTL_FILER_MAX_MB", global = true)]
    pub filer_max_mb: Option<u32>,

    /// Run the master with raft consensus
    #[arg(long, env = "WEEDCTL_RAFT", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub raft: Option<bool>,
    /// Expose Prometheus metrics
    #[arg(long, env = "WEEDCTL_METRICS", global = true, num_args = 0..=1,
          require_equals = true, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub metrics: Option<bool>,
    /// First metrics port; services take consecutive ports from here
    #[arg(long, env = "WEEDCTL_METRICS_PORT", global = true)]
    pub metrics_port: Option<u32>,
    /// Identity file passed to the S3 gateway
    #[arg(long, env = "WEEDCTL_S3_CONFIG", global = true)]
    pub s3_config: Option<PathBuf>,

    /// Seconds a service may take to become reachable
    #[arg(long, env = "WEEDCTL_STARTUP_TIMEOUT", global = true)]
    pub startup_timeout: Option<u64>,
    /// Seconds a single readiness attempt may take
    #[arg(long, env = "WEEDCTL_HEALTH_TIMEOUT", global = true)]
    pub health_timeout: Option<u64>,
    /// Milliseconds between readiness attempts
    #[arg(long, env = "WEEDCTL_POLL_INTERVAL_MS", global = true)]
    pub poll_interval_ms: Option<u64>,
    /// Seconds a service gets to exit after SIGTERM before SIGKILL
    #[arg(long, env = "WEEDCTL_STOP_TIMEOUT", global = true)]
    pub stop_timeout: Option<u64>,
}

impl Options {
    fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.data_dir.clone(),
            binary: self.binary.clone(),
            host: self.host.clone(),
            master_port: self.master_port,
            volume_port: self.volume_port,
            filer_port: self.filer_port,
            s3_port: self.s3_port,
            mq_port: self.mq_port,
            master: self.master,
            volume: self.volume,
            filer: self.filer,
            s3: self.s3,
            mq: self.mq,
            volume_max: self.volume_max,
            volume_size_limit_mb: self.volume_size_limit_mb,
            filer_max_mb: self.filer_max_mb,
            raft: self.raft,
            metrics: self.metrics,
            metrics_port: self.metrics_port,
            s3_config: self.s3_config.clone(),
            startup_timeout: self.startup_timeout,
            health_timeout: self.health_timeout,
            poll_interval_ms: self.poll_interval_ms,
            stop_timeout: self.stop_timeout,
        }
    }

    /// Resolve the cluster configuration from the config file and these options.
    pub fn resolve(&self) -> Result<ClusterConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Some(load_from_path(path)?)
            }
            None => None,
        };
        ClusterConfig::resolve(file, self.overrides())
    }
}
