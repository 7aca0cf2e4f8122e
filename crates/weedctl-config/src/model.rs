use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use weedctl_types::ServiceName;

use crate::{raw::RawConfig, ConfigError};

pub const DEFAULT_BINARY: &str = "weed";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_METRICS_PORT: u16 = 9324;
/// SeaweedFS serves gRPC on the HTTP port plus this offset.
pub const GRPC_PORT_OFFSET: u16 = 10000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Resolved cluster configuration. Built once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    pub data_dir: PathBuf,
    pub binary: PathBuf,
    pub host: String,

    pub master: ServiceConfig,
    pub volume: ServiceConfig,
    pub filer: ServiceConfig,
    pub s3: ServiceConfig,
    pub mq: ServiceConfig,

    pub volume_max: u32,
    pub volume_size_limit_mb: u32,
    pub filer_max_mb: u32,
    pub raft: bool,
    pub metrics: bool,
    pub metrics_port: u16,
    pub s3_config: Option<PathBuf>,

    pub startup_timeout: Duration,
    pub health_timeout: Duration,
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
}

/// Values coming from the environment and the command line. Flags win over
/// environment variables before this struct is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub binary: Option<PathBuf>,
    pub host: Option<String>,

    pub master_port: Option<u32>,
    pub volume_port: Option<u32>,
    pub filer_port: Option<u32>,
    pub s3_port: Option<u32>,
    pub mq_port: Option<u32>,

    pub master: Option<bool>,
    pub volume: Option<bool>,
    pub filer: Option<bool>,
    pub s3: Option<bool>,
    pub mq: Option<bool>,

    pub volume_max: Option<u32>,
    pub volume_size_limit_mb: Option<u32>,
    pub filer_max_mb: Option<u32>,
    pub raft: Option<bool>,
    pub metrics: Option<bool>,
    pub metrics_port: Option<u32>,
    pub s3_config: Option<PathBuf>,

    pub startup_timeout: Option<u64>,
    pub health_timeout: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stop_timeout: Option<u64>,
}

fn default_data_dir() -> PathBuf {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "default".to_owned());
    std::env::temp_dir().join(format!("weedctl-{user}"))
}

fn port(service: ServiceName, value: Option<u32>, default: u16) -> Result<u16, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::PortOutOfRange {
            service,
            port: value,
        }),
    }
}

fn service(
    name: ServiceName,
    enabled: bool,
    value: Option<u32>,
    default: u16,
) -> Result<ServiceConfig, ConfigError> {
    Ok(ServiceConfig {
        enabled,
        port: port(name, value, default)?,
    })
}

fn seconds(name: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!("{name} must be positive")));
    }
    Ok(Duration::from_secs(value))
}

impl ClusterConfig {
    /// Layer defaults, an optional config file and overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any resolved value is invalid.
    pub fn resolve(file: Option<RawConfig>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let o = overrides;

        let metrics_port = o.metrics_port.or(file.metrics_port);
        let metrics_port = port(ServiceName::Master, metrics_port, DEFAULT_METRICS_PORT)?;

        let poll_interval_ms = o.poll_interval_ms.or(file.poll_interval_ms).unwrap_or(1000);
        if poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll interval must be positive".into(),
            ));
        }

        let config = ClusterConfig {
            data_dir: o.data_dir.or(file.data_dir).unwrap_or_else(default_data_dir),
            binary: o
                .binary
                .or(file.binary)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY)),
            host: o
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_owned()),

            master: service(
                ServiceName::Master,
                o.master.or(file.master.enabled).unwrap_or(true),
                o.master_port.or(file.master.port),
                9333,
            )?,
            volume: service(
                ServiceName::Volume,
                o.volume.or(file.volume.enabled).unwrap_or(true),
                o.volume_port.or(file.volume.port),
                8080,
            )?,
            filer: service(
                ServiceName::Filer,
                o.filer.or(file.filer.enabled).unwrap_or(true),
                o.filer_port.or(file.filer.port),
                8888,
            )?,
            s3: service(
                ServiceName::S3,
                o.s3.or(file.s3.enabled).unwrap_or(false),
                o.s3_port.or(file.s3.port),
                8333,
            )?,
            mq: service(
                ServiceName::Mq,
                o.mq.or(file.mq.enabled).unwrap_or(false),
                o.mq_port.or(file.mq.port),
                17777,
            )?,

            volume_max: o.volume_max.or(file.volume.max).unwrap_or(100),
            volume_size_limit_mb: o
                .volume_size_limit_mb
                .or(file.volume.size_limit_mb)
                .unwrap_or(1024),
            filer_max_mb: o.filer_max_mb.or(file.filer.max_mb).unwrap_or(4),
            raft: o.raft.or(file.raft).unwrap_or(false),
            metrics: o.metrics.or(file.metrics).unwrap_or(false),
            metrics_port,
            s3_config: o.s3_config.or(file.s3.config),

            startup_timeout: seconds(
                "startup timeout",
                o.startup_timeout.or(file.startup_timeout).unwrap_or(30),
            )?,
            health_timeout: seconds(
                "health timeout",
                o.health_timeout.or(file.health_timeout).unwrap_or(2),
            )?,
            poll_interval: Duration::from_millis(poll_interval_ms),
            stop_timeout: seconds(
                "stop timeout",
                o.stop_timeout.or(file.stop_timeout).unwrap_or(5),
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn service(&self, name: ServiceName) -> ServiceConfig {
        match name {
            ServiceName::Master => self.master,
            ServiceName::Volume => self.volume,
            ServiceName::Filer => self.filer,
            ServiceName::S3 => self.s3,
            ServiceName::Mq => self.mq,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = ServiceName> + '_ {
        ServiceName::ALL
            .into_iter()
            .filter(|name| self.service(*name).enabled)
    }

    /// Every port a service binds: HTTP, gRPC (where it has one) and metrics.
    #[must_use]
    pub fn ports(&self, name: ServiceName) -> Vec<u16> {
        let http = self.service(name).port;
        let mut ports = vec![http];
        if name != ServiceName::Mq {
            if let Some(grpc) = http.checked_add(GRPC_PORT_OFFSET) {
                ports.push(grpc);
            }
        }
        if let Some(metrics) = self.metrics_port_of(name) {
            ports.push(metrics);
        }
        ports
    }

    #[must_use]
    pub fn metrics_port_of(&self, name: ServiceName) -> Option<u16> {
        if !self.metrics {
            return None;
        }
        let offset = ServiceName::ALL.iter().position(|n| *n == name)?;
        self.metrics_port.checked_add(u16::try_from(offset).ok()?)
    }

    /// Number of probe polls that fit in the startup timeout, at least one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        let polls = self
            .startup_timeout
            .as_millis()
            .div_ceil(self.poll_interval.as_millis().max(1));
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled().next().is_none() {
            return Err(ConfigError::Validation("no service is enabled".into()));
        }

        for name in self.enabled() {
            let port = self.service(name).port;
            if name != ServiceName::Mq && port.checked_add(GRPC_PORT_OFFSET).is_none() {
                return Err(ConfigError::PortOutOfRange {
                    service: name,
                    port: u32::from(port) + u32::from(GRPC_PORT_OFFSET),
                });
            }
            if self.metrics && self.metrics_port_of(name).is_none() {
                return Err(ConfigError::PortOutOfRange {
                    service: name,
                    port: u32::from(self.metrics_port) + 4,
                });
            }
        }

        let mut owners: HashMap<u16, ServiceName> = HashMap::new();
        for name in self.enabled() {
            for port in self.ports(name) {
                if let Some(first) = owners.insert(port, name) {
                    return Err(ConfigError::PortConflict {
                        port,
                        first,
                        second: name,
                    });
                }
            }
        }

        for name in self.enabled() {
            let requires = match name {
                ServiceName::Master => None,
                ServiceName::S3 => Some(ServiceName::Filer),
                _ => Some(ServiceName::Master),
            };
            if let Some(required) = requires {
                if !self.service(required).enabled {
                    return Err(ConfigError::Validation(format!(
                        "{name} requires {required} to be enabled"
                    )));
                }
            }
        }

        if self.s3.enabled {
            if let Some(path) = &self.s3_config {
                if !path.is_file() {
                    return Err(ConfigError::Validation(format!(
                        "s3 config file {} does not exist",
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Return a copy whose binary is an absolute, existing path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingBinary` when the binary cannot be found.
    pub fn with_resolved_binary(&self) -> Result<Self, ConfigError> {
        let binary = resolve_binary(&self.binary)?;
        tracing::debug!("Using storage binary {}", binary.display());
        Ok(Self {
            binary,
            ..self.clone()
        })
    }
}

fn resolve_binary(binary: &Path) -> Result<PathBuf, ConfigError> {
    let missing = || ConfigError::MissingBinary(binary.display().to_string());
    if binary.components().count() > 1 {
        return if binary.is_file() {
            Ok(binary.to_path_buf())
        } else {
            Err(missing())
        };
    }
    which::which(binary).map_err(|_| missing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawS3, RawService, RawVolume};

    #[test]
    fn defaults_enable_core_services() {
        let config = ClusterConfig::resolve(None, Overrides::default()).unwrap();

        assert_eq!(
            config.enabled().collect::<Vec<_>>(),
            vec![ServiceName::Master, ServiceName::Volume, ServiceName::Filer]
        );
        assert_eq!(config.master.port, 9333);
        assert_eq!(config.volume.port, 8080);
        assert_eq!(config.filer.port, 8888);
        assert_eq!(config.binary, PathBuf::from("weed"));
        assert_eq!(config.max_attempts(), 30);
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_win_over_file() {
        let file = RawConfig {
            volume: RawVolume {
                port: Some(8081),
                max: Some(3),
                ..RawVolume::default()
            },
            raft: Some(true),
            ..RawConfig::default()
        };
        let overrides = Overrides {
            volume_port: Some(8082),
            ..Overrides::default()
        };

        let config = ClusterConfig::resolve(Some(file), overrides).unwrap();
        assert_eq!(config.volume.port, 8082);
        assert_eq!(config.volume_max, 3);
        assert!(config.raft);
    }

    #[test]
    fn rejects_out_of_range_ports() {
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                master_port: Some(70000),
                ..Overrides::default()
            },
        );
        assert!(matches!(
            result,
            Err(ConfigError::PortOutOfRange {
                service: ServiceName::Master,
                port: 70000
            })
        ));

        let result = ClusterConfig::resolve(
            None,
            Overrides {
                filer_port: Some(0),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::PortOutOfRange { .. })));

        // gRPC would land on 70000
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                volume_port: Some(60000),
                ..Overrides::default()
            },
        );
        assert!(matches!(
            result,
            Err(ConfigError::PortOutOfRange {
                service: ServiceName::Volume,
                ..
            })
        ));
    }

    #[test]
    fn rejects_port_conflicts_including_grpc() {
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                filer_port: Some(8080),
                ..Overrides::default()
            },
        );
        assert!(matches!(
            result,
            Err(ConfigError::PortConflict {
                port: 8080,
                first: ServiceName::Volume,
                second: ServiceName::Filer
            })
        ));

        // master gRPC is 19333
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                volume_port: Some(19333),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::PortConflict { port: 19333, .. })));
    }

    #[test]
    fn disabled_services_do_not_conflict() {
        let config = ClusterConfig::resolve(
            None,
            Overrides {
                mq_port: Some(8080),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert!(!config.mq.enabled);
    }

    #[test]
    fn dependent_services_require_their_upstream() {
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                master: Some(false),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let file = RawConfig {
            s3: RawS3 {
                enabled: Some(true),
                ..RawS3::default()
            },
            ..RawConfig::default()
        };
        let result = ClusterConfig::resolve(
            Some(file),
            Overrides {
                filer: Some(false),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_missing_s3_config_file() {
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                s3: Some(true),
                s3_config: Some("/nonexistent/weedctl/s3.json".into()),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_timeouts_and_empty_clusters() {
        let result = ClusterConfig::resolve(
            None,
            Overrides {
                startup_timeout: Some(0),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let file = RawConfig {
            master: RawService {
                enabled: Some(false),
                port: None,
            },
            ..RawConfig::default()
        };
        let result = ClusterConfig::resolve(
            Some(file),
            Overrides {
                volume: Some(false),
                filer: Some(false),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn metrics_ports_follow_service_order() {
        let config = ClusterConfig::resolve(
            None,
            Overrides {
                metrics: Some(true),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.metrics_port_of(ServiceName::Master), Some(9324));
        assert_eq!(config.metrics_port_of(ServiceName::Filer), Some(9326));
        assert_eq!(config.ports(ServiceName::Volume), vec![8080, 18080, 9325]);
        assert_eq!(config.ports(ServiceName::Mq), vec![17777, 9328]);
    }

    #[test]
    fn max_attempts_rounds_up() {
        let config = ClusterConfig::resolve(
            None,
            Overrides {
                startup_timeout: Some(1),
                poll_interval_ms: Some(300),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn missing_binary_is_reported() {
        let config = ClusterConfig::resolve(
            None,
            Overrides {
                binary: Some("/nonexistent/weedctl/weed".into()),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert!(matches!(
            config.with_resolved_binary(),
            Err(ConfigError::MissingBinary(_))
        ));

        let config = ClusterConfig::resolve(
            None,
            Overrides {
                binary: Some("weedctl-binary-that-does-not-exist".into()),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert!(matches!(
            config.with_resolved_binary(),
            Err(ConfigError::MissingBinary(_))
        ));
    }

    #[test]
    fn existing_binary_path_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("weed");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();

        let config = ClusterConfig::resolve(
            None,
            Overrides {
                binary: Some(binary.clone()),
                ..Overrides::default()
            },
        )
        .unwrap()
        .with_resolved_binary()
        .unwrap();
        assert_eq!(config.binary, binary);
    }
}
