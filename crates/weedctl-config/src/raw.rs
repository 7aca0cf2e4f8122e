use std::path::PathBuf;

use serde::Deserialize;

/// On-disk shape of an optional `weedctl.toml`. Every field is optional so a
/// file only needs to name what it overrides.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub data_dir: Option<PathBuf>,
    pub binary: Option<PathBuf>,
    pub host: Option<String>,
    pub raft: Option<bool>,
    pub metrics: Option<bool>,
    pub metrics_port: Option<u32>,
    pub startup_timeout: Option<u64>,
    pub health_timeout: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stop_timeout: Option<u64>,

    #[serde(default)]
    pub master: RawService,
    #[serde(default)]
    pub volume: RawVolume,
    #[serde(default)]
    pub filer: RawFiler,
    #[serde(default)]
    pub s3: RawS3,
    #[serde(default)]
    pub mq: RawService,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawService {
    pub enabled: Option<bool>,
    pub port: Option<u32>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawVolume {
    pub enabled: Option<bool>,
    pub port: Option<u32>,
    pub max: Option<u32>,
    pub size_limit_mb: Option<u32>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawFiler {
    pub enabled: Option<bool>,
    pub port: Option<u32>,
    pub max_mb: Option<u32>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawS3 {
    pub enabled: Option<bool>,
    pub port: Option<u32>,
    pub config: Option<PathBuf>,
}
