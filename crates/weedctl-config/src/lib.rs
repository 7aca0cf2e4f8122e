mod adapter;
mod args;
mod model;
mod raw;

use weedctl_types::ServiceName;

pub use args::ArgBuilder;
pub use model::{ClusterConfig, Overrides, ServiceConfig};
pub use raw::RawConfig;

/// Error type for configuration resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{service}: port {port} is out of range")]
    PortOutOfRange { service: ServiceName, port: u32 },

    #[error("port {port} is used by both {first} and {second}")]
    PortConflict {
        port: u16,
        first: ServiceName,
        second: ServiceName,
    },

    #[error("storage binary `{0}` not found")]
    MissingBinary(String),
}

/// Load a raw configuration file.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &std::path::Path) -> Result<RawConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_auto(&text, path)
}

/// Parse a raw configuration, picking the format from the file extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_auto(text: &str, path: &std::path::Path) -> Result<RawConfig, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text),
        _ => Err(ConfigError::Validation("unknown config extension".into())),
    }
}

/// Parse a raw configuration from TOML.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str) -> Result<RawConfig, ConfigError> {
    Ok(toml::from_str::<RawConfig>(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml_ok() {
        let txt = r#"
            data_dir = "/var/lib/weedctl"
            raft = true

            [volume]
            port = 8081
            max = 7

            [s3]
            enabled = true
        "#;
        let raw = parse_toml(txt).unwrap();
        assert_eq!(raw.data_dir, Some("/var/lib/weedctl".into()));
        assert_eq!(raw.raft, Some(true));
        assert_eq!(raw.volume.port, Some(8081));
        assert_eq!(raw.volume.max, Some(7));
        assert_eq!(raw.s3.enabled, Some(true));
        assert_eq!(raw.master.port, None);
    }

    #[test]
    fn parse_toml_rejects_unknown_keys() {
        let result = parse_toml("[master]\nprot = 9333\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let result = parse_auto("", std::path::Path::new("weedctl.yaml"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
