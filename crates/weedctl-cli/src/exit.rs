use std::process::ExitCode;

use weedctl_config::ConfigError;
use weedctl_core::Error;

pub const INTERNAL: u8 = 1;
pub const CONFIG: u8 = 2;
pub const MISSING_BINARY: u8 = 3;
pub const READINESS: u8 = 4;
pub const LAUNCH: u8 = 5;
pub const SOME_DOWN: u8 = 6;
pub const NOTHING_TRACKED: u8 = 7;
/// Conventional code for a run ended by SIGINT.
pub const INTERRUPTED: u8 = 130;

/// Map an error that reached `main` to the process exit code.
pub fn code_for(err: &anyhow::Error) -> ExitCode {
    ExitCode::from(classify(err))
}

fn classify(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<ConfigError>() {
        return config(err);
    }
    match err.downcast_ref::<Error>() {
        Some(Error::Config(err)) => config(err),
        Some(Error::PortInUse { .. }) => CONFIG,
        Some(Error::ReadinessTimeout { .. }) => READINESS,
        Some(
            Error::Launch { .. }
            | Error::DataDir { .. }
            | Error::PidFile { .. }
            | Error::PortStillBusy { .. },
        ) => LAUNCH,
        Some(Error::Signal { .. } | Error::Internal(_)) | None => INTERNAL,
    }
}

fn config(err: &ConfigError) -> u8 {
    match err {
        ConfigError::MissingBinary(_) => MISSING_BINARY,
        _ => CONFIG,
    }
}
