use std::{fmt, path::PathBuf};

use crate::error::Error;

/// Operating system process identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Receives both stdout and stderr; truncated on launch.
    pub log: PathBuf,
}

#[derive(Debug)]
pub struct Spawned {
    pub pid: Pid,
}

/// Outcome of a catch-all sweep. A failed kill does not stop the others.
#[derive(Debug, Default)]
pub struct Swept {
    pub killed: Vec<Pid>,
    pub failed: Vec<(Pid, Error)>,
}
