mod controller;
mod error;
mod logs;
mod pidfile;
mod ports;
mod probe;
mod process_manager;
mod table;
mod types;

pub use controller::Controller;
pub use error::{Error, Result, Warning};
pub use probe::{wait_ready, NetworkProbe, Probe};
pub use process_manager::{CommandSpec, Pid, ProcessManager, Spawned, Swept, UnixProcessManager};
pub use table::{ProcessTable, RunningProcess};
pub use types::{ServiceState, ServiceStatus, StatusReport, StopReport};
