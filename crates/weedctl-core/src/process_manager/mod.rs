mod base;
mod implementations;
mod types;

pub use base::ProcessManager;
#[cfg(test)]
pub(crate) use implementations::{MockEvent, MockProcessManager};
pub use implementations::UnixProcessManager;
pub use types::{CommandSpec, Pid, Spawned, Swept};
