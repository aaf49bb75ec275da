mod probe;
mod sidecar;

pub use probe::{probe_exclusive, HoldProbe};
pub use sidecar::{LockAcquireResult, SidecarLock};
