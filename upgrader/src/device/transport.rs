//! Device transport abstraction

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportFault;
use crate::package::Package;
use crate::upgrade::progress::ProgressSink;

/// What the device is asked to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Package that passed the local pre-flight check
    pub package: Package,

    /// Staging directory on the device
    pub remote_dir: String,

    /// Ask the device to check compatibility before committing
    pub validate: bool,
}

/// Completion signal of a remote install
///
/// There is deliberately no boolean here: a device that returns without
/// raising has still either completed or rejected the install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSignal {
    Completed,
    Rejected { reason: String },
}

/// Primitives a device transport must provide
///
/// Every method is called through a `DeviceSession`, which bounds each call
/// with the session timeout and tracks open/closed state.
#[async_trait]
pub trait Transport: Send {
    /// Establish the management connection to `target`
    async fn open(&mut self, target: &str) -> Result<(), TransportFault>;

    /// Bound for subsequent remote calls
    fn set_timeout(&mut self, timeout: Duration);

    /// Stage and install a package, reporting progress through `progress`
    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<InstallSignal, TransportFault>;

    /// Issue a reboot request and return the device's acknowledgement
    async fn reboot(&mut self) -> Result<String, TransportFault>;

    /// Release the connection
    async fn close(&mut self);
}
