//! Reboot coordination

use serde::Serialize;

use crate::device::session::DeviceSession;
use crate::upgrade::install::InstallConfirmation;

/// Result of the reboot request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RebootResult {
    /// The device accepted the request
    Rebooted { acknowledgement: String },

    /// The request could not be issued
    Error { cause: String },
}

/// Issue one reboot request after a confirmed install
///
/// Does not wait for the device to come back.
pub async fn reboot(session: &mut DeviceSession, _confirmed: InstallConfirmation) -> RebootResult {
    match session.reboot().await {
        Ok(acknowledgement) => RebootResult::Rebooted { acknowledgement },
        Err(fault) => RebootResult::Error {
            cause: fault.to_string(),
        },
    }
}
