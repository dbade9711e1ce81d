//! Install orchestration

use serde::Serialize;
use tracing::debug;

use crate::device::session::DeviceSession;
use crate::device::transport::{InstallRequest, InstallSignal};
use crate::upgrade::progress::{self, ProgressEvent};

/// Terminal classification of one install attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Succeeded,
    Failed { reason: String },
}

impl InstallOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, InstallOutcome::Succeeded)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            InstallOutcome::Succeeded => None,
            InstallOutcome::Failed { reason } => Some(reason),
        }
    }

    /// Proof that the install succeeded, required to request a reboot
    pub fn confirmation(&self) -> Option<InstallConfirmation> {
        match self {
            InstallOutcome::Succeeded => Some(InstallConfirmation { _private: () }),
            InstallOutcome::Failed { .. } => None,
        }
    }
}

/// Only obtainable from a succeeded [`InstallOutcome`]
#[derive(Debug)]
pub struct InstallConfirmation {
    _private: (),
}

/// Install a package through `session`
///
/// The remote install primitive is invoked exactly once. Every progress event
/// it emits is passed to `on_progress` in order before this returns. Faults,
/// rejections and timeouts all become [`InstallOutcome::Failed`].
pub async fn install<P>(
    session: &mut DeviceSession,
    request: &InstallRequest,
    on_progress: P,
) -> InstallOutcome
where
    P: FnMut(ProgressEvent),
{
    debug!(
        device = session.target(),
        package = %request.package.path().display(),
        remote_dir = %request.remote_dir,
        validate = request.validate,
        "Submitting install"
    );

    let (sink, stream) = progress::channel(progress::DEFAULT_CAPACITY);
    let result = progress::forward(session.install(request, sink), stream, on_progress).await;

    match result {
        Ok(InstallSignal::Completed) => InstallOutcome::Succeeded,
        Ok(InstallSignal::Rejected { reason }) => InstallOutcome::Failed { reason },
        Err(fault) => InstallOutcome::Failed {
            reason: fault.to_string(),
        },
    }
}
