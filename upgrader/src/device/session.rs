//! Management session to a single device

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::device::transport::{InstallRequest, InstallSignal, Transport};
use crate::errors::{TransportFault, UpgradeError};
use crate::upgrade::progress::ProgressSink;

/// Timeout applied to remote calls until the caller sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// One live management connection, owned by a single upgrade run
pub struct DeviceSession {
    target: String,
    state: SessionState,
    timeout: Duration,
    transport: Box<dyn Transport>,
}

impl DeviceSession {
    /// Create an unopened session to `target`
    pub fn new(target: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            target: target.into(),
            state: SessionState::Unopened,
            timeout: DEFAULT_TIMEOUT,
            transport,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Open the session
    pub async fn open(&mut self) -> Result<(), UpgradeError> {
        match self.state {
            SessionState::Open => return Ok(()),
            SessionState::Closed => {
                return Err(UpgradeError::ConnectionError {
                    cause: "session already closed".to_string(),
                })
            }
            SessionState::Unopened => {}
        }

        debug!(device = %self.target, timeout = ?self.timeout, "Opening session");
        let timeout = self.timeout;
        bounded(timeout, self.transport.open(&self.target))
            .await
            .map_err(|e| UpgradeError::ConnectionError {
                cause: e.to_string(),
            })?;

        self.state = SessionState::Open;
        Ok(())
    }

    /// Set the bound applied to every subsequent remote call
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.transport.set_timeout(timeout);
    }

    /// Run the remote install primitive once
    pub async fn install(
        &mut self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<InstallSignal, TransportFault> {
        self.ensure_open()?;
        bounded(self.timeout, self.transport.install(request, progress)).await
    }

    /// Issue a single reboot request
    pub async fn reboot(&mut self) -> Result<String, TransportFault> {
        self.ensure_open()?;
        bounded(self.timeout, self.transport.reboot()).await
    }

    /// Release the session. Safe to call in any state, more than once.
    ///
    /// The transport is only released when this is awaited. A run that is
    /// cancelled or panics before reaching `close` leaves it to `Drop`, which
    /// can only log a warning.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport.close().await;
        self.state = SessionState::Closed;
        debug!(device = %self.target, "Session closed");
    }

    fn ensure_open(&self) -> Result<(), TransportFault> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportFault::NotOpen)
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            warn!(device = %self.target, "Session dropped without being closed");
        }
    }
}

async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, TransportFault>
where
    F: Future<Output = Result<T, TransportFault>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportFault::Timeout),
    }
}
