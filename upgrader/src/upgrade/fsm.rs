//! Finite State Machine for a single upgrade run

use serde::{Deserialize, Serialize};

/// Upgrade run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    /// Nothing done yet
    Idle,

    /// Checking the local package
    Validating,

    /// Opening the device session
    Connecting,

    /// Session open, install not started
    Connected,

    /// Install in progress on the device
    Installing,

    /// Device confirmed the install
    InstallSucceeded,

    /// Install rejected, faulted or timed out
    InstallFailed,

    /// Reboot request in flight
    Rebooting,

    /// Reboot request issued (acknowledged or not)
    Rebooted,

    /// Session released, run finished
    Closed,
}

impl UpgradeState {
    pub fn is_terminal(&self) -> bool {
        *self == UpgradeState::Closed
    }
}

/// Upgrade run event
#[derive(Debug, Clone)]
pub enum UpgradeEvent {
    /// Begin the run
    Start,

    /// Package exists locally
    PackageLocated,

    /// Package path does not resolve to a file
    PackageMissing(String),

    /// Session opened
    Connected,

    /// Session could not be opened
    ConnectFailed(String),

    /// Submit the install
    Install,

    /// Install confirmed by the device
    InstallSucceeded,

    /// Install failed
    InstallFailed(String),

    /// Issue the reboot request
    Reboot,

    /// Device acknowledged the reboot
    RebootAcknowledged,

    /// Reboot request could not be issued
    RebootFailed(String),

    /// Release the session
    Close,
}

/// Upgrade FSM
#[derive(Debug, Clone)]
pub struct UpgradeFsm {
    state: UpgradeState,
    error: Option<String>,
    history: Vec<UpgradeState>,
}

impl UpgradeFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: UpgradeState::Idle,
            error: None,
            history: vec![UpgradeState::Idle],
        }
    }

    /// Get current state
    pub fn state(&self) -> UpgradeState {
        self.state
    }

    /// Get the last recorded failure, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[UpgradeState] {
        &self.history
    }

    /// A reboot may only be issued right after a confirmed install
    pub fn can_reboot(&self) -> bool {
        self.state == UpgradeState::InstallSucceeded
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: UpgradeEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (UpgradeState::Idle, UpgradeEvent::Start) => UpgradeState::Validating,

            // From Validating
            (UpgradeState::Validating, UpgradeEvent::PackageLocated) => UpgradeState::Connecting,
            (UpgradeState::Validating, UpgradeEvent::PackageMissing(err)) => {
                self.error = Some(err.clone());
                UpgradeState::Closed
            }

            // From Connecting
            (UpgradeState::Connecting, UpgradeEvent::Connected) => UpgradeState::Connected,
            (UpgradeState::Connecting, UpgradeEvent::ConnectFailed(err)) => {
                self.error = Some(err.clone());
                UpgradeState::Closed
            }

            (UpgradeState::Connected, UpgradeEvent::Install) => UpgradeState::Installing,

            // From Installing
            (UpgradeState::Installing, UpgradeEvent::InstallSucceeded) => {
                UpgradeState::InstallSucceeded
            }
            (UpgradeState::Installing, UpgradeEvent::InstallFailed(err)) => {
                self.error = Some(err.clone());
                UpgradeState::InstallFailed
            }

            // From InstallSucceeded
            (UpgradeState::InstallSucceeded, UpgradeEvent::Reboot) => UpgradeState::Rebooting,
            (UpgradeState::InstallSucceeded, UpgradeEvent::Close) => UpgradeState::Closed,

            // From Rebooting
            (UpgradeState::Rebooting, UpgradeEvent::RebootAcknowledged) => UpgradeState::Rebooted,
            (UpgradeState::Rebooting, UpgradeEvent::RebootFailed(err)) => {
                self.error = Some(err.clone());
                UpgradeState::Rebooted
            }

            (UpgradeState::InstallFailed, UpgradeEvent::Close) => UpgradeState::Closed,
            (UpgradeState::Rebooted, UpgradeEvent::Close) => UpgradeState::Closed,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        self.history.push(new_state);
        Ok(())
    }
}

impl Default for UpgradeFsm {
    fn default() -> Self {
        Self::new()
    }
}
