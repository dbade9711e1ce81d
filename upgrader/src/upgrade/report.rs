//! Run outcome reporting

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::upgrade::fsm::UpgradeState;
use crate::upgrade::install::InstallOutcome;
use crate::upgrade::progress::ProgressEvent;
use crate::upgrade::reboot::RebootResult;

/// Install outcome plus what happened to the reboot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub install: InstallOutcome,

    /// `None` when no reboot was issued
    pub reboot: Option<RebootResult>,
}

impl Summary {
    /// Install succeeded and, if a reboot was issued, the device took it
    pub fn is_success(&self) -> bool {
        self.install.is_succeeded() && !matches!(self.reboot, Some(RebootResult::Error { .. }))
    }

    /// Process exit code for this summary
    pub fn exit_code(&self) -> u8 {
        match (&self.install, &self.reboot) {
            (InstallOutcome::Failed { .. }, _) => 2,
            (InstallOutcome::Succeeded, Some(RebootResult::Error { .. })) => 3,
            (InstallOutcome::Succeeded, _) => 0,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.install, &self.reboot) {
            (InstallOutcome::Failed { reason }, _) => {
                write!(f, "Unable to install software, {}", reason)
            }
            (InstallOutcome::Succeeded, None) => {
                write!(f, "Software installation complete, reboot not requested")
            }
            (InstallOutcome::Succeeded, Some(RebootResult::Rebooted { acknowledgement })) => {
                if acknowledgement.is_empty() {
                    write!(f, "Software installation complete, reboot requested")
                } else {
                    write!(
                        f,
                        "Software installation complete, reboot requested: {}",
                        first_line(acknowledgement)
                    )
                }
            }
            (InstallOutcome::Succeeded, Some(RebootResult::Error { cause })) => {
                write!(f, "Software installation complete, reboot failed: {}", cause)
            }
        }
    }
}

/// Aggregate the install outcome and optional reboot result
pub fn report(install: InstallOutcome, reboot: Option<RebootResult>) -> Summary {
    Summary { install, reboot }
}

/// Full record of one upgrade run
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeSummary {
    pub run_id: String,
    pub device: String,
    pub package: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: Summary,
    pub progress: Vec<ProgressEvent>,
    pub final_state: UpgradeState,
}

impl UpgradeSummary {
    pub fn exit_code(&self) -> u8 {
        self.summary.exit_code()
    }
}

impl fmt::Display for UpgradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device, self.summary)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}
