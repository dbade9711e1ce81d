//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::UpgradeError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Tool settings, every field optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file, `null` disables file logging
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Staging directory on the device
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Bound on every remote call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the device to validate the package before installing
    #[serde(default = "default_true")]
    pub validate: bool,

    /// Reboot after a successful install
    #[serde(default = "default_true")]
    pub reboot: bool,

    /// SSH client configuration
    #[serde(default)]
    pub ssh: SshSettings,
}

fn default_true() -> bool {
    true
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("swupgrade.log"))
}

fn default_remote_dir() -> String {
    "/var/tmp".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: default_log_file(),
            remote_dir: default_remote_dir(),
            timeout_secs: default_timeout_secs(),
            validate: true,
            reboot: true,
            ssh: SshSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no file is given
    pub async fn load(path: Option<&Path>) -> Result<Self, UpgradeError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };

        let file = File::new(path);
        if !file.exists().await {
            return Err(UpgradeError::ConfigError(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let settings: Settings = file.read_json().await?;
        if settings.timeout_secs == 0 {
            return Err(UpgradeError::ConfigError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }
}

/// SSH client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSettings {
    /// Login user
    #[serde(default)]
    pub user: Option<String>,

    /// Port
    #[serde(default)]
    pub port: Option<u16>,

    /// ssh executable
    #[serde(default = "default_ssh_bin")]
    pub ssh_bin: String,

    /// scp executable
    #[serde(default = "default_scp_bin")]
    pub scp_bin: String,
}

fn default_ssh_bin() -> String {
    "ssh".to_string()
}

fn default_scp_bin() -> String {
    "scp".to_string()
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: None,
            port: None,
            ssh_bin: default_ssh_bin(),
            scp_bin: default_scp_bin(),
        }
    }
}
