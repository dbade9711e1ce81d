//! Command line and run options

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::app::settings::Settings;
use crate::device::session::DEFAULT_TIMEOUT;
use crate::device::ssh::SshOptions;
use crate::logs::{LogLevel, LogOptions};

/// Upgrade the software on a remote network device
#[derive(Debug, Clone, Parser)]
#[command(name = "swupgrade", version, about)]
pub struct Cli {
    /// Target device
    #[arg(short = 'd', long = "device")]
    pub device: String,

    /// Path to the software package
    #[arg(short = 's', long = "software")]
    pub software: PathBuf,

    /// Staging directory on the device
    #[arg(short = 'r', long)]
    pub remote_dir: Option<String>,

    /// Timeout for every remote call, in seconds
    #[arg(short = 't', long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Skip device-side validation of the package
    #[arg(long)]
    pub no_validate: bool,

    /// Do not reboot after a successful install
    #[arg(long)]
    pub no_reboot: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Settings file (JSON)
    #[arg(short = 'c', long, env = "SWUPGRADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file, recreated on every run
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Emit stderr logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Log to the log file only
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// SSH login user
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// SSH port
    #[arg(long)]
    pub ssh_port: Option<u16>,
}

impl Cli {
    /// Build the immutable run request, flags taking precedence over settings
    pub fn request(&self, settings: &Settings) -> UpgradeRequest {
        UpgradeRequest {
            device: self.device.clone(),
            package: self.software.clone(),
            remote_dir: self
                .remote_dir
                .clone()
                .unwrap_or_else(|| settings.remote_dir.clone()),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(settings.timeout_secs)),
            validate: settings.validate && !self.no_validate,
            reboot: settings.reboot && !self.no_reboot,
        }
    }

    pub fn log_options(&self, settings: &Settings) -> LogOptions {
        LogOptions {
            log_level: self.log_level.unwrap_or(settings.log_level),
            stderr: !self.quiet,
            log_file: self.log_file.clone().or_else(|| settings.log_file.clone()),
            json_format: self.log_json,
        }
    }

    pub fn ssh_options(&self, settings: &Settings) -> SshOptions {
        SshOptions {
            user: self.ssh_user.clone().or_else(|| settings.ssh.user.clone()),
            port: self.ssh_port.or(settings.ssh.port),
            ssh_bin: settings.ssh.ssh_bin.clone(),
            scp_bin: settings.ssh.scp_bin.clone(),
        }
    }
}

/// Immutable input of a single upgrade run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Target device (hostname or address)
    pub device: String,

    /// Local package path, not necessarily absolute
    pub package: PathBuf,

    /// Staging directory on the device
    pub remote_dir: String,

    /// Bound on every remote call once the session is open
    pub timeout: Duration,

    /// Ask the device to validate the package before installing
    pub validate: bool,

    /// Reboot after a confirmed install
    pub reboot: bool,
}

impl UpgradeRequest {
    /// Request with default staging dir, timeout, validation and reboot
    pub fn new(device: impl Into<String>, package: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            package: package.into(),
            remote_dir: "/var/tmp".to_string(),
            timeout: DEFAULT_TIMEOUT,
            validate: true,
            reboot: true,
        }
    }
}
