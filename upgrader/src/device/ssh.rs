//! SSH transport driving the device CLI
//!
//! Uses the system `ssh` and `scp` clients in batch mode, so authentication
//! comes from the usual ssh agent/config of the invoking user.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::device::session::DEFAULT_TIMEOUT;
use crate::device::transport::{InstallRequest, InstallSignal, Transport};
use crate::errors::TransportFault;
use crate::upgrade::progress::ProgressSink;

/// SSH client options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    /// Login user, defaults to the ssh config
    pub user: Option<String>,

    /// Port, defaults to the ssh config
    pub port: Option<u16>,

    /// ssh executable
    pub ssh_bin: String,

    /// scp executable
    pub scp_bin: String,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: None,
            port: None,
            ssh_bin: "ssh".to_string(),
            scp_bin: "scp".to_string(),
        }
    }
}

/// Transport that runs device CLI commands over ssh
#[derive(Debug)]
pub struct SshTransport {
    options: SshOptions,
    target: Option<String>,
    timeout: Duration,
}

impl SshTransport {
    pub fn new(options: SshOptions) -> Self {
        Self {
            options,
            target: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn destination(&self, target: &str) -> String {
        match &self.options.user {
            Some(user) => format!("{}@{}", user, target),
            None => target.to_string(),
        }
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
        ]
    }

    fn ssh_args(&self, target: &str, remote_command: &str) -> Vec<String> {
        let mut args = self.common_args();
        if let Some(port) = self.options.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.destination(target));
        args.push(remote_command.to_string());
        args
    }

    fn scp_args(&self, target: &str, local: &Path, remote_path: &str) -> Vec<String> {
        let mut args = self.common_args();
        if let Some(port) = self.options.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.destination(target), remote_path));
        args
    }

    fn connected_target(&self) -> Result<&str, TransportFault> {
        self.target.as_deref().ok_or(TransportFault::NotOpen)
    }

    fn ssh(&self, target: &str, remote_command: &str) -> Command {
        debug!("ssh {} {:?}", target, remote_command);
        let mut command = Command::new(&self.options.ssh_bin);
        command
            .args(self.ssh_args(target, remote_command))
            .kill_on_drop(true);
        command
    }

    async fn copy_package(&self, target: &str, local: &Path, remote_path: &str) -> Result<(), TransportFault> {
        let output = Command::new(&self.options.scp_bin)
            .args(self.scp_args(target, local, remote_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportFault::Io(format!("Failed to run scp: {}", e)))?;

        if !output.status.success() {
            return Err(TransportFault::Remote(format!(
                "Copy to {} failed: {}",
                remote_path,
                failure_text(&output.stderr, output.status)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn open(&mut self, target: &str) -> Result<(), TransportFault> {
        let output = self
            .ssh(target, "show version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TransportFault::Connect(format!("Failed to run ssh: {}", e)))?;

        if !output.status.success() {
            return Err(TransportFault::Connect(failure_text(
                &output.stderr,
                output.status,
            )));
        }

        info!("Connected to {}", target);
        self.target = Some(target.to_string());
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<InstallSignal, TransportFault> {
        let target = self.connected_target()?.to_string();
        let remote_path = request.package.staged_path(&request.remote_dir);

        progress
            .emit(format!(
                "Copying {} to {}:{}",
                request.package.path().display(),
                target,
                remote_path
            ))
            .await;
        self.copy_package(&target, request.package.path(), &remote_path)
            .await?;
        progress.emit(format!("Package staged at {}", remote_path)).await;

        let command = add_package_command(&remote_path, request.validate);
        progress.emit(format!("Running: {}", command)).await;

        let mut child = self
            .ssh(&target, &command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransportFault::Io(format!("Failed to run ssh: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportFault::Io("ssh stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportFault::Io("ssh stderr not captured".to_string()))?;

        let read_progress = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            let mut first_error = None;
            while let Some(line) = read_lossy_line(&mut reader, &mut buf).await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if first_error.is_none() {
                    first_error = parse_error_line(line);
                }
                progress.emit(line).await;
            }
            Ok::<_, TransportFault>(first_error)
        };

        // stderr is drained alongside stdout so a chatty device cannot fill the pipe
        let read_stderr = async {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<_, TransportFault>(buf)
        };

        let (first_error, stderr) = tokio::try_join!(read_progress, read_stderr)?;
        let status = child.wait().await?;
        Ok(install_signal(
            status.success(),
            first_error,
            &failure_text(&stderr, status),
        ))
    }

    async fn reboot(&mut self) -> Result<String, TransportFault> {
        let target = self.connected_target()?.to_string();

        let mut child = self
            .ssh(&target, "request system reboot")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransportFault::Io(format!("Failed to run ssh: {}", e)))?;

        // Answer the confirmation prompt. If ssh already exited the write
        // fails, and its stderr below carries the cause.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"yes\n").await {
                debug!("Reboot confirmation not written: {}", e);
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(TransportFault::Remote(failure_text(
                &output.stderr,
                output.status,
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn close(&mut self) {
        if let Some(target) = self.target.take() {
            debug!("Released connection to {}", target);
        }
    }
}

/// Read one line, replacing invalid UTF-8 instead of failing
///
/// Returns `None` at end of stream.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// CLI command that installs a staged package
pub fn add_package_command(remote_path: &str, validate: bool) -> String {
    if validate {
        format!("request system software add {} validate no-copy", remote_path)
    } else {
        format!("request system software add {} no-copy", remote_path)
    }
}

/// Extract the message of a CLI error line such as `error: ...`
pub fn parse_error_line(line: &str) -> Option<String> {
    let prefix = line.get(..6)?;
    if !prefix.eq_ignore_ascii_case("error:") {
        return None;
    }
    let message = line[6..].trim();
    if message.is_empty() {
        Some(line.to_string())
    } else {
        Some(message.to_string())
    }
}

/// Classify the end of an install command
///
/// An error line wins over the exit status, and a non-zero exit without an
/// error line is still a rejection.
pub fn install_signal(exit_ok: bool, first_error: Option<String>, failure: &str) -> InstallSignal {
    match first_error {
        Some(reason) => InstallSignal::Rejected { reason },
        None if !exit_ok => InstallSignal::Rejected {
            reason: failure.to_string(),
        },
        None => InstallSignal::Completed,
    }
}

fn failure_text(stderr: &[u8], status: std::process::ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("command exited with {}", status)
    } else {
        stderr.to_string()
    }
}
