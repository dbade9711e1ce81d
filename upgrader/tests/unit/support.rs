//! Scripted in-memory transport

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swupgrade::device::transport::{InstallRequest, InstallSignal, Transport};
use swupgrade::errors::TransportFault;
use swupgrade::upgrade::progress::ProgressSink;

/// A primitive invoked on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    SetTimeout(Duration),
    Install {
        file_name: String,
        remote_dir: String,
        validate: bool,
    },
    Reboot,
    Close,
}

/// How the scripted install ends
#[derive(Debug, Clone)]
pub enum InstallScript {
    Complete,
    Reject(String),
    Fault(TransportFault),
    Hang,
}

/// How the scripted reboot ends
#[derive(Debug, Clone)]
pub enum RebootScript {
    Ack(String),
    Fault(TransportFault),
    Hang,
}

/// Shared view of the calls a transport received
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn installs(&self) -> usize {
        self.count(|c| matches!(c, Call::Install { .. }))
    }

    pub fn reboots(&self) -> usize {
        self.count(|c| *c == Call::Reboot)
    }

    pub fn closes(&self) -> usize {
        self.count(|c| *c == Call::Close)
    }

    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct ScriptedTransport {
    log: CallLog,
    open: Result<(), TransportFault>,
    progress: Vec<String>,
    install: InstallScript,
    reboot: RebootScript,
}

impl ScriptedTransport {
    /// Transport whose every call succeeds
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let transport = Self {
            log: log.clone(),
            open: Ok(()),
            progress: Vec::new(),
            install: InstallScript::Complete,
            reboot: RebootScript::Ack("Shutdown NOW!".to_string()),
        };
        (transport, log)
    }

    pub fn fail_open(mut self, fault: TransportFault) -> Self {
        self.open = Err(fault);
        self
    }

    pub fn progress(mut self, messages: &[&str]) -> Self {
        self.progress = messages.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn install(mut self, script: InstallScript) -> Self {
        self.install = script;
        self
    }

    pub fn reboot(mut self, script: RebootScript) -> Self {
        self.reboot = script;
        self
    }

    pub fn boxed(self) -> Box<dyn Transport> {
        Box::new(self)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self, target: &str) -> Result<(), TransportFault> {
        self.log.push(Call::Open(target.to_string()));
        self.open.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.log.push(Call::SetTimeout(timeout));
    }

    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<InstallSignal, TransportFault> {
        self.log.push(Call::Install {
            file_name: request.package.file_name().to_string(),
            remote_dir: request.remote_dir.clone(),
            validate: request.validate,
        });

        for message in &self.progress {
            progress.emit(message.clone()).await;
        }

        match &self.install {
            InstallScript::Complete => Ok(InstallSignal::Completed),
            InstallScript::Reject(reason) => Ok(InstallSignal::Rejected {
                reason: reason.clone(),
            }),
            InstallScript::Fault(fault) => Err(fault.clone()),
            InstallScript::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(InstallSignal::Completed)
            }
        }
    }

    async fn reboot(&mut self) -> Result<String, TransportFault> {
        self.log.push(Call::Reboot);
        match &self.reboot {
            RebootScript::Ack(ack) => Ok(ack.clone()),
            RebootScript::Fault(fault) => Err(fault.clone()),
            RebootScript::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(String::new())
            }
        }
    }

    async fn close(&mut self) {
        self.log.push(Call::Close);
    }
}

/// Write a package file and return its directory guard and path
pub fn package_file(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, b"software image").unwrap();
    (dir, path)
}
