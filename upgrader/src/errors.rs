//! Error types for the upgrade orchestrator

use std::path::PathBuf;

use thiserror::Error;

/// Run-level errors
///
/// Only pre-flight and connection failures surface here. Anything that goes
/// wrong after the session is open is folded into the run summary instead.
#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Software package does not exist: {}", .0.display())]
    PackageNotFound(PathBuf),

    #[error("Cannot connect to device: {cause}")]
    ConnectionError { cause: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Faults raised by a device transport
///
/// The display text of a fault is used verbatim as the failure reason of the
/// install outcome, so variants carry the cause without extra decoration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFault {
    #[error("timeout")]
    Timeout,

    #[error("session is not open")]
    NotOpen,

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for TransportFault {
    fn from(err: std::io::Error) -> Self {
        TransportFault::Io(err.to_string())
    }
}
