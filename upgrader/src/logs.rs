//! Logging configuration

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::errors::UpgradeError;

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Also write logs to stderr, otherwise only the log file gets them
    pub stderr: bool,

    /// Log file, recreated on every run
    pub log_file: Option<PathBuf>,

    /// Enable JSON format on stderr
    pub json_format: bool,
}

/// Initialize logging
///
/// The returned guard flushes the file writer when dropped, so the caller has
/// to keep it alive for the whole run.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, UpgradeError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if options.stderr {
        let layer = fmt::layer().with_writer(std::io::stderr);
        if options.json_format {
            layers.push(layer.json().boxed());
        } else {
            layers.push(layer.boxed());
        }
    }

    let mut guard = None;
    if let Some(path) = &options.log_file {
        let (directory, file_name) = split_log_path(path)?;
        reset_log_file(path)?;

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| UpgradeError::ConfigError(e.to_string()))?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), UpgradeError> {
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| UpgradeError::ConfigError(format!("Invalid log file: {:?}", path)))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, file_name))
}

/// Remove a previous log file so every run starts a fresh log
fn reset_log_file(path: &Path) -> Result<(), UpgradeError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// What a run log record is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    /// Start, completion, reboot pending
    Lifecycle,

    /// One record per install progress event
    Progress,

    /// Connection and install failures
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Lifecycle => "lifecycle",
            LogCategory::Progress => "progress",
            LogCategory::Error => "error",
        }
    }
}

/// A structured log record emitted during a run
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
}

/// Logger owned by a single upgrade run
///
/// Every record is tagged with the device and run id and forwarded to
/// `tracing`. Records are also kept in order so the caller can inspect what
/// the run reported.
#[derive(Debug)]
pub struct RunLogger {
    device: String,
    run_id: String,
    records: Vec<LogRecord>,
}

impl RunLogger {
    /// Create a logger for one run against `device`
    pub fn new(device: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            run_id: run_id.into(),
            records: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit a record at a fixed level
    pub fn log(&mut self, level: LogLevel, category: LogCategory, message: impl Into<String>) {
        let message = message.into();
        let device = self.device.as_str();
        let run = self.run_id.as_str();
        let category_str = category.as_str();

        match level {
            LogLevel::Trace => trace!(device, run, category = category_str, "{}", message),
            LogLevel::Debug => debug!(device, run, category = category_str, "{}", message),
            LogLevel::Info => info!(device, run, category = category_str, "{}", message),
            LogLevel::Warn => warn!(device, run, category = category_str, "{}", message),
            LogLevel::Error => error!(device, run, category = category_str, "{}", message),
        }

        self.records.push(LogRecord {
            level,
            category,
            message,
        });
    }

    pub fn lifecycle(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, LogCategory::Lifecycle, message);
    }

    pub fn progress(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, LogCategory::Progress, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, LogCategory::Error, message);
    }

    /// Records emitted so far, oldest first
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Records of one category, oldest first
    pub fn records_of(&self, category: LogCategory) -> impl Iterator<Item = &LogRecord> {
        self.records.iter().filter(move |r| r.category == category)
    }
}
