//! `tracing-subscriber` setup for the binaries. Library code only emits
//! events and never installs a subscriber.
//!
//! Levels as used across the crate:
//!
//! - `error`: internal faults (a job task could not be scheduled, tables failed to load)
//! - `warn`: scorer failures and timeouts, cancelled predictions
//! - `info`: job submission, deduplication, completion
//! - `debug`: stage transitions, applied operations, evictions

use anyhow::{Result, anyhow};
use std::{fs::OpenOptions, io, path::PathBuf, sync::Mutex};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("Unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub with_timestamps: bool,
    pub with_target: bool,
    pub with_ansi: bool,
    /// Logs go to stderr when unset.
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::default(),
            with_timestamps: false,
            with_target: false,
            with_ansi: true,
            log_file: None,
        }
    }
}

impl LogConfig {
    /// 0: warn, 1 (`-v`): info, 2: debug, 3+: trace
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// `RUST_LOG` wins over the configured level.
    fn env_filter(&self) -> EnvFilter {
        let level = self.level.as_str().to_lowercase();
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,virtugene={level},virtugene_cli={level}")))
    }

    fn writer(&self) -> io::Result<BoxMakeWriter> {
        Ok(match &self.log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(io::stderr),
        })
    }

    fn layer(&self) -> io::Result<Box<dyn Layer<Registry> + Send + Sync>> {
        let writer = self.writer()?;
        let ansi = self.with_ansi && self.log_file.is_none();
        let layer = match (self.format, self.with_timestamps) {
            (LogFormat::Json, _) => fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(self.with_target)
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
            (LogFormat::Compact, true) => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(self.with_target)
                .boxed(),
            (LogFormat::Compact, false) => fmt::layer()
                .compact()
                .without_time()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(self.with_target)
                .boxed(),
            (LogFormat::Pretty, true) => fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(self.with_target)
                .boxed(),
            (LogFormat::Pretty, false) => fmt::layer()
                .without_time()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(self.with_target)
                .boxed(),
        };
        Ok(layer)
    }
}

/// Installs the global subscriber. Fails if the log file cannot be opened or
/// a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.layer()?)
        .with(config.env_filter())
        .try_init()
        .map_err(|e| anyhow!("Could not install log subscriber: {e}"))
}
