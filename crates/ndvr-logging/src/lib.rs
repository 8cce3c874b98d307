//! JSONL and console logging for NDVR routers
//!
//! Many routers share one process in simulations, so every span opened
//! under a [`RouterContextGuard`] is stamped with the router it belongs to.
//! JSONL output, on the console or in a per-run file, carries that router
//! on each event for later aggregation.
//!
//! ```ignore
//! use ndvr_logging::{ConsoleFormat, FileConfig, NdvrSubscriberBuilder};
//!
//! let _guard = NdvrSubscriberBuilder::new()
//!     .with_console(ConsoleFormat::Pretty)
//!     .with_file_output(FileConfig::for_run("logs", 3))
//!     .try_init()?;
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, LogConfig};
pub use context::{RouterContextData, RouterContextGuard};
pub use layers::{RouterContextExtension, RouterContextLayer, RouterJson, jsonl_layer};

use std::fs::{self, File};
use std::io::{self, IsTerminal};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to install global subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps background log writers alive
///
/// Buffered file output is flushed when this guard is dropped, so hold it
/// for as long as the program logs.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard {
    file: Option<WorkerGuard>,
}

/// Builder for the NDVR tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct NdvrSubscriberBuilder {
    config: LogConfig,
}

impl NdvrSubscriberBuilder {
    /// Create a builder with the default configuration (JSONL to stdout)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Choose the console format
    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Also write JSONL to a log file
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Add source locations to JSONL events
    pub fn with_location(mut self, enabled: bool) -> Self {
        self.config.include_location = enabled;
        self
    }

    /// Build the subscriber without installing it
    ///
    /// `RUST_LOG` overrides the configured level when set.
    pub fn build(
        self,
    ) -> Result<(impl Subscriber + Send + Sync + 'static, LoggingGuard), LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));
        let location = self.config.include_location;

        let mut layers: Vec<BoxedLayer> = vec![RouterContextLayer::new().boxed()];
        let mut guard = LoggingGuard::default();

        match self.config.console {
            ConsoleFormat::Off => {}
            ConsoleFormat::Pretty => layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(io::stdout().is_terminal())
                    .with_target(true)
                    .boxed(),
            ),
            ConsoleFormat::Jsonl => layers.push(jsonl_layer(io::stdout, location).boxed()),
        }

        if let Some(file_config) = &self.config.file {
            let (writer, worker) = file_writer(file_config)?;
            guard.file = Some(worker);
            layers.push(jsonl_layer(writer, location).boxed());
        }

        let subscriber = Registry::default().with(env_filter).with(layers);
        Ok((subscriber, guard))
    }

    /// Install the subscriber as the global default
    pub fn try_init(self) -> Result<LoggingGuard, LoggingError> {
        let (subscriber, guard) = self.build()?;
        subscriber.try_init()?;
        Ok(guard)
    }
}

/// Non-blocking writer truncating the run's log file
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;
    let file = File::create(config.path())?;
    Ok(tracing_appender::non_blocking(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let builder = NdvrSubscriberBuilder::new()
            .with_level("trace")
            .with_console(ConsoleFormat::Off)
            .with_location(true)
            .with_file_output(FileConfig::for_run("logs", 2));
        assert_eq!(builder.config.level, "trace");
        assert_eq!(builder.config.console, ConsoleFormat::Off);
        assert!(builder.config.include_location);
        assert_eq!(builder.config.file.unwrap().prefix, "ndvr-run2");
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let result = NdvrSubscriberBuilder::new()
            .with_console(ConsoleFormat::Off)
            .with_file_output(FileConfig::for_run(blocker.join("logs"), 0))
            .build();
        assert!(matches!(result, Err(LoggingError::Io(_))));
    }
}
