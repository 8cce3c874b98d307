//! Logging configuration for simulator runs

use std::path::PathBuf;

/// How events reach stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// No console output
    Off,
    /// Human-readable lines for interactive runs
    Pretty,
    /// One JSON object per event
    #[default]
    Jsonl,
}

/// Logging settings for one process
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level filter used when `RUST_LOG` is not set
    pub level: String,
    pub console: ConsoleFormat,
    /// JSONL copy of every event on disk
    pub file: Option<FileConfig>,
    /// Add source file and line to JSONL events
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::default(),
            file: None,
            include_location: false,
        }
    }
}

/// JSONL log file for one simulator run
///
/// The file is `<directory>/<prefix>.log` and is truncated when logging
/// starts, so reruns with the same run number replace the old log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: String,
}

impl FileConfig {
    /// Log file with an explicit prefix
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// Log file named after a run number, `ndvr-run<run>.log`
    pub fn for_run(directory: impl Into<PathBuf>, run: u64) -> Self {
        Self::new(directory, format!("ndvr-run{run}"))
    }

    /// Full path of the log file
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.prefix))
    }
}
