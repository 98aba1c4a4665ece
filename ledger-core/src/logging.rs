//! Unified logging system
//!
//! Structured logging with configurable output and size-based rotation of the
//! log file at startup.

use crate::error::{ErrorContext, LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Whether to log to file
    pub log_to_file: bool,
    /// Log file path (if log_to_file is true)
    pub log_file_path: Option<String>,
    /// Rotate the file at startup once it exceeds this size
    pub max_file_bytes: u64,
    /// Number of rotated files to keep
    pub backup_count: u32,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            log_to_file: false,
            log_file_path: None,
            max_file_bytes: 10 * 1024 * 1024,
            backup_count: 10,
            filter_directives: vec!["sqlx=warn".to_string()],
        }
    }
}

fn logging_error(message: String) -> LedgerError {
    LedgerError::Config {
        message,
        source: None,
        context: ErrorContext::new("logging").with_operation("init"),
    }
}

/// Initialize the global subscriber. Calling it twice is an error.
pub fn init_logging(config: &LoggingConfig) -> LedgerResult<()> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        let parsed = directive
            .parse()
            .map_err(|e| logging_error(format!("Invalid filter directive '{}': {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }

    let (writer, ansi) = if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            logging_error("log_file_path must be specified when log_to_file is true".to_string())
        })?;
        let path = Path::new(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        rotate_log_file(path, config.max_file_bytes, config.backup_count)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        (BoxMakeWriter::new(Arc::new(file)), false)
    } else {
        (BoxMakeWriter::new(std::io::stdout), true)
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread);

    let fmt_layer = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| logging_error(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}

fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

/// Shift `file` to `file.1`, `file.1` to `file.2` and so on when `file` is
/// larger than `max_bytes`. The oldest backup beyond `backup_count` is
/// removed. Returns whether a rotation happened.
pub fn rotate_log_file(path: &Path, max_bytes: u64, backup_count: u32) -> LedgerResult<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    if backup_count == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    let oldest = backup_path(path, backup_count);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..backup_count).rev() {
        let from = backup_path(path, index);
        if from.exists() {
            fs::rename(&from, backup_path(path, index + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    Ok(true)
}
