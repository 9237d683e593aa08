//! Logging system configuration and initialization
//!
//! - Console and/or file output (non-blocking file writer)
//! - Optional structured JSON file logs
//! - KST (Korea Standard Time) timestamps
//! - Previous log file is rotated with a timestamp suffix at startup
//! - `RUST_LOG` overrides the configured filter

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Utc};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "monitor.log";
const KST_OFFSET_SECS: i32 = 9 * 3600;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

fn to_kst(time: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    FixedOffset::east_opt(KST_OFFSET_SECS).map(|offset| time.with_timezone(&offset))
}

/// Custom time formatter for KST (Korea Standard Time, UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let kst_time = to_kst(Utc::now()).ok_or(std::fmt::Error)?;
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

/// Default log directory: `<data_local_dir>/matter-certis-v2/logs`, falling
/// back to `./logs`.
pub fn get_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(crate::infrastructure::config::defaults::APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}

/// Rotate existing log file by renaming it with its KST timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let kst_datetime =
        to_kst(file_time.into()).ok_or_else(|| anyhow!("Invalid KST offset"))?;

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, kst_datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;
    Ok(Some(timestamped_path))
}

/// Keeps the newest `max_files` `.log` files in `log_dir`. Returns how many were removed.
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".log"));
        if !path.is_file() || !is_log {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = max_files as usize;
    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Filter from `RUST_LOG`, otherwise the configured level plus module filters
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;
    let mut modules: Vec<_> = config.module_filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        let directive = format!("{module}={level}")
            .parse()
            .map_err(|e| anyhow!("Invalid module filter {}={}: {}", module, level, e))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Initialize logging with the default configuration into the default directory
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default(), &get_log_directory())
}

/// Initialize logging with custom configuration
///
/// Fails when no output is enabled or a global subscriber is already set.
pub fn init_logging_with_config(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let mut rotated = None;
    let mut removed = 0;
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        rotated = rotate_existing_log_file(log_dir, LOG_FILE_NAME)?;
        if config.auto_cleanup_logs {
            removed = cleanup_old_logs(log_dir, config.max_files)?;
        }

        let (file_writer, file_guard) = non_blocking(rolling::never(log_dir, LOG_FILE_NAME));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let file_layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(KstTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(KstTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        layers.push(file_layer);
    }

    if config.console_output {
        layers.push(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(KstTimeFormatter)
                .with_target(false)
                .boxed(),
        );
    }

    Registry::default()
        .with(layers)
        .with(build_env_filter(config)?)
        .try_init()
        .map_err(|e| anyhow!("Failed to install global subscriber: {}", e))?;

    info!("📝 Logging system initialized");
    info!("Log level: {} (json: {})", config.level, config.json_format);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    if let Some(path) = rotated {
        info!("Rotated previous log file to: {:?}", path);
    }
    if removed > 0 {
        info!("Removed {} old log files (keeping {})", removed, config.max_files);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_ends_with_logs() {
        assert!(get_log_directory().ends_with("logs"));
    }

    #[test]
    fn rotation_renames_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(LOG_FILE_NAME), "old").expect("write");
        let rotated = rotate_existing_log_file(dir.path(), LOG_FILE_NAME)
            .expect("rotate")
            .expect("rotated path");
        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        assert!(rotated.exists());
        assert!(rotate_existing_log_file(dir.path(), LOG_FILE_NAME).expect("rotate").is_none());
    }

    #[test]
    fn cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("monitor.{i}.log")), "x").expect("write");
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").expect("write");
        let removed = cleanup_old_logs(dir.path(), 2).expect("cleanup");
        assert_eq!(removed, 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(init_logging_with_config(&config, dir.path()).is_err());
    }

    #[test]
    fn module_filters_become_directives() {
        let config = LoggingConfig {
            module_filters: HashMap::from([
                ("tokio".to_string(), "warn".to_string()),
                ("matter_certis_monitor".to_string(), "debug".to_string()),
            ]),
            ..LoggingConfig::default()
        };
        // RUST_LOG takes precedence when set in the test environment
        if std::env::var("RUST_LOG").is_err() {
            let filter = build_env_filter(&config).expect("filter");
            let rendered = filter.to_string();
            assert!(rendered.contains("tokio=warn"));
            assert!(rendered.contains("matter_certis_monitor=debug"));
        }
    }
}
