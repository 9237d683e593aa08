//! Configuration infrastructure
//!
//! 모니터 코어 설정 로드 (읽기 전용).
//! `<config_dir>/matter-certis-v2/monitor_config.json` 을 `config` crate 로
//! 기본값 위에 덮어쓰고 검증합니다. 파일이 없으면 기본값을 사용합니다.
//! 코어는 설정 파일을 절대 쓰지 않습니다.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from file: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve user config directory")]
    NoConfigDir,
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub logging: LoggingConfig,
    pub ranges: RangePolicyConfig,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "tokio": "info")
    pub module_filters: HashMap<String, String>,
}

/// Range policy used by the operator input path and the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangePolicyConfig {
    /// 검증 1회 최대 페이지 스팬 (0 = 제한 없음)
    pub validation_max_span: u32,
    /// 부분 동기화 1회 최대 페이지 스팬 (0 = 제한 없음)
    pub sync_max_span: u32,
    pub items_per_page: u32,
    pub event_channel_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("tokio".to_string(), "info".to_string());
                filters.insert("matter_certis_monitor".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl Default for RangePolicyConfig {
    fn default() -> Self {
        Self {
            validation_max_span: defaults::VALIDATION_MAX_SPAN,
            sync_max_span: defaults::SYNC_MAX_SPAN,
            items_per_page: defaults::DEFAULT_PRODUCTS_PER_PAGE,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if self.ranges.items_per_page == 0 {
            return Err(ConfigError::Validation {
                message: "ranges.items_per_page must be greater than 0".to_string(),
            });
        }
        if self.ranges.event_channel_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "ranges.event_channel_capacity must be greater than 0".to_string(),
            });
        }
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation {
                message: format!("logging.level '{}' is not a valid level", self.logging.level),
            });
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(defaults::APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the file layered over defaults. A missing file yields defaults.
    pub fn load_config(&self) -> Result<MonitorConfig, ConfigError> {
        let exists = self.config_path.exists();
        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .build()?;

        let config: MonitorConfig = settings.try_deserialize()?;
        config.validate()?;
        if exists {
            info!("Loaded monitor configuration from: {:?}", self.config_path);
        } else {
            info!("Monitor configuration not found, using defaults: {:?}", self.config_path);
        }
        Ok(config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "matter-certis-v2";
    pub const CONFIG_FILE_NAME: &str = "monitor_config.json";

    /// Default number of products per page (based on actual site analysis)
    pub const DEFAULT_PRODUCTS_PER_PAGE: u32 = 12;

    pub const VALIDATION_MAX_SPAN: u32 = 50;
    pub const SYNC_MAX_SPAN: u32 = 100;

    /// Broadcast buffer between the bridge and the monitor loop
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;
}
