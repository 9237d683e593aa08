//! Infrastructure layer for configuration, logging and the event channel

pub mod config; // Configuration loading and defaults
pub mod event_channel; // Broadcast hub fed by the desktop bridge
pub mod logging; // Logging infrastructure

// Re-export commonly used items
pub use config::{ConfigError, ConfigManager, MonitorConfig, RangePolicyConfig};
pub use event_channel::{EventBus, RawEvent, SubscriptionError};
