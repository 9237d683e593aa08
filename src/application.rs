//! Application layer module
//!
//! Event ingestion, per-stage aggregation, the session state machine and the
//! operator command path, plus the runtime loop that ties them to the event
//! channel and the backend port.

pub mod backend;
pub mod dto;
pub mod event_ingestor;
pub mod operator_actions;
pub mod progress_board;
pub mod runtime;
pub mod session_lifecycle;
pub mod stage_aggregator;

// Re-export commonly used items
pub use backend::{BackendError, CrawlerBackend};
pub use event_ingestor::EventIngestor;
pub use operator_actions::{
    ActionError, ActionStatus, OperatorActions, PreparedRange, RangeNotice, RepairMode,
    RepairOutcome, prepare_range,
};
pub use progress_board::ProgressBoard;
pub use runtime::MonitorRuntime;
pub use session_lifecycle::{
    DashboardSnapshot, LifecycleEffect, SessionLifecycleController, SessionState, SiteSnapshot,
};
pub use stage_aggregator::{StageAggregator, StageCounters};
