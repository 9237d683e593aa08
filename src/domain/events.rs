//! Lifecycle event types consumed from the crawling engine
//!
//! The engine emits flattened `actor-*` events; the ingestor decodes each one
//! into exactly one `LifecycleEvent` variant. Every per-unit variant names the
//! unit it concerns (page number or opaque id) and its status, so the
//! reducers can dedupe by membership instead of trusting delivery order.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use super::page_range::PageRange;

/// Pipeline stage that owns a set of counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Stage {
    /// 목록 페이지 수집
    PageListing,
    /// 제품 상세 수집
    DetailFetch,
    /// page_id / index_in_page 검증
    Validation,
    /// DB 저장
    Persist,
    /// 부분 재수집 + upsert
    Sync,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::PageListing,
        Self::DetailFetch,
        Self::Validation,
        Self::Persist,
        Self::Sync,
    ];

    /// Stable snake_case key (matches the serde representation)
    pub const fn key(self) -> &'static str {
        match self {
            Self::PageListing => "page_listing",
            Self::DetailFetch => "detail_fetch",
            Self::Validation => "validation",
            Self::Persist => "persist",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageListing => write!(f, "제품 목록 수집"),
            Self::DetailFetch => write!(f, "제품 상세정보 수집"),
            Self::Validation => write!(f, "페이지 검증"),
            Self::Persist => write!(f, "데이터베이스 저장"),
            Self::Sync => write!(f, "부분 동기화"),
        }
    }
}

/// Stage-scoped unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitId {
    Page(u32),
    Key(String),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(p) => write!(f, "page:{p}"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStatus {
    Started,
    Completed,
    Failed,
    GroupReport,
}

/// `product-lifecycle-group` phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    Fetch,
    Persist,
}

impl GroupPhase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fetch" => Some(Self::Fetch),
            "persist" => Some(Self::Persist),
            _ => None,
        }
    }

    pub const fn stage(self) -> Stage {
        match self {
            Self::Fetch => Stage::DetailFetch,
            Self::Persist => Stage::Persist,
        }
    }
}

/// Per-page upsert counts carried by `sync-page-completed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncPageCounts {
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl SyncPageCounts {
    pub fn accumulate(&mut self, other: &Self) {
        self.inserted = self.inserted.saturating_add(other.inserted);
        self.updated = self.updated.saturating_add(other.updated);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.failed = self.failed.saturating_add(other.failed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    // === 세션 이벤트 ===
    SessionStarted {
        session_id: Option<String>,
    },
    SessionCompleted {
        session_id: Option<String>,
    },
    SessionFailed {
        session_id: Option<String>,
        error: Option<String>,
    },
    SessionTimeout {
        session_id: Option<String>,
    },
    ShutdownCompleted {
        session_id: Option<String>,
    },

    // === 배치 이벤트 ===
    BatchStarted {
        batch_id: String,
        pages_in_batch: Option<u32>,
    },
    BatchCompleted {
        batch_id: String,
    },
    BatchFailed {
        batch_id: String,
        final_failure: bool,
    },

    // === 페이지 단위 이벤트 ===
    PageTaskStarted {
        page: u32,
    },
    PageTaskCompleted {
        page: u32,
    },
    PageTaskFailed {
        page: u32,
        final_failure: bool,
    },

    // === 제품 이벤트 ===
    ProductLifecycle {
        product_ref: Option<String>,
        page: Option<u32>,
        status: String,
    },
    ProductLifecycleGroup {
        phase: GroupPhase,
        page: Option<u32>,
        group_size: u32,
        succeeded: u32,
        failed: u32,
        duplicates: u32,
        duration_ms: u64,
    },

    // === 검증 이벤트 ===
    ValidationStarted {
        scan_pages: u32,
    },
    ValidationPageScanned {
        physical_page: u32,
        products_found: u32,
    },
    ValidationDivergence {
        physical_page: u32,
        kind: String,
        expected_offset: Option<u64>,
    },
    ValidationAnomaly {
        code: String,
        detail: String,
    },
    ValidationCompleted {
        pages_scanned: u32,
        divergences: u32,
        anomalies: u32,
        duration_ms: u64,
    },

    // === 동기화 이벤트 ===
    SyncStarted {
        ranges: Vec<PageRange>,
    },
    SyncPageStarted {
        physical_page: u32,
    },
    SyncPageCompleted {
        physical_page: u32,
        counts: SyncPageCounts,
    },
    SyncWarning {
        code: String,
        detail: String,
    },
    SyncCompleted {
        pages_processed: u32,
        counts: SyncPageCounts,
        duration_ms: u64,
        total_pages: Option<u32>,
        items_on_last_page: Option<u32>,
    },

    // === 스냅샷/리포트 ===
    DatabaseStats {
        total_product_details: i64,
        min_page: Option<i32>,
        max_page: Option<i32>,
    },
    SessionReport {
        products_inserted: u32,
        products_updated: u32,
        total_pages: u32,
    },
}

impl LifecycleEvent {
    /// Canonical event name without the `actor-` prefix
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session-started",
            Self::SessionCompleted { .. } => "session-completed",
            Self::SessionFailed { .. } => "session-failed",
            Self::SessionTimeout { .. } => "session-timeout",
            Self::ShutdownCompleted { .. } => "shutdown-completed",
            Self::BatchStarted { .. } => "batch-started",
            Self::BatchCompleted { .. } => "batch-completed",
            Self::BatchFailed { .. } => "batch-failed",
            Self::PageTaskStarted { .. } => "page-task-started",
            Self::PageTaskCompleted { .. } => "page-task-completed",
            Self::PageTaskFailed { .. } => "page-task-failed",
            Self::ProductLifecycle { .. } => "product-lifecycle",
            Self::ProductLifecycleGroup { .. } => "product-lifecycle-group",
            Self::ValidationStarted { .. } => "validation-started",
            Self::ValidationPageScanned { .. } => "validation-page-scanned",
            Self::ValidationDivergence { .. } => "validation-divergence",
            Self::ValidationAnomaly { .. } => "validation-anomaly",
            Self::ValidationCompleted { .. } => "validation-completed",
            Self::SyncStarted { .. } => "sync-started",
            Self::SyncPageStarted { .. } => "sync-page-started",
            Self::SyncPageCompleted { .. } => "sync-page-completed",
            Self::SyncWarning { .. } => "sync-warning",
            Self::SyncCompleted { .. } => "sync-completed",
            Self::DatabaseStats { .. } => "database-stats",
            Self::SessionReport { .. } => "session-report",
        }
    }

    /// Stage whose counters this event moves, if any
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::PageTaskStarted { .. }
            | Self::PageTaskCompleted { .. }
            | Self::PageTaskFailed { .. } => Some(Stage::PageListing),
            Self::ProductLifecycleGroup { phase, .. } => Some(phase.stage()),
            Self::ValidationPageScanned { .. } => Some(Stage::Validation),
            Self::SyncPageStarted { .. } | Self::SyncPageCompleted { .. } => Some(Stage::Sync),
            _ => None,
        }
    }

    /// Unit status for per-unit and group events
    pub const fn unit_status(&self) -> Option<UnitStatus> {
        match self {
            Self::BatchStarted { .. } | Self::PageTaskStarted { .. } | Self::SyncPageStarted { .. } => {
                Some(UnitStatus::Started)
            }
            Self::BatchCompleted { .. }
            | Self::PageTaskCompleted { .. }
            | Self::ValidationPageScanned { .. }
            | Self::SyncPageCompleted { .. } => Some(UnitStatus::Completed),
            Self::BatchFailed { .. } | Self::PageTaskFailed { .. } => Some(UnitStatus::Failed),
            Self::ProductLifecycleGroup { .. } => Some(UnitStatus::GroupReport),
            _ => None,
        }
    }

    /// Session id carried by a session boundary event
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionStarted { session_id }
            | Self::SessionCompleted { session_id }
            | Self::SessionFailed { session_id, .. }
            | Self::SessionTimeout { session_id }
            | Self::ShutdownCompleted { session_id } => session_id.as_deref(),
            _ => None,
        }
    }
}
