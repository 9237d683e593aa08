//! Data Transfer Objects for backend commands
//!
//! Request/response shapes of the crawling engine's commands. The engine owns
//! their semantics; fields the monitor does not read are kept only where the
//! UI displays them, everything else is tolerated via `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::domain::{DiagnosticGroupSummary, RepairEntry};

// ============================================================================
// Range planning (calculate_crawling_range)
// ============================================================================

/// Request for calculating crawling range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CrawlingRangeRequest {
    pub total_pages_on_site: u32,
    pub products_on_last_page: u32,
}

/// Crawling strategy information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CrawlingInfo {
    pub pages_to_crawl: Option<u32>,
    pub estimated_new_products: Option<u32>,
    pub strategy: String, // "full", "partial", "none"
}

/// 개별 배치 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchInfo {
    pub batch_id: u32,
    pub pages: Vec<u32>,
    pub estimated_products: u32,
}

/// CrawlingPlanner가 계산한 배치 계획 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchPlan {
    pub batch_size: u32,
    pub total_batches: u32,
    pub concurrency_limit: u32,
    #[serde(default)]
    pub batches: Vec<BatchInfo>,
    #[serde(default)]
    pub execution_strategy: String, // "concurrent", "sequential", "mixed"
    #[serde(default)]
    pub estimated_duration_seconds: u32,
}

/// Response for crawling range calculation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CrawlingRangeResponse {
    /// (start_oldest, end_newest)
    pub range: Option<(u32, u32)>,
    #[serde(default)]
    pub crawling_info: CrawlingInfo,
    #[serde(default)]
    pub batch_plan: BatchPlan,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartValidationRequest {
    /// oldest (larger number)
    pub start_physical_page: u32,
    /// newest (smaller number)
    pub end_physical_page: u32,
    pub scan_pages: u32,
    pub ranges_expr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationSummary {
    pub pages_scanned: u32,
    pub products_checked: u64,
    pub divergences: u32,
    pub anomalies: u32,
    pub duration_ms: u64,
    #[serde(default)]
    pub total_pages_site: u32,
    #[serde(default)]
    pub items_on_last_page: u32,
    #[serde(default)]
    pub resolved_start_oldest: u32,
    #[serde(default)]
    pub resolved_end_newest: u32,
}

// ============================================================================
// Sync
// ============================================================================

// Minimal summary returned by sync commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncSummary {
    pub pages_processed: u32,
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
    pub duration_ms: u64,
}

/// Diagnostic input: specific pages and slot indices to repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticPageInput {
    pub physical_page: u32,
    pub miss_indices: Vec<u32>,
}

impl From<&RepairEntry> for DiagnosticPageInput {
    fn from(entry: &RepairEntry) -> Self {
        Self {
            physical_page: entry.physical_page,
            miss_indices: entry.missing_slot_indices.clone(),
        }
    }
}

// ============================================================================
// Diagnostics (scan_db_pagination_mismatches)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbPaginationMismatchReport {
    pub total_products: u64,
    #[serde(default)]
    pub max_page_id_db: Option<i32>,
    #[serde(default)]
    pub total_pages_site: Option<u32>,
    #[serde(default)]
    pub items_on_last_page: Option<u32>,
    #[serde(default)]
    pub group_summaries: Vec<DiagnosticGroupSummary>,
}

impl DbPaginationMismatchReport {
    /// Site page count to clip repairs against. Falls back to the DB-derived
    /// value (`max_page_id + 1`) and then to the largest resolved page.
    pub fn effective_total_pages(&self) -> u32 {
        if let Some(tp) = self.total_pages_site.filter(|tp| *tp > 0) {
            return tp;
        }
        if let Some(pid) = self.max_page_id_db.and_then(|p| u32::try_from(p).ok()) {
            return pid.saturating_add(1);
        }
        self.group_summaries
            .iter()
            .filter_map(|g| g.current_page_number)
            .max()
            .unwrap_or(0)
    }
}
