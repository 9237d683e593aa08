//! 세션 단위 진행 보드 (reducer)
//!
//! 한 세션 동안의 모든 스테이지 집계기와 검증/동기화 부가 집계를 소유합니다.
//! 세션 시작 시 새로 만들어지고, 이벤트 하나당 `apply` 한 번으로만 변경됩니다.
//! 세션 경계 이벤트는 `SessionLifecycleController` 가 처리하므로 여기서는 무시합니다.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use ts_rs::TS;

use super::stage_aggregator::{StageAggregator, StageCounters};
use crate::domain::page_range::{normalize, page_count, serialize};
use crate::domain::{GroupPhase, LifecycleEvent, PageRange, Stage, SyncPageCounts, UnitId};

/// Extras reported alongside group outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupExtras {
    pub groups: u32,
    pub duplicates: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationRunSummary {
    pub pages_scanned: u32,
    pub divergences: u32,
    pub anomalies: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncRunSummary {
    pub pages_processed: u32,
    pub counts: SyncPageCounts,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DatabaseStatsView {
    pub total_product_details: i64,
    pub min_page: Option<i32>,
    pub max_page: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionReportView {
    pub products_inserted: u32,
    pub products_updated: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default)]
struct ValidationTally {
    scan_pages_planned: u32,
    products_found: HashMap<u32, u32>,
    divergences: HashSet<(u32, String, Option<u64>)>,
    anomalies: HashSet<(String, String)>,
    last_run: Option<ValidationRunSummary>,
}

#[derive(Debug, Clone, Default)]
struct SyncTally {
    planned_pages: u32,
    ranges_expr: Option<String>,
    planned_ranges: Vec<PageRange>,
    off_plan_pages: HashSet<u32>,
    per_page: HashMap<u32, SyncPageCounts>,
    warnings: u32,
    last_run: Option<SyncRunSummary>,
}

/// Projection of validation progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationView {
    pub scan_pages_planned: u32,
    pub products_found: u32,
    pub divergences: u32,
    pub anomalies: u32,
    pub last_run: Option<ValidationRunSummary>,
}

/// Projection of sync progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncView {
    pub planned_pages: u32,
    pub ranges_expr: Option<String>,
    /// Synced pages not covered by any announced range
    pub off_plan_pages: u32,
    pub totals: SyncPageCounts,
    pub warnings: u32,
    pub last_run: Option<SyncRunSummary>,
}

#[derive(Debug, Clone)]
pub struct ProgressBoard {
    page_listing: StageAggregator,
    detail_fetch: StageAggregator,
    validation: StageAggregator,
    persist: StageAggregator,
    sync: StageAggregator,
    batches: StageAggregator,
    batch_pages: HashMap<String, u32>,
    failed_products: HashSet<String>,
    fetch_extras: GroupExtras,
    persist_extras: GroupExtras,
    validation_tally: ValidationTally,
    sync_tally: SyncTally,
    database_stats: Option<DatabaseStatsView>,
    session_report: Option<SessionReportView>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self {
            page_listing: StageAggregator::new(Stage::PageListing),
            detail_fetch: StageAggregator::new(Stage::DetailFetch),
            validation: StageAggregator::new(Stage::Validation),
            persist: StageAggregator::new(Stage::Persist),
            sync: StageAggregator::new(Stage::Sync),
            batches: StageAggregator::labeled("batches"),
            batch_pages: HashMap::new(),
            failed_products: HashSet::new(),
            fetch_extras: GroupExtras::default(),
            persist_extras: GroupExtras::default(),
            validation_tally: ValidationTally::default(),
            sync_tally: SyncTally::default(),
            database_stats: None,
            session_report: None,
        }
    }

    pub const fn aggregator(&self, stage: Stage) -> &StageAggregator {
        match stage {
            Stage::PageListing => &self.page_listing,
            Stage::DetailFetch => &self.detail_fetch,
            Stage::Validation => &self.validation,
            Stage::Persist => &self.persist,
            Stage::Sync => &self.sync,
        }
    }

    fn aggregator_mut(&mut self, stage: Stage) -> &mut StageAggregator {
        match stage {
            Stage::PageListing => &mut self.page_listing,
            Stage::DetailFetch => &mut self.detail_fetch,
            Stage::Validation => &mut self.validation,
            Stage::Persist => &mut self.persist,
            Stage::Sync => &mut self.sync,
        }
    }

    pub const fn counters(&self, stage: Stage) -> StageCounters {
        self.aggregator(stage).counters()
    }

    pub const fn batches(&self) -> &StageAggregator {
        &self.batches
    }

    /// Pages announced by `batch-started`, counted once per batch id
    pub fn planned_batch_pages(&self) -> u32 {
        self.batch_pages.values().copied().fold(0u32, u32::saturating_add)
    }

    pub fn failed_products(&self) -> u32 {
        u32::try_from(self.failed_products.len()).unwrap_or(u32::MAX)
    }

    pub const fn group_extras(&self, phase: GroupPhase) -> GroupExtras {
        match phase {
            GroupPhase::Fetch => self.fetch_extras,
            GroupPhase::Persist => self.persist_extras,
        }
    }

    pub const fn database_stats(&self) -> Option<DatabaseStatsView> {
        self.database_stats
    }

    pub const fn session_report(&self) -> Option<SessionReportView> {
        self.session_report
    }

    pub fn validation_view(&self) -> ValidationView {
        let t = &self.validation_tally;
        ValidationView {
            scan_pages_planned: t.scan_pages_planned,
            products_found: t.products_found.values().copied().fold(0u32, u32::saturating_add),
            divergences: u32::try_from(t.divergences.len()).unwrap_or(u32::MAX),
            anomalies: u32::try_from(t.anomalies.len()).unwrap_or(u32::MAX),
            last_run: t.last_run,
        }
    }

    pub fn sync_view(&self) -> SyncView {
        let t = &self.sync_tally;
        let mut totals = SyncPageCounts::default();
        for counts in t.per_page.values() {
            totals.accumulate(counts);
        }
        SyncView {
            planned_pages: t.planned_pages,
            ranges_expr: t.ranges_expr.clone(),
            off_plan_pages: u32::try_from(t.off_plan_pages.len()).unwrap_or(u32::MAX),
            totals,
            warnings: t.warnings,
            last_run: t.last_run,
        }
    }

    fn note_sync_page(&mut self, page: u32) {
        let t = &mut self.sync_tally;
        if t.planned_ranges.is_empty() || t.planned_ranges.iter().any(|r| r.contains(page)) {
            return;
        }
        if t.off_plan_pages.insert(page) {
            debug!(page, ranges = ?t.ranges_expr, "sync page outside announced ranges");
        }
    }

    /// Reduces one non-session event into the board.
    pub fn apply(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::SessionStarted { .. }
            | LifecycleEvent::SessionCompleted { .. }
            | LifecycleEvent::SessionFailed { .. }
            | LifecycleEvent::SessionTimeout { .. }
            | LifecycleEvent::ShutdownCompleted { .. } => {
                trace!(event = event.name(), "session boundary ignored by board");
            }

            LifecycleEvent::BatchStarted { batch_id, pages_in_batch } => {
                if let Some(pages) = pages_in_batch {
                    self.batch_pages.insert(batch_id.clone(), *pages);
                }
                self.batches.on_started(UnitId::Key(batch_id.clone()));
            }
            LifecycleEvent::BatchCompleted { batch_id } => {
                self.batches.on_completed(UnitId::Key(batch_id.clone()));
            }
            LifecycleEvent::BatchFailed { batch_id, final_failure } => {
                self.batches.on_failed(UnitId::Key(batch_id.clone()), *final_failure);
            }

            LifecycleEvent::PageTaskStarted { page } => {
                self.page_listing.on_started(UnitId::Page(*page));
            }
            LifecycleEvent::PageTaskCompleted { page } => {
                self.page_listing.on_completed(UnitId::Page(*page));
            }
            LifecycleEvent::PageTaskFailed { page, final_failure } => {
                self.page_listing.on_failed(UnitId::Page(*page), *final_failure);
            }

            LifecycleEvent::ProductLifecycle { product_ref, page, status } => {
                if status.trim().eq_ignore_ascii_case("failed") {
                    let key = product_ref
                        .clone()
                        .or_else(|| page.map(|p| format!("page:{p}")));
                    if let Some(key) = key {
                        self.failed_products.insert(key);
                    }
                }
            }
            LifecycleEvent::ProductLifecycleGroup {
                phase,
                group_size,
                succeeded,
                failed,
                duplicates,
                duration_ms,
                ..
            } => {
                self.aggregator_mut(phase.stage())
                    .on_group_report(*group_size, *succeeded, *failed);
                let extras = match phase {
                    GroupPhase::Fetch => &mut self.fetch_extras,
                    GroupPhase::Persist => &mut self.persist_extras,
                };
                extras.groups = extras.groups.saturating_add(1);
                extras.duplicates = extras.duplicates.saturating_add(*duplicates);
                extras.duration_ms = extras.duration_ms.saturating_add(*duration_ms);
            }

            LifecycleEvent::ValidationStarted { scan_pages } => {
                let t = &mut self.validation_tally;
                t.scan_pages_planned = t.scan_pages_planned.saturating_add(*scan_pages);
            }
            LifecycleEvent::ValidationPageScanned { physical_page, products_found } => {
                let unit = UnitId::Page(*physical_page);
                self.validation.on_started(unit.clone());
                self.validation.on_completed(unit);
                self.validation_tally
                    .products_found
                    .insert(*physical_page, *products_found);
            }
            LifecycleEvent::ValidationDivergence { physical_page, kind, expected_offset } => {
                self.validation_tally
                    .divergences
                    .insert((*physical_page, kind.clone(), *expected_offset));
            }
            LifecycleEvent::ValidationAnomaly { code, detail } => {
                self.validation_tally
                    .anomalies
                    .insert((code.clone(), detail.clone()));
            }
            LifecycleEvent::ValidationCompleted {
                pages_scanned,
                divergences,
                anomalies,
                duration_ms,
            } => {
                self.validation_tally.last_run = Some(ValidationRunSummary {
                    pages_scanned: *pages_scanned,
                    divergences: *divergences,
                    anomalies: *anomalies,
                    duration_ms: *duration_ms,
                });
            }

            LifecycleEvent::SyncStarted { ranges } => {
                let t = &mut self.sync_tally;
                t.planned_pages = t.planned_pages.saturating_add(page_count(ranges));
                t.planned_ranges.extend(ranges.iter().copied());
                t.ranges_expr = Some(serialize(&normalize(&t.planned_ranges)));
            }
            LifecycleEvent::SyncPageStarted { physical_page } => {
                self.note_sync_page(*physical_page);
                self.sync.on_started(UnitId::Page(*physical_page));
            }
            LifecycleEvent::SyncPageCompleted { physical_page, counts } => {
                self.note_sync_page(*physical_page);
                self.sync.on_completed(UnitId::Page(*physical_page));
                // keyed by page: a replayed completion overwrites instead of adding
                self.sync_tally.per_page.insert(*physical_page, *counts);
            }
            LifecycleEvent::SyncWarning { code, .. } => {
                debug!(code = %code, "sync warning recorded");
                self.sync_tally.warnings = self.sync_tally.warnings.saturating_add(1);
            }
            LifecycleEvent::SyncCompleted {
                pages_processed,
                counts,
                duration_ms,
                ..
            } => {
                self.sync_tally.last_run = Some(SyncRunSummary {
                    pages_processed: *pages_processed,
                    counts: *counts,
                    duration_ms: *duration_ms,
                });
            }

            LifecycleEvent::DatabaseStats {
                total_product_details,
                min_page,
                max_page,
            } => {
                self.database_stats = Some(DatabaseStatsView {
                    total_product_details: *total_product_details,
                    min_page: *min_page,
                    max_page: *max_page,
                });
            }
            LifecycleEvent::SessionReport {
                products_inserted,
                products_updated,
                total_pages,
            } => {
                self.session_report = Some(SessionReportView {
                    products_inserted: *products_inserted,
                    products_updated: *products_updated,
                    total_pages: *total_pages,
                });
            }
        }
    }
}
