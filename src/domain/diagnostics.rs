//! DB 페이지네이션 진단 결과 → 복구 범위/계획 도출
//!
//! `scan_db_pagination_mismatches` 보고서의 그룹 요약을 입력으로 받아
//! - 페이지 단위의 거친 복구 범위 (RangeExpression)
//! - 슬롯 단위의 정밀 복구 계획 (RepairPlan)
//! 을 계산합니다. 순수 함수이며 상태를 갖지 않습니다.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ts_rs::TS;

use super::page_range::{ranges_from_pages, RangeExpression};
use super::pagination::PaginationCalculator;

/// One `page_id` group's slot-occupancy health as observed in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticGroupSummary {
    pub page_id: i32,
    #[serde(default)]
    pub current_page_number: Option<u32>,
    pub status: String, // ok | duplicates | holes | sparse_nonterminal | out_of_range | mixed
    #[serde(default)]
    pub duplicate_indices: Vec<i32>,
    #[serde(default)]
    pub missing_indices: Vec<i32>,
    #[serde(default)]
    pub out_of_range_count: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub expected_count: u32,
}

impl DiagnosticGroupSummary {
    pub fn is_problematic(&self) -> bool {
        !self.status.trim().eq_ignore_ascii_case("ok")
            || !self.duplicate_indices.is_empty()
            || !self.missing_indices.is_empty()
            || self.out_of_range_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairEntry {
    pub physical_page: u32,
    pub missing_slot_indices: Vec<u32>,
}

/// Slot-level repair plan, ordered oldest page first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairPlan {
    pub entries: Vec<RepairEntry>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_slots(&self) -> usize {
        self.entries.iter().map(|e| e.missing_slot_indices.len()).sum()
    }
}

/// What the operator path should do with a diagnostics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAssessment {
    NoRepairNeeded,
    Repair {
        coarse: RangeExpression,
        plan: RepairPlan,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsReconciler {
    pagination: PaginationCalculator,
}

impl DiagnosticsReconciler {
    pub fn new(items_per_page: u32) -> Self {
        Self {
            pagination: PaginationCalculator::new(items_per_page),
        }
    }

    /// Fills `current_page_number` from `page_id` where the backend could not
    /// resolve it, using `total_pages - page_id`.
    pub fn with_resolved_pages(
        &self,
        summaries: &[DiagnosticGroupSummary],
        total_pages: u32,
    ) -> Vec<DiagnosticGroupSummary> {
        summaries
            .iter()
            .map(|s| {
                let mut s = s.clone();
                if s.current_page_number.is_none() {
                    s.current_page_number =
                        self.pagination.physical_page_for_group(s.page_id, total_pages);
                }
                s
            })
            .collect()
    }

    /// Page-level repair range: every problematic group's page plus one page
    /// either side (boundary drift), clipped to `[1, total_pages]` and
    /// run-length encoded newest-last. `None` when nothing needs repair.
    pub fn derive_coarse_repair_range(
        &self,
        summaries: &[DiagnosticGroupSummary],
        total_pages: u32,
    ) -> Option<RangeExpression> {
        let mut pages: BTreeSet<u32> = BTreeSet::new();
        for page in summaries
            .iter()
            .filter(|s| s.is_problematic())
            .filter_map(|s| s.current_page_number)
        {
            for candidate in [page.saturating_sub(1), page, page.saturating_add(1)] {
                if candidate >= 1 && candidate <= total_pages {
                    pages.insert(candidate);
                }
            }
        }
        if pages.is_empty() {
            return None;
        }
        Some(ranges_from_pages(pages))
    }

    /// Slot-level plan: one entry per physical page with missing slots inside
    /// the valid slot domain. Groups without a physical page are skipped.
    pub fn derive_slot_repair_plan(&self, summaries: &[DiagnosticGroupSummary]) -> RepairPlan {
        let mut by_page: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for s in summaries {
            let Some(page) = s.current_page_number.filter(|p| *p >= 1) else {
                continue;
            };
            let slots: BTreeSet<u32> = s
                .missing_indices
                .iter()
                .filter_map(|ix| self.pagination.slot_index(*ix))
                .collect();
            if slots.is_empty() {
                continue;
            }
            by_page.entry(page).or_default().extend(slots);
        }
        RepairPlan {
            entries: by_page
                .into_iter()
                .rev()
                .map(|(physical_page, slots)| RepairEntry {
                    physical_page,
                    missing_slot_indices: slots.into_iter().collect(),
                })
                .collect(),
        }
    }

    /// Resolves pages, then derives both views. A report with no problematic
    /// group is `NoRepairNeeded`.
    pub fn reconcile(
        &self,
        summaries: &[DiagnosticGroupSummary],
        total_pages: u32,
    ) -> RepairAssessment {
        let resolved = self.with_resolved_pages(summaries, total_pages);
        let plan = self.derive_slot_repair_plan(&resolved);
        match self.derive_coarse_repair_range(&resolved, total_pages) {
            Some(coarse) => RepairAssessment::Repair { coarse, plan },
            None => RepairAssessment::NoRepairNeeded,
        }
    }
}
