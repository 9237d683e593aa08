//! 스테이지별 진행 카운터 집계
//!
//! 중복/역순 도착 가능한 이벤트 스트림을 집합 멤버십으로 dedup 하여
//! `{started, completed, failed, retried, inflight}` 를 단조적으로 유지합니다.
//!
//! 불변식 (모든 연산 이후):
//! - `completed + failed <= started`
//! - `inflight = started - (completed + failed)` 는 항상 재계산 (직접 수정 금지)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::domain::{Stage, UnitId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StageCounters {
    pub started: u32,
    pub completed: u32,
    pub failed: u32,
    pub retried: u32,
    pub inflight: u32,
}

impl StageCounters {
    pub const fn holds_invariant(&self) -> bool {
        (self.completed as u64) + (self.failed as u64) <= self.started as u64
            && self.inflight == self.started - self.completed - self.failed
    }
}

#[derive(Debug, Clone)]
pub struct StageAggregator {
    label: &'static str,
    seen: HashSet<UnitId>,
    completed: HashSet<UnitId>,
    final_failed: HashSet<UnitId>,
    attempts: HashMap<UnitId, u32>,
    retried: u32,
    // group-report running totals (per-group accounting, no replay protection)
    group_started: u32,
    group_completed: u32,
    group_failed: u32,
    counters: StageCounters,
}

impl StageAggregator {
    pub fn new(stage: Stage) -> Self {
        Self::labeled(stage.key())
    }

    /// Aggregator for units that are not one of the pipeline stages (e.g. batches).
    pub fn labeled(label: &'static str) -> Self {
        Self {
            label,
            seen: HashSet::new(),
            completed: HashSet::new(),
            final_failed: HashSet::new(),
            attempts: HashMap::new(),
            retried: 0,
            group_started: 0,
            group_completed: 0,
            group_failed: 0,
            counters: StageCounters::default(),
        }
    }

    pub const fn counters(&self) -> StageCounters {
        self.counters
    }

    /// Units that were started more than once (re-dispatched by the engine).
    pub fn restarted_units(&self) -> u32 {
        let n = self.attempts.values().filter(|a| **a > 1).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    pub fn on_started(&mut self, unit: UnitId) {
        let attempts = self.attempts.entry(unit.clone()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        if self.seen.insert(unit) {
            self.recompute();
        }
    }

    pub fn on_completed(&mut self, unit: UnitId) {
        // completion may be observed before its start event
        self.seen.insert(unit.clone());
        if self.completed.insert(unit) {
            self.recompute();
        }
    }

    pub fn on_failed(&mut self, unit: UnitId, final_failure: bool) {
        if final_failure {
            self.seen.insert(unit.clone());
            self.final_failed.insert(unit);
        } else {
            self.retried = self.retried.saturating_add(1);
        }
        self.recompute();
    }

    /// Aggregate report for stages that account per group instead of per unit.
    /// Running totals: a replayed report counts twice.
    pub fn on_group_report(&mut self, group_size: u32, succeeded: u32, failed: u32) {
        let reported = succeeded.saturating_add(failed);
        if reported > group_size {
            warn!(
                stage = self.label,
                group_size, succeeded, failed,
                "group report outcomes exceed group size; widening started"
            );
        }
        self.group_started = self.group_started.saturating_add(group_size.max(reported));
        self.group_completed = self.group_completed.saturating_add(succeeded);
        self.group_failed = self.group_failed.saturating_add(failed);
        self.recompute();
    }

    fn recompute(&mut self) {
        // a late success after a terminal failure counts once, as completed
        let failed_units = self
            .final_failed
            .iter()
            .filter(|u| !self.completed.contains(*u))
            .count();
        let started = to_u32(self.seen.len()).saturating_add(self.group_started);
        // saturated group totals are clamped so completed + failed never exceeds started
        let completed = to_u32(self.completed.len())
            .saturating_add(self.group_completed)
            .min(started);
        let failed = to_u32(failed_units)
            .saturating_add(self.group_failed)
            .min(started - completed);
        let inflight = started - completed - failed;
        self.counters = StageCounters {
            started,
            completed,
            failed,
            retried: self.retried,
            inflight,
        };
        debug!(stage = self.label, counters = ?self.counters, "stage counters recomputed");
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(p: u32) -> UnitId {
        UnitId::Page(p)
    }

    #[test]
    fn completed_is_idempotent() {
        let mut agg = StageAggregator::new(Stage::PageListing);
        agg.on_started(page(7));
        agg.on_completed(page(7));
        let once = agg.counters();
        agg.on_completed(page(7));
        assert_eq!(agg.counters(), once);
        assert_eq!(once.completed, 1);
        assert_eq!(once.inflight, 0);
    }

    #[test]
    fn completion_before_start_is_tolerated() {
        let mut agg = StageAggregator::new(Stage::PageListing);
        agg.on_completed(page(7));
        agg.on_started(page(7));
        let c = agg.counters();
        assert_eq!(c.started, 1);
        assert_eq!(c.completed, 1);
        assert_eq!(c.inflight, 0);
        assert!(c.holds_invariant());
    }

    #[test]
    fn retries_do_not_inflate_started() {
        let mut agg = StageAggregator::new(Stage::PageListing);
        agg.on_started(page(3));
        agg.on_failed(page(3), false);
        agg.on_started(page(3));
        agg.on_failed(page(3), false);
        agg.on_started(page(3));
        agg.on_failed(page(3), true);
        let c = agg.counters();
        assert_eq!(c.started, 1);
        assert_eq!(c.retried, 2);
        assert_eq!(c.failed, 1);
        assert_eq!(c.inflight, 0);
        assert_eq!(agg.restarted_units(), 1);
    }

    #[test]
    fn late_success_after_final_failure_counts_once() {
        let mut agg = StageAggregator::new(Stage::PageListing);
        agg.on_failed(page(9), true);
        agg.on_completed(page(9));
        let c = agg.counters();
        assert_eq!((c.started, c.completed, c.failed), (1, 1, 0));
        assert!(c.holds_invariant());
    }

    #[test]
    fn group_reports_accumulate_running_totals() {
        let mut agg = StageAggregator::new(Stage::DetailFetch);
        agg.on_group_report(12, 10, 2);
        agg.on_group_report(12, 12, 0);
        let c = agg.counters();
        assert_eq!((c.started, c.completed, c.failed, c.inflight), (24, 22, 2, 0));

        // inconsistent report keeps the invariant
        agg.on_group_report(1, 3, 1);
        assert!(agg.counters().holds_invariant());
    }

    #[test]
    fn saturated_group_totals_keep_invariant() {
        let mut agg = StageAggregator::new(Stage::Persist);
        agg.on_group_report(u32::MAX, u32::MAX, 0);
        agg.on_group_report(u32::MAX, 0, u32::MAX);
        let c = agg.counters();
        assert_eq!(c.started, u32::MAX);
        assert_eq!(c.completed, u32::MAX);
        assert_eq!(c.failed, 0);
        assert!(c.holds_invariant());
    }
}
