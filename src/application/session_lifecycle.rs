//! 세션 상태 머신 + 대시보드 스냅샷
//!
//! `Idle → Running → {Completed | Failed | TimedOut}` 전이를 관리하고,
//! 종료 전이마다 정확히 한 번 범위 재계산 effect 를 내보냅니다.
//! 세션 시작 시 진행 보드를 통째로 새로 만들어 이전 세션 카운터를 폐기합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use ts_rs::TS;

use super::dto::{CrawlingRangeRequest, CrawlingRangeResponse};
use super::progress_board::{
    DatabaseStatsView, GroupExtras, ProgressBoard, SessionReportView, SyncView, ValidationView,
};
use super::stage_aggregator::StageCounters;
use crate::domain::{GroupPhase, LifecycleEvent, Stage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

/// Last known site shape; survives session resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SiteSnapshot {
    pub total_pages: Option<u32>,
    pub items_on_last_page: Option<u32>,
}

impl SiteSnapshot {
    /// Unknown values are sent as 0 and left to the backend to resolve.
    pub fn range_request(&self) -> CrawlingRangeRequest {
        CrawlingRangeRequest {
            total_pages_on_site: self.total_pages.unwrap_or(0),
            products_on_last_page: self.items_on_last_page.unwrap_or(0),
        }
    }
}

/// Side effect requested by a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEffect {
    RecomputeRange {
        generation: u64,
        request: CrawlingRangeRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StageProgress {
    pub stage: Stage,
    pub label: String,
    pub counters: StageCounters,
    /// Units the engine dispatched more than once
    pub restarted_units: u32,
}

/// Serializable projection pushed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSnapshot {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub generation: u64,
    pub stages: Vec<StageProgress>,
    pub batches: StageCounters,
    pub planned_batch_pages: u32,
    pub failed_products: u32,
    pub fetch_extras: GroupExtras,
    pub persist_extras: GroupExtras,
    pub validation: ValidationView,
    pub sync: SyncView,
    pub database_stats: Option<DatabaseStatsView>,
    pub session_report: Option<SessionReportView>,
    pub site: SiteSnapshot,
    pub next_plan: Option<CrawlingRangeResponse>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionLifecycleController {
    state: SessionState,
    session_id: Option<String>,
    generation: u64,
    board: ProgressBoard,
    site: SiteSnapshot,
    next_plan: Option<CrawlingRangeResponse>,
    last_error: Option<String>,
}

impl SessionLifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Incremented on every session start; tags outbound plan requests.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn board(&self) -> &ProgressBoard {
        &self.board
    }

    pub const fn site(&self) -> SiteSnapshot {
        self.site
    }

    pub const fn next_plan(&self) -> Option<&CrawlingRangeResponse> {
        self.next_plan.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn counters(&self, stage: Stage) -> StageCounters {
        self.board.counters(stage)
    }

    /// Seeds the site snapshot from an out-of-band source (e.g. a status check).
    pub fn update_site(&mut self, total_pages: Option<u32>, items_on_last_page: Option<u32>) {
        if let Some(tp) = total_pages.filter(|tp| *tp > 0) {
            self.site.total_pages = Some(tp);
        }
        if let Some(items) = items_on_last_page {
            self.site.items_on_last_page = Some(items);
        }
    }

    pub fn apply(&mut self, event: &LifecycleEvent) -> Vec<LifecycleEffect> {
        match event {
            LifecycleEvent::SessionStarted { session_id } => {
                self.start_session(session_id.clone());
                Vec::new()
            }
            LifecycleEvent::SessionCompleted { .. } => {
                self.finish(SessionState::Completed, event, None)
            }
            LifecycleEvent::SessionFailed { error, .. } => {
                self.finish(SessionState::Failed, event, error.clone())
            }
            // an acknowledged shutdown ends the session the same way a timeout does
            LifecycleEvent::SessionTimeout { .. } | LifecycleEvent::ShutdownCompleted { .. } => {
                self.finish(SessionState::TimedOut, event, None)
            }
            other => {
                match other {
                    LifecycleEvent::SessionReport { total_pages, .. } => {
                        self.update_site(Some(*total_pages), None);
                    }
                    LifecycleEvent::SyncCompleted {
                        total_pages,
                        items_on_last_page,
                        ..
                    } => self.update_site(*total_pages, *items_on_last_page),
                    _ => {}
                }
                if self.state != SessionState::Running {
                    trace!(event = other.name(), state = ?self.state, "event outside a running session");
                }
                self.board.apply(other);
                Vec::new()
            }
        }
    }

    /// Stores a plan response; responses from an earlier session are dropped.
    pub fn accept_plan(&mut self, generation: u64, response: CrawlingRangeResponse) -> bool {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "stale crawling plan dropped"
            );
            return false;
        }
        info!(range = ?response.range, strategy = %response.crawling_info.strategy, "📋 next crawling plan received");
        self.next_plan = Some(response);
        true
    }

    fn start_session(&mut self, session_id: Option<String>) {
        if self.state == SessionState::Running {
            warn!(
                previous = ?self.session_id,
                "session started while another was running; discarding its progress"
            );
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = SessionState::Running;
        self.session_id = session_id;
        self.board = ProgressBoard::new();
        self.next_plan = None;
        self.last_error = None;
        info!(session_id = ?self.session_id, generation = self.generation, "🚀 session started");
    }

    fn finish(
        &mut self,
        target: SessionState,
        event: &LifecycleEvent,
        error: Option<String>,
    ) -> Vec<LifecycleEffect> {
        if self.state != SessionState::Running {
            trace!(event = event.name(), state = ?self.state, "terminal event ignored");
            return Vec::new();
        }
        // a late terminal event from an earlier session must not end this one
        if let (Some(incoming), Some(current)) = (event.session_id(), self.session_id.as_deref()) {
            if incoming != current {
                debug!(
                    event = event.name(),
                    incoming,
                    current,
                    "terminal event for another session ignored"
                );
                return Vec::new();
            }
        }
        self.state = target;
        self.last_error = error;
        if let Some(err) = &self.last_error {
            warn!(session_id = ?self.session_id, error = %err, "❌ session failed");
        } else {
            info!(session_id = ?self.session_id, state = ?target, "✅ session finished");
        }
        vec![LifecycleEffect::RecomputeRange {
            generation: self.generation,
            request: self.site.range_request(),
        }]
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let stages = Stage::ALL
            .iter()
            .map(|stage| StageProgress {
                stage: *stage,
                label: stage.to_string(),
                counters: self.board.counters(*stage),
                restarted_units: self.board.aggregator(*stage).restarted_units(),
            })
            .collect();
        DashboardSnapshot {
            state: self.state,
            session_id: self.session_id.clone(),
            generation: self.generation,
            stages,
            batches: self.board.batches().counters(),
            planned_batch_pages: self.board.planned_batch_pages(),
            failed_products: self.board.failed_products(),
            fetch_extras: self.board.group_extras(GroupPhase::Fetch),
            persist_extras: self.board.group_extras(GroupPhase::Persist),
            validation: self.board.validation_view(),
            sync: self.board.sync_view(),
            database_stats: self.board.database_stats(),
            session_report: self.board.session_report(),
            site: self.site,
            next_plan: self.next_plan.clone(),
            last_error: self.last_error.clone(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> LifecycleEvent {
        LifecycleEvent::SessionStarted {
            session_id: Some(id.to_string()),
        }
    }

    #[test]
    fn session_start_resets_progress() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        ctl.apply(&LifecycleEvent::PageTaskStarted { page: 1 });
        ctl.apply(&LifecycleEvent::PageTaskCompleted { page: 1 });
        assert_eq!(ctl.counters(Stage::PageListing).completed, 1);

        ctl.apply(&LifecycleEvent::SessionCompleted { session_id: None });
        ctl.apply(&started("s2"));
        assert_eq!(ctl.state(), SessionState::Running);
        assert_eq!(ctl.counters(Stage::PageListing), StageCounters::default());
        assert_eq!(ctl.session_id(), Some("s2"));
        assert_eq!(ctl.generation(), 2);
    }

    #[test]
    fn terminal_transition_emits_exactly_one_recompute() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        ctl.apply(&LifecycleEvent::SyncCompleted {
            pages_processed: 2,
            counts: Default::default(),
            duration_ms: 10,
            total_pages: Some(498),
            items_on_last_page: Some(7),
        });
        let effects = ctl.apply(&LifecycleEvent::SessionTimeout { session_id: None });
        assert_eq!(
            effects,
            vec![LifecycleEffect::RecomputeRange {
                generation: 1,
                request: CrawlingRangeRequest {
                    total_pages_on_site: 498,
                    products_on_last_page: 7,
                },
            }]
        );
        assert_eq!(ctl.state(), SessionState::TimedOut);

        // duplicate terminal / shutdown after terminal: no effect
        assert!(ctl.apply(&LifecycleEvent::ShutdownCompleted { session_id: None }).is_empty());
        assert_eq!(ctl.state(), SessionState::TimedOut);
    }

    #[test]
    fn shutdown_ack_times_out_running_session() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        let effects = ctl.apply(&LifecycleEvent::ShutdownCompleted { session_id: None });
        assert_eq!(effects.len(), 1);
        assert_eq!(ctl.state(), SessionState::TimedOut);
    }

    #[test]
    fn terminal_while_idle_is_ignored() {
        let mut ctl = SessionLifecycleController::new();
        let effects = ctl.apply(&LifecycleEvent::SessionFailed {
            session_id: None,
            error: Some("boom".into()),
        });
        assert!(effects.is_empty());
        assert_eq!(ctl.state(), SessionState::Idle);
        assert!(ctl.last_error().is_none());
    }

    #[test]
    fn failure_records_error_message() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        let effects = ctl.apply(&LifecycleEvent::SessionFailed {
            session_id: None,
            error: Some("site unreachable".into()),
        });
        assert_eq!(effects.len(), 1);
        assert_eq!(ctl.state(), SessionState::Failed);
        assert_eq!(ctl.last_error(), Some("site unreachable"));
    }

    #[test]
    fn stale_plan_is_dropped() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        ctl.apply(&LifecycleEvent::SessionCompleted { session_id: None });
        ctl.apply(&started("s2"));
        let resp = CrawlingRangeResponse {
            range: Some((20, 11)),
            ..Default::default()
        };
        assert!(!ctl.accept_plan(1, resp.clone()));
        assert!(ctl.next_plan().is_none());
        assert!(ctl.accept_plan(2, resp));
        assert_eq!(ctl.snapshot().next_plan.and_then(|p| p.range), Some((20, 11)));
    }

    #[test]
    fn late_terminal_from_previous_session_is_ignored() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        ctl.apply(&started("s2"));
        let effects = ctl.apply(&LifecycleEvent::SessionCompleted {
            session_id: Some("s1".into()),
        });
        assert!(effects.is_empty());
        assert_eq!(ctl.state(), SessionState::Running);

        let effects = ctl.apply(&LifecycleEvent::SessionCompleted {
            session_id: Some("s2".into()),
        });
        assert_eq!(effects.len(), 1);
        assert_eq!(ctl.state(), SessionState::Completed);
    }

    #[test]
    fn terminal_without_session_id_ends_current_session() {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&started("s1"));
        let effects = ctl.apply(&LifecycleEvent::SessionTimeout { session_id: None });
        assert_eq!(effects.len(), 1);
        assert_eq!(ctl.state(), SessionState::TimedOut);
    }

    #[test]
    fn snapshot_lists_every_stage_in_order() {
        let ctl = SessionLifecycleController::new();
        let snap = ctl.snapshot();
        let stages: Vec<Stage> = snap.stages.iter().map(|s| s.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert_eq!(snap.state, SessionState::Idle);
    }
}
