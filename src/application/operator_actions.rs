//! 운영자 명령 경로 (검증 / 부분 동기화 / 진단 복구 / 종료 요청)
//!
//! 범위 입력은 항상 파싱 → 사이트 경계 보정 → 최대 스팬 보정을 거친 뒤에만
//! 백엔드로 전달됩니다. 결과가 비면 백엔드 호출 없이 중단합니다.
//! 명령 응답은 집계 상태를 건드리지 않습니다 (집계는 이벤트로만 변경).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::backend::{BackendError, CrawlerBackend};
use super::dto::{
    DbPaginationMismatchReport, DiagnosticPageInput, StartValidationRequest, SyncSummary,
    ValidationSummary,
};
use crate::domain::page_range::{
    clamp_to_max_span, clamp_to_site_bounds, page_count, parse_expression, ranges_from_pages,
    serialize,
};
use crate::domain::{DiagnosticsReconciler, PageRange, RepairAssessment};
use crate::infrastructure::config::RangePolicyConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("No valid page range in '{input}'")]
    EmptyRange { input: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ActionStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum NoticeKind {
    SiteBounds,
    MaxSpan,
}

/// Informational correction applied to an operator's range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RangeNotice {
    pub kind: NoticeKind,
    pub before: String,
    pub after: String,
}

/// Range input after parsing and corrections; `expression` replaces the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PreparedRange {
    pub ranges: Vec<PageRange>,
    pub expression: String,
    pub notices: Vec<RangeNotice>,
}

impl PreparedRange {
    pub fn page_count(&self) -> u32 {
        page_count(&self.ranges)
    }
}

/// Parses and corrects an operator's range expression.
///
/// `total_pages` is applied only when known. `max_span` of 0 disables the span clamp.
pub fn prepare_range(
    input: &str,
    total_pages: Option<u32>,
    max_span: u32,
) -> Result<PreparedRange, ActionError> {
    let mut ranges = parse_expression(input);
    if ranges.is_empty() {
        warn!(input, "⚠️ range expression has no valid token");
        return Err(ActionError::EmptyRange {
            input: input.to_string(),
        });
    }
    let mut notices = Vec::new();

    if let Some(total) = total_pages.filter(|t| *t > 0) {
        let outcome = clamp_to_site_bounds(&ranges, total);
        if outcome.changed {
            let notice = RangeNotice {
                kind: NoticeKind::SiteBounds,
                before: serialize(&ranges),
                after: serialize(&outcome.ranges),
            };
            warn!(before = %notice.before, after = %notice.after, total_pages = total, "range clamped to site bounds");
            notices.push(notice);
            ranges = outcome.ranges;
        }
    }

    let outcome = clamp_to_max_span(&ranges, max_span);
    if outcome.changed {
        let notice = RangeNotice {
            kind: NoticeKind::MaxSpan,
            before: serialize(&ranges),
            after: serialize(&outcome.ranges),
        };
        warn!(before = %notice.before, after = %notice.after, max_span, "range clamped to max span");
        notices.push(notice);
        ranges = outcome.ranges;
    }

    Ok(PreparedRange {
        expression: serialize(&ranges),
        ranges,
        notices,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    /// Page-level partial sync over the coarse range
    Coarse,
    /// Slot-level diagnostic sync
    Precise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    NoRepairNeeded,
    Dispatched {
        mode: RepairMode,
        expression: String,
        summary: SyncSummary,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLaunch {
    pub prepared: PreparedRange,
    pub summary: ValidationSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLaunch {
    pub prepared: PreparedRange,
    pub summary: SyncSummary,
}

/// Operator command surface over the backend port
pub struct OperatorActions<B: CrawlerBackend> {
    backend: Arc<B>,
    policy: RangePolicyConfig,
    reconciler: DiagnosticsReconciler,
    status: ActionStatus,
    last_report: Option<DbPaginationMismatchReport>,
}

impl<B: CrawlerBackend> OperatorActions<B> {
    pub fn new(backend: Arc<B>, policy: RangePolicyConfig) -> Self {
        Self {
            backend,
            reconciler: DiagnosticsReconciler::new(policy.items_per_page),
            policy,
            status: ActionStatus::Idle,
            last_report: None,
        }
    }

    pub const fn status(&self) -> ActionStatus {
        self.status
    }

    pub const fn last_report(&self) -> Option<&DbPaginationMismatchReport> {
        self.last_report.as_ref()
    }

    fn finish<T>(&mut self, action: &str, result: Result<T, BackendError>) -> Result<T, ActionError> {
        match result {
            Ok(value) => {
                self.status = ActionStatus::Succeeded;
                Ok(value)
            }
            Err(e) => {
                error!(action, error = %e, "❌ backend command failed");
                self.status = ActionStatus::Failed;
                Err(e.into())
            }
        }
    }

    pub async fn start_validation(
        &mut self,
        input: &str,
        total_pages: Option<u32>,
    ) -> Result<ValidationLaunch, ActionError> {
        let prepared = prepare_range(input, total_pages, self.policy.validation_max_span)?;
        let (start, end) = match prepared.ranges.first() {
            Some(first) => (first.start, first.end),
            None => {
                return Err(ActionError::EmptyRange {
                    input: input.to_string(),
                });
            }
        };
        let request = StartValidationRequest {
            start_physical_page: start,
            end_physical_page: end,
            scan_pages: prepared.page_count(),
            ranges_expr: prepared.expression.clone(),
        };
        let action_id = Uuid::new_v4();
        info!(%action_id, ranges = %request.ranges_expr, scan_pages = request.scan_pages, "🔍 starting validation");
        self.status = ActionStatus::Running;
        let result = self.backend.start_validation(request).await;
        let summary = self.finish("start_validation", result)?;
        Ok(ValidationLaunch { prepared, summary })
    }

    pub async fn start_partial_sync(
        &mut self,
        input: &str,
        total_pages: Option<u32>,
        dry_run: bool,
    ) -> Result<SyncLaunch, ActionError> {
        let prepared = prepare_range(input, total_pages, self.policy.sync_max_span)?;
        let action_id = Uuid::new_v4();
        info!(%action_id, ranges = %prepared.expression, dry_run, "🔄 starting partial sync");
        self.status = ActionStatus::Running;
        let result = self
            .backend
            .start_partial_sync(prepared.expression.clone(), dry_run)
            .await;
        let summary = self.finish("start_partial_sync", result)?;
        Ok(SyncLaunch { prepared, summary })
    }

    /// Scans the database and reconciles the report against the site page count.
    pub async fn scan_diagnostics(&mut self) -> Result<RepairAssessment, ActionError> {
        self.status = ActionStatus::Running;
        let result = self.backend.scan_db_pagination_mismatches().await;
        let report = self.finish("scan_db_pagination_mismatches", result)?;
        let total_pages = report.effective_total_pages();
        let assessment = self.reconciler.reconcile(&report.group_summaries, total_pages);
        match &assessment {
            RepairAssessment::NoRepairNeeded => {
                info!(groups = report.group_summaries.len(), "✅ diagnostics: no repair needed");
            }
            RepairAssessment::Repair { coarse, plan } => {
                info!(
                    coarse = %serialize(coarse),
                    pages = plan.entries.len(),
                    slots = plan.total_slots(),
                    "🩺 diagnostics found repair candidates"
                );
            }
        }
        self.last_report = Some(report);
        Ok(assessment)
    }

    /// Runs a fresh scan and dispatches the chosen repair. Nothing actionable
    /// means no command is sent.
    pub async fn repair(&mut self, mode: RepairMode, dry_run: bool) -> Result<RepairOutcome, ActionError> {
        let RepairAssessment::Repair { coarse, plan } = self.scan_diagnostics().await? else {
            return Ok(RepairOutcome::NoRepairNeeded);
        };

        match mode {
            RepairMode::Coarse => {
                let expression = serialize(&coarse);
                self.status = ActionStatus::Running;
                let result = self.backend.start_partial_sync(expression.clone(), dry_run).await;
                let summary = self.finish("start_partial_sync", result)?;
                Ok(RepairOutcome::Dispatched { mode, expression, summary })
            }
            RepairMode::Precise => {
                if plan.is_empty() {
                    info!("diagnostics flagged pages but no missing slots; nothing to repair precisely");
                    return Ok(RepairOutcome::NoRepairNeeded);
                }
                let groups: Vec<DiagnosticPageInput> =
                    plan.entries.iter().map(DiagnosticPageInput::from).collect();
                let expression =
                    serialize(&ranges_from_pages(plan.entries.iter().map(|e| e.physical_page)));
                self.status = ActionStatus::Running;
                let result = self.backend.start_diagnostic_sync(groups, dry_run).await;
                let summary = self.finish("start_diagnostic_sync", result)?;
                Ok(RepairOutcome::Dispatched { mode, expression, summary })
            }
        }
    }

    /// One-way request; completion is only observed through events.
    pub async fn request_shutdown(&self, reason: &str) -> Result<(), ActionError> {
        info!(reason, "🛑 requesting graceful shutdown");
        self.backend
            .request_graceful_shutdown(reason.to_string())
            .await
            .map_err(|e| {
                error!(error = %e, "❌ shutdown request failed");
                ActionError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_range_reports_each_correction() {
        let prepared = prepare_range("510-480", Some(500), 5).expect("prepared");
        assert_eq!(prepared.expression, "500-496");
        assert_eq!(prepared.notices.len(), 2);
        assert_eq!(prepared.notices[0].kind, NoticeKind::SiteBounds);
        assert_eq!(prepared.notices[0].after, "500-480");
        assert_eq!(prepared.notices[1].kind, NoticeKind::MaxSpan);
        assert_eq!(prepared.page_count(), 5);
    }

    #[test]
    fn prepare_range_without_site_total_skips_bounds() {
        let prepared = prepare_range("498-492, 489", None, 0).expect("prepared");
        assert_eq!(prepared.expression, "498-492,489");
        assert!(prepared.notices.is_empty());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            prepare_range(" ,abc, 0 ", Some(100), 10),
            Err(ActionError::EmptyRange {
                input: " ,abc, 0 ".to_string()
            })
        );
    }
}
