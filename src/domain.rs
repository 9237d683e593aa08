//! Domain module - Core business logic and entities
//!
//! Pure types and functions: lifecycle events, page range expressions,
//! pagination mapping and diagnostics reconciliation. Nothing here touches
//! the runtime or any I/O.

pub mod diagnostics;
pub mod events;
pub mod page_range;
pub mod pagination;

// Re-export commonly used items
pub use diagnostics::{
    DiagnosticGroupSummary, DiagnosticsReconciler, RepairAssessment, RepairEntry, RepairPlan,
};
pub use events::{GroupPhase, LifecycleEvent, Stage, SyncPageCounts, UnitId, UnitStatus};
pub use page_range::{ClampOutcome, PageRange, RangeExpression};
pub use pagination::{PRODUCTS_PER_PAGE, PaginationCalculator};
