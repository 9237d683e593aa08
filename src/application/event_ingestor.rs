//! Actor 이벤트 디코더
//!
//! 브리지가 전달한 `(name, payload)` 를 `LifecycleEvent` 로 변환합니다.
//! 디코딩은 전역적(total)입니다: 알 수 없는 이름이나 필수 필드 누락은
//! `None` 으로 떨어지고 trace 로그만 남깁니다. 상태를 갖지 않습니다.

use serde_json::Value;
use tracing::{debug, trace};

use super::session_lifecycle::{LifecycleEffect, SessionLifecycleController};
use crate::domain::{GroupPhase, LifecycleEvent, PageRange, SyncPageCounts};

const EVENT_PREFIX: &str = "actor-";

#[derive(Debug, Clone, Copy, Default)]
pub struct EventIngestor;

impl EventIngestor {
    /// Decodes one raw event; `None` means "ignore".
    pub fn decode(name: &str, payload: &Value) -> Option<LifecycleEvent> {
        let short = name.trim().strip_prefix(EVENT_PREFIX).unwrap_or_else(|| name.trim());
        let f = Fields(payload);
        let event = match short {
            "session-started" => LifecycleEvent::SessionStarted {
                session_id: f.string("session_id"),
            },
            "session-completed" => LifecycleEvent::SessionCompleted {
                session_id: f.string("session_id"),
            },
            "session-failed" => LifecycleEvent::SessionFailed {
                session_id: f.string("session_id"),
                error: f.string("error"),
            },
            "session-timeout" => LifecycleEvent::SessionTimeout {
                session_id: f.string("session_id"),
            },
            "shutdown-completed" => LifecycleEvent::ShutdownCompleted {
                session_id: f.string("session_id"),
            },

            "batch-started" => LifecycleEvent::BatchStarted {
                batch_id: f.string("batch_id")?,
                pages_in_batch: f.u32("pages_in_batch").or_else(|| f.u32("pages_count")),
            },
            "batch-completed" => LifecycleEvent::BatchCompleted {
                batch_id: f.string("batch_id")?,
            },
            "batch-failed" => LifecycleEvent::BatchFailed {
                batch_id: f.string("batch_id")?,
                final_failure: f.flag("final_failure"),
            },

            "page-task-started" => LifecycleEvent::PageTaskStarted { page: f.page("page")? },
            "page-task-completed" => LifecycleEvent::PageTaskCompleted { page: f.page("page")? },
            "page-task-failed" => LifecycleEvent::PageTaskFailed {
                page: f.page("page")?,
                final_failure: f.flag("final_failure"),
            },

            "product-lifecycle" => LifecycleEvent::ProductLifecycle {
                product_ref: f.string("product_ref"),
                page: f.page("page_number").or_else(|| f.page("page")),
                status: f.string("status")?,
            },
            "product-lifecycle-group" => LifecycleEvent::ProductLifecycleGroup {
                phase: GroupPhase::parse(f.str("phase")?)?,
                page: f.page("page_number").or_else(|| f.page("page")),
                group_size: f.u32("group_size")?,
                succeeded: f.u32("succeeded").unwrap_or(0),
                failed: f.u32("failed").unwrap_or(0),
                duplicates: f.u32("duplicates").unwrap_or(0),
                duration_ms: f.u64("duration_ms").unwrap_or(0),
            },

            "validation-started" => LifecycleEvent::ValidationStarted {
                scan_pages: f.u32("scan_pages").unwrap_or(0),
            },
            "validation-page-scanned" => LifecycleEvent::ValidationPageScanned {
                physical_page: f.page("physical_page")?,
                products_found: f.u32("products_found").unwrap_or(0),
            },
            "validation-divergence" | "validation-divergence-found" => {
                LifecycleEvent::ValidationDivergence {
                    physical_page: f.page("physical_page")?,
                    kind: f.string("kind").unwrap_or_else(|| "unknown".to_string()),
                    expected_offset: f.u64("expected_offset"),
                }
            }
            "validation-anomaly" => LifecycleEvent::ValidationAnomaly {
                code: f.string("code")?,
                detail: f.string("detail").unwrap_or_default(),
            },
            "validation-completed" => LifecycleEvent::ValidationCompleted {
                pages_scanned: f.u32("pages_scanned").unwrap_or(0),
                divergences: f.u32("divergences").unwrap_or(0),
                anomalies: f.u32("anomalies").unwrap_or(0),
                duration_ms: f.u64("duration_ms").unwrap_or(0),
            },

            "sync-started" => LifecycleEvent::SyncStarted {
                ranges: f.ranges("ranges"),
            },
            "sync-page-started" => LifecycleEvent::SyncPageStarted {
                physical_page: f.page("physical_page")?,
            },
            "sync-page-completed" => LifecycleEvent::SyncPageCompleted {
                physical_page: f.page("physical_page")?,
                counts: f.sync_counts(),
            },
            "sync-warning" => LifecycleEvent::SyncWarning {
                code: f.string("code").unwrap_or_else(|| "unknown".to_string()),
                detail: f.string("detail").unwrap_or_default(),
            },
            "sync-completed" => LifecycleEvent::SyncCompleted {
                pages_processed: f.u32("pages_processed").unwrap_or(0),
                counts: f.sync_counts(),
                duration_ms: f.u64("duration_ms").unwrap_or(0),
                total_pages: f.u32("total_pages"),
                items_on_last_page: f.u32("items_on_last_page"),
            },

            "database-stats" => LifecycleEvent::DatabaseStats {
                total_product_details: f.i64("total_product_details")?,
                min_page: f.i32("min_page"),
                max_page: f.i32("max_page"),
            },
            "session-report" => LifecycleEvent::SessionReport {
                products_inserted: f.u32("products_inserted").unwrap_or(0),
                products_updated: f.u32("products_updated").unwrap_or(0),
                total_pages: f.u32("total_pages").unwrap_or(0),
            },

            _ => return None,
        };
        Some(event)
    }

    /// Decodes and reduces one event into the controller.
    pub fn ingest(
        controller: &mut SessionLifecycleController,
        name: &str,
        payload: &Value,
    ) -> Vec<LifecycleEffect> {
        let Some(event) = Self::decode(name, payload) else {
            trace!(event = name, "ignored event (unknown or malformed)");
            return Vec::new();
        };
        debug!(
            event = event.name(),
            stage = ?event.stage(),
            status = ?event.unit_status(),
            "dispatching lifecycle event"
        );
        controller.apply(&event)
    }
}

/// Lenient field access: numbers may arrive as JSON numbers or numeric strings.
struct Fields<'a>(&'a Value);

impl Fields<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.i64(key).and_then(|v| u64::try_from(v).ok())
    }

    fn u32(&self, key: &str) -> Option<u32> {
        self.i64(key).and_then(|v| u32::try_from(v).ok())
    }

    fn i32(&self, key: &str) -> Option<i32> {
        self.i64(key).and_then(|v| i32::try_from(v).ok())
    }

    /// Physical pages start at 1.
    fn page(&self, key: &str) -> Option<u32> {
        self.u32(key).filter(|p| *p > 0)
    }

    fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn sync_counts(&self) -> SyncPageCounts {
        SyncPageCounts {
            inserted: self.u32("inserted").unwrap_or(0),
            updated: self.u32("updated").unwrap_or(0),
            skipped: self.u32("skipped").unwrap_or(0),
            failed: self.u32("failed").unwrap_or(0),
        }
    }

    /// `[[start, end], ...]` or `[{start, end}, ...]`; bad entries are dropped.
    fn ranges(&self, key: &str) -> Vec<PageRange> {
        let Some(Value::Array(items)) = self.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let (a, b) = match item {
                    Value::Array(pair) if pair.len() == 2 => (pair[0].as_u64()?, pair[1].as_u64()?),
                    Value::Object(_) => (item.get("start")?.as_u64()?, item.get("end")?.as_u64()?),
                    _ => return None,
                };
                PageRange::new(u32::try_from(a).ok()?, u32::try_from(b).ok()?)
            })
            .collect()
    }
}
