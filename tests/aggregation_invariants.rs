//! 집계 불변식 테스트: 임의 이벤트 순서/중복에도 카운터 불변식 유지
use matter_certis_monitor::application::{EventIngestor, SessionLifecycleController, StageCounters};
use matter_certis_monitor::domain::{GroupPhase, LifecycleEvent, Stage, SyncPageCounts};
use proptest::prelude::*;
use serde_json::json;

fn arb_event() -> impl Strategy<Value = LifecycleEvent> {
    let page = 1u32..20;
    prop_oneof![
        page.clone().prop_map(|page| LifecycleEvent::PageTaskStarted { page }),
        page.clone().prop_map(|page| LifecycleEvent::PageTaskCompleted { page }),
        (page.clone(), any::<bool>())
            .prop_map(|(page, final_failure)| LifecycleEvent::PageTaskFailed { page, final_failure }),
        page.clone().prop_map(|physical_page| LifecycleEvent::SyncPageStarted { physical_page }),
        (page.clone(), any::<u32>()).prop_map(|(physical_page, products_found)| {
            LifecycleEvent::ValidationPageScanned { physical_page, products_found }
        }),
        (page.clone(), any::<[u32; 4]>()).prop_map(|(physical_page, [inserted, updated, skipped, failed])| {
            LifecycleEvent::SyncPageCompleted {
                physical_page,
                counts: SyncPageCounts { inserted, updated, skipped, failed },
            }
        }),
        (page, any::<u32>()).prop_map(|(p, pages)| LifecycleEvent::BatchStarted {
            batch_id: format!("b{p}"),
            pages_in_batch: Some(pages),
        }),
        any::<u32>().prop_map(|scan_pages| LifecycleEvent::ValidationStarted { scan_pages }),
        (any::<bool>(), any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>(), any::<u64>()).prop_map(
            |(persist, size, ok, bad, duplicates, duration_ms)| LifecycleEvent::ProductLifecycleGroup {
                phase: if persist { GroupPhase::Persist } else { GroupPhase::Fetch },
                page: None,
                group_size: size,
                succeeded: ok,
                failed: bad,
                duplicates,
                duration_ms,
            }
        ),
    ]
}

proptest! {
    /// completed + failed <= started and inflight is consistent after every event,
    /// and the snapshot projection never overflows on large payload counts.
    #[test]
    fn counters_hold_invariant_after_every_event(events in prop::collection::vec(arb_event(), 0..80)) {
        let mut ctl = SessionLifecycleController::new();
        ctl.apply(&LifecycleEvent::SessionStarted { session_id: Some("run".into()) });
        for event in &events {
            ctl.apply(event);
            let snapshot = ctl.snapshot();
            for progress in &snapshot.stages {
                prop_assert!(
                    progress.counters.holds_invariant(),
                    "{:?} broke invariant after {:?}: {:?}", progress.stage, event, progress.counters
                );
            }
            prop_assert!(snapshot.batches.holds_invariant());
        }
    }

    /// Replaying the same set-based events in any order yields the same counters.
    #[test]
    fn page_events_are_order_tolerant(
        pages in prop::collection::vec(1u32..30, 1..20),
        seed in any::<u64>(),
    ) {
        let mut forward = Vec::new();
        for page in &pages {
            forward.push(LifecycleEvent::PageTaskStarted { page: *page });
            forward.push(LifecycleEvent::PageTaskCompleted { page: *page });
        }
        let mut shuffled = forward.clone();
        // deterministic rotation + reversal as a cheap permutation
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        let run = |events: &[LifecycleEvent]| {
            let mut ctl = SessionLifecycleController::new();
            ctl.apply(&LifecycleEvent::SessionStarted { session_id: None });
            for e in events {
                ctl.apply(e);
            }
            ctl.counters(Stage::PageListing)
        };
        prop_assert_eq!(run(&forward), run(&shuffled));
    }
}

#[test]
fn duplicate_completion_is_idempotent() {
    let mut ctl = SessionLifecycleController::new();
    EventIngestor::ingest(&mut ctl, "actor-session-started", &json!({}));
    EventIngestor::ingest(&mut ctl, "actor-page-task-completed", &json!({ "page": 7 }));
    let once = ctl.counters(Stage::PageListing);
    EventIngestor::ingest(&mut ctl, "actor-page-task-completed", &json!({ "page": 7 }));
    assert_eq!(ctl.counters(Stage::PageListing), once);
    assert_eq!(once.completed, 1);
}

#[test]
fn completion_before_start_is_order_tolerant() {
    let mut ctl = SessionLifecycleController::new();
    EventIngestor::ingest(&mut ctl, "actor-session-started", &json!({}));
    EventIngestor::ingest(&mut ctl, "actor-page-task-completed", &json!({ "page": 7 }));
    EventIngestor::ingest(&mut ctl, "actor-page-task-started", &json!({ "page": 7 }));
    let c = ctl.counters(Stage::PageListing);
    assert!(c.started >= 1);
    assert_eq!(c.completed, 1);
}

#[test]
fn new_session_resets_every_stage() {
    let mut ctl = SessionLifecycleController::new();
    EventIngestor::ingest(&mut ctl, "actor-session-started", &json!({ "session_id": "a" }));
    for page in 1..=5 {
        EventIngestor::ingest(&mut ctl, "actor-page-task-started", &json!({ "page": page }));
        EventIngestor::ingest(&mut ctl, "actor-sync-page-started", &json!({ "physical_page": page }));
    }
    EventIngestor::ingest(
        &mut ctl,
        "actor-product-lifecycle-group",
        &json!({ "phase": "persist", "group_size": 12, "succeeded": 12, "failed": 0 }),
    );
    EventIngestor::ingest(&mut ctl, "actor-session-completed", &json!({}));
    EventIngestor::ingest(&mut ctl, "actor-session-started", &json!({ "session_id": "b" }));

    for stage in Stage::ALL {
        assert_eq!(ctl.counters(stage), StageCounters::default(), "{stage:?} not reset");
    }
    assert_eq!(ctl.snapshot().validation.scan_pages_planned, 0);
}

#[test]
fn huge_payload_counts_do_not_break_snapshot() {
    let mut ctl = SessionLifecycleController::new();
    EventIngestor::ingest(&mut ctl, "actor-session-started", &json!({ "session_id": "big" }));
    for page in [1, 2] {
        EventIngestor::ingest(
            &mut ctl,
            "actor-validation-page-scanned",
            &json!({ "physical_page": page, "products_found": 3_000_000_000u64 }),
        );
        EventIngestor::ingest(
            &mut ctl,
            "actor-batch-started",
            &json!({ "batch_id": format!("b{page}"), "pages_in_batch": 3_000_000_000u64 }),
        );
    }
    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.validation.products_found, u32::MAX);
    assert_eq!(snapshot.planned_batch_pages, u32::MAX);
}
