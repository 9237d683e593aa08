//! 페이지 범위 표현식 파싱 / 보정 / 진단 도출 테스트
use matter_certis_monitor::application::prepare_range;
use matter_certis_monitor::domain::page_range::{
    clamp_to_max_span, clamp_to_site_bounds, page_count, parse_expression, parse_single, serialize,
};
use matter_certis_monitor::domain::{
    DiagnosticGroupSummary, DiagnosticsReconciler, PageRange, RepairAssessment, RepairEntry,
};
use proptest::prelude::*;
use rstest::rstest;
use std::collections::BTreeSet;

fn covered(ranges: &[PageRange]) -> BTreeSet<u32> {
    ranges.iter().flat_map(|r| r.end..=r.start).collect()
}

#[rstest]
#[case("498", Some((498, 498)))]
#[case("498-492", Some((498, 492)))]
#[case("492-498", Some((498, 492)))]
#[case("487~485", Some((487, 485)))]
#[case(" 10 \u{2013} 3 ", Some((10, 3)))]
#[case("10\u{2014}3", Some((10, 3)))]
#[case("10\u{2212}3", Some((10, 3)))]
#[case("10\u{FF0D}3", Some((10, 3)))]
#[case("10\u{301C}3", Some((10, 3)))]
#[case("10\u{FF5E}3", Some((10, 3)))]
#[case("0", None)]
#[case("5-0", None)]
#[case("abc", None)]
#[case("", None)]
#[case("1-2-3", None)]
fn parse_single_cases(#[case] token: &str, #[case] expected: Option<(u32, u32)>) {
    let got = parse_single(token).map(|r| (r.start, r.end));
    assert_eq!(got, expected, "token {token:?}");
}

#[rstest]
#[case("498-492,489", "498-492,489")]
#[case("498-492, x, 489,, 0", "498-492,489")]
#[case("3-9,1", "9-3,1")]
fn parse_expression_drops_bad_tokens_keeps_order(#[case] input: &str, #[case] canonical: &str) {
    assert_eq!(serialize(&parse_expression(input)), canonical);
}

#[rstest]
#[case("510-495", 500, "500-495", true)]
#[case("498-480", 500, "498-480", false)]
#[case("600-550", 500, "500", true)]
fn site_clamp(#[case] input: &str, #[case] total: u32, #[case] expected: &str, #[case] changed: bool) {
    let outcome = clamp_to_site_bounds(&parse_expression(input), total);
    assert_eq!(serialize(&outcome.ranges), expected);
    assert_eq!(outcome.changed, changed);
}

#[rstest]
#[case("498-480", 5, "498-494", true)]
#[case("498-494", 5, "498-494", false)]
#[case("498-480", 0, "498-480", false)]
#[case("20-1,8", 10, "20-11,8", true)]
fn span_clamp(#[case] input: &str, #[case] limit: u32, #[case] expected: &str, #[case] changed: bool) {
    let before = parse_expression(input);
    let outcome = clamp_to_max_span(&before, limit);
    assert_eq!(serialize(&outcome.ranges), expected);
    assert_eq!(outcome.changed, changed);
    // start never moves
    for (a, b) in before.iter().zip(&outcome.ranges) {
        assert_eq!(a.start, b.start);
    }
}

#[test]
fn diagnostics_expansion_matches_reference_example() {
    let summary = DiagnosticGroupSummary {
        page_id: 10,
        current_page_number: Some(10),
        status: "gap".to_string(),
        duplicate_indices: vec![],
        missing_indices: vec![2],
        out_of_range_count: 0,
        count: 11,
        expected_count: 12,
    };
    let reconciler = DiagnosticsReconciler::default();
    let coarse = reconciler
        .derive_coarse_repair_range(std::slice::from_ref(&summary), 20)
        .expect("coarse range");
    assert_eq!(covered(&coarse), BTreeSet::from([9, 10, 11]));

    match reconciler.reconcile(&[summary], 20) {
        RepairAssessment::Repair { plan, .. } => assert_eq!(
            plan.entries,
            vec![RepairEntry { physical_page: 10, missing_slot_indices: vec![2] }]
        ),
        RepairAssessment::NoRepairNeeded => panic!("expected a repair"),
    }
}

#[test]
fn healthy_report_needs_no_repair() {
    let ok = DiagnosticGroupSummary {
        page_id: 3,
        current_page_number: None,
        status: "ok".to_string(),
        duplicate_indices: vec![],
        missing_indices: vec![],
        out_of_range_count: 0,
        count: 12,
        expected_count: 12,
    };
    assert_eq!(
        DiagnosticsReconciler::default().reconcile(&[ok], 40),
        RepairAssessment::NoRepairNeeded
    );
}

#[test]
fn operator_input_is_corrected_before_use() {
    let prepared = prepare_range("510-495", Some(500), 0).expect("prepared");
    assert_eq!(prepared.expression, "500-495");
    assert_eq!(prepared.notices.len(), 1);
    assert_eq!(prepared.page_count(), 6);
}

fn arb_range() -> impl Strategy<Value = PageRange> {
    (1u32..600, 1u32..600).prop_filter_map("valid range", |(a, b)| PageRange::new(a, b))
}

proptest! {
    /// serialize(parse(e)) covers the same pages as e.
    #[test]
    fn round_trip_preserves_covered_pages(ranges in prop::collection::vec(arb_range(), 1..8)) {
        let text = serialize(&ranges);
        let reparsed = parse_expression(&text);
        prop_assert_eq!(covered(&reparsed), covered(&ranges));
        prop_assert_eq!(serialize(&reparsed), text);
    }

    /// Site clamp keeps every bound inside [1, total].
    #[test]
    fn site_clamp_stays_in_bounds(ranges in prop::collection::vec(arb_range(), 1..8), total in 1u32..700) {
        let outcome = clamp_to_site_bounds(&ranges, total);
        for r in &outcome.ranges {
            prop_assert!(r.start >= r.end && r.end >= 1 && r.start <= total);
        }
    }

    /// Span clamp never widens and keeps every range within the limit.
    #[test]
    fn span_clamp_respects_limit(ranges in prop::collection::vec(arb_range(), 1..8), limit in 1u32..50) {
        let outcome = clamp_to_max_span(&ranges, limit);
        for (before, after) in ranges.iter().zip(&outcome.ranges) {
            prop_assert!(after.span() <= limit);
            prop_assert!(after.span() <= before.span());
            prop_assert_eq!(after.start, before.start);
        }
        prop_assert!(page_count(&outcome.ranges) <= page_count(&ranges));
    }
}
