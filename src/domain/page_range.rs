//! 페이지 범위 표현식 처리 (RangeExpression)
//!
//! "498-492,489,487~485" 형태의 다중 범위 표현식을 파싱/직렬화하고,
//! 사이트 경계와 최대 스팬 기준으로 보정합니다.
//!
//! 규칙:
//! - `start` = 오래된 페이지 (숫자가 큼), `end` = 최신 페이지 (숫자가 작음)
//! - 항상 `start >= end >= 1`
//! - 파싱은 best-effort: 잘못된 토큰은 버리고 나머지는 유지

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// 유니코드 대시/물결 변형 → ASCII 정규화 테이블
const DASH_VARIANTS: [char; 6] = ['\u{2010}', '\u{2013}', '\u{2014}', '\u{2212}', '\u{FE63}', '\u{FF0D}'];
const TILDE_VARIANTS: [char; 2] = ['\u{301C}', '\u{FF5E}'];

/// Inclusive physical page range, `start` (oldest) down to `end` (newest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// Ordered list of ranges exactly as the operator (or the reconciler) produced them.
pub type RangeExpression = Vec<PageRange>;

impl PageRange {
    /// Builds a range from two bounds in either order. Page 0 does not exist.
    pub fn new(a: u32, b: u32) -> Option<Self> {
        if a == 0 || b == 0 {
            return None;
        }
        Some(Self {
            start: a.max(b),
            end: a.min(b),
        })
    }

    pub fn single(page: u32) -> Option<Self> {
        Self::new(page, page)
    }

    /// Number of pages covered (`start - end + 1`).
    pub const fn span(&self) -> u32 {
        self.start.saturating_sub(self.end).saturating_add(1)
    }

    pub const fn contains(&self, page: u32) -> bool {
        page <= self.start && page >= self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Result of a bound correction. `changed` lets the caller surface a notice
/// instead of silently rewriting the operator's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClampOutcome {
    pub ranges: Vec<PageRange>,
    pub changed: bool,
}

fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if DASH_VARIANTS.contains(&c) {
                '-'
            } else if TILDE_VARIANTS.contains(&c) {
                '~'
            } else {
                c
            }
        })
        .collect()
}

/// Parses one token: `"n"`, `"a-b"` or `"a~b"`.
///
/// Reversed bounds (`"3-9"`) are reordered so the result still satisfies
/// `start >= end`. Anything else (empty, non-numeric, zero, extra separators)
/// yields `None`.
pub fn parse_single(token: &str) -> Option<PageRange> {
    let norm = normalize_token(token);
    if norm.is_empty() {
        return None;
    }
    match norm.find(['-', '~']) {
        Some(pos) => {
            let (a, rest) = norm.split_at(pos);
            let b = &rest[1..];
            let a: u32 = a.parse().ok()?;
            let b: u32 = b.parse().ok()?;
            PageRange::new(a, b)
        }
        None => PageRange::single(norm.parse().ok()?),
    }
}

/// Splits on `,` and keeps every token that parses, in input order.
pub fn parse_expression(expr: &str) -> RangeExpression {
    expr.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(parse_single)
        .collect()
}

pub fn serialize(ranges: &[PageRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Clamps both bounds of every range into `[1, total_pages]`.
///
/// Models the site shrinking after the expression was written: "510-495"
/// against a 500-page site becomes "500-495".
pub fn clamp_to_site_bounds(ranges: &[PageRange], total_pages: u32) -> ClampOutcome {
    let upper = total_pages.max(1);
    let mut changed = false;
    let ranges = ranges
        .iter()
        .map(|r| {
            let mut start = r.start.clamp(1, upper);
            let mut end = r.end.clamp(1, upper);
            if start != r.start || end != r.end {
                changed = true;
            }
            if start < end {
                std::mem::swap(&mut start, &mut end);
            }
            PageRange { start, end }
        })
        .collect();
    ClampOutcome { ranges, changed }
}

/// Shrinks every range wider than `limit` pages by pulling the newer bound
/// (`end`) toward the older one. `start` never moves. A `limit` of 0 means
/// no limit.
pub fn clamp_to_max_span(ranges: &[PageRange], limit: u32) -> ClampOutcome {
    if limit == 0 {
        return ClampOutcome {
            ranges: ranges.to_vec(),
            changed: false,
        };
    }
    let mut changed = false;
    let ranges = ranges
        .iter()
        .map(|r| {
            if r.span() <= limit {
                return *r;
            }
            changed = true;
            // span > limit implies start >= limit
            let end = r.end.max(r.start - (limit - 1));
            PageRange { start: r.start, end }
        })
        .collect();
    ClampOutcome { ranges, changed }
}

/// Sorts descending by `start` and merges overlapping or adjacent ranges.
pub fn normalize(ranges: &[PageRange]) -> Vec<PageRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    let mut merged: Vec<PageRange> = Vec::with_capacity(sorted.len());
    for r in sorted {
        if let Some(last) = merged.last_mut() {
            if r.start.saturating_add(1) >= last.end {
                last.end = last.end.min(r.end);
                continue;
            }
        }
        merged.push(r);
    }
    merged
}

/// Distinct pages covered by the expression.
pub fn page_count(ranges: &[PageRange]) -> u32 {
    normalize(ranges)
        .iter()
        .map(PageRange::span)
        .fold(0u32, u32::saturating_add)
}

/// Run-length encodes a set of pages into descending ranges.
pub fn ranges_from_pages<I>(pages: I) -> Vec<PageRange>
where
    I: IntoIterator<Item = u32>,
{
    let mut pages: Vec<u32> = pages.into_iter().filter(|p| *p > 0).collect();
    pages.sort_unstable_by(|a, b| b.cmp(a));
    pages.dedup();

    let mut out: Vec<PageRange> = Vec::new();
    for page in pages {
        match out.last_mut() {
            Some(last) if last.end == page + 1 => last.end = page,
            _ => out.push(PageRange {
                start: page,
                end: page,
            }),
        }
    }
    out
}
