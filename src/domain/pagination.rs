//! Pagination domain logic centralization.
//!
//! Responsibility:
//! - page_id 그룹 ↔ 물리 페이지 매핑 (가장 오래된 물리 페이지 = page_id 0)
//! - 슬롯 인덱스(index_in_page) 유효 범위 판정

/// 사이트 목록 페이지당 제품 수
pub const PRODUCTS_PER_PAGE: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCalculator {
    products_per_page: u32,
}

impl Default for PaginationCalculator {
    fn default() -> Self {
        Self {
            products_per_page: PRODUCTS_PER_PAGE,
        }
    }
}

impl PaginationCalculator {
    pub fn new(products_per_page: u32) -> Self {
        Self {
            products_per_page: products_per_page.max(1),
        }
    }

    /// 슬롯 인덱스가 `[0, products_per_page)` 안에 있는지
    pub fn slot_index(&self, index: i32) -> Option<u32> {
        u32::try_from(index)
            .ok()
            .filter(|ix| *ix < self.products_per_page)
    }

    /// page_id 그룹이 현재 어느 물리 페이지에 있는지 역산.
    /// 규칙: physical = total_pages - page_id (page_id 0 = 가장 오래된 페이지 = total_pages)
    /// 결과가 `[1, total_pages]` 밖이면 None.
    pub fn physical_page_for_group(&self, page_id: i32, total_pages: u32) -> Option<u32> {
        let pid = u32::try_from(page_id).ok()?;
        let physical = total_pages.checked_sub(pid)?;
        (physical >= 1).then_some(physical)
    }
}
