//! Matter Certis v2 - progress monitor core
//!
//! 크롤링 엔진이 내보내는 `actor-*` 이벤트를 단계별 진행 카운터로 집계하고,
//! 검증/동기화/진단 복구에 쓰이는 페이지 범위 표현식을 파싱·보정·도출합니다.
//!
//! - [`domain`]: 순수 타입과 함수 (이벤트, 범위 엔진, 페이지 매핑, 진단 조정)
//! - [`application`]: 집계기, 세션 상태 머신, 운영자 명령, 런타임 루프
//! - [`infrastructure`]: 설정, 로깅, 이벤트 채널

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
