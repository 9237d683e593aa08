//! Crawling engine command port
//!
//! The engine is a black box reached through request/response commands. The
//! desktop shell provides the concrete implementation (IPC invoke); tests use
//! in-memory fakes.

use async_trait::async_trait;

use super::dto::{
    CrawlingRangeRequest, CrawlingRangeResponse, DbPaginationMismatchReport, DiagnosticPageInput,
    StartValidationRequest, SyncSummary, ValidationSummary,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CrawlerBackend: Send + Sync {
    async fn calculate_crawling_range(
        &self,
        request: CrawlingRangeRequest,
    ) -> Result<CrawlingRangeResponse, BackendError>;

    async fn start_validation(
        &self,
        request: StartValidationRequest,
    ) -> Result<ValidationSummary, BackendError>;

    async fn start_partial_sync(
        &self,
        ranges: String,
        dry_run: bool,
    ) -> Result<SyncSummary, BackendError>;

    async fn scan_db_pagination_mismatches(&self)
    -> Result<DbPaginationMismatchReport, BackendError>;

    async fn start_diagnostic_sync(
        &self,
        groups: Vec<DiagnosticPageInput>,
        dry_run: bool,
    ) -> Result<SyncSummary, BackendError>;

    /// One-way request; termination is only observed through events.
    async fn request_graceful_shutdown(&self, reason: String) -> Result<(), BackendError>;
}
