//! 모니터 런타임 루프
//!
//! 단일 태스크가 이벤트 구독을 소비하며 컨트롤러를 갱신합니다.
//! 백엔드 명령은 spawn 된 태스크에서 실행되고, 응답은 같은 루프로 돌아와
//! 적용되므로 집계 상태에는 락이 필요 없습니다.
//! 변경이 있을 때마다 `DashboardSnapshot` 을 watch 채널로 발행합니다.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::{BackendError, CrawlerBackend};
use super::dto::CrawlingRangeResponse;
use super::event_ingestor::EventIngestor;
use super::session_lifecycle::{DashboardSnapshot, LifecycleEffect, SessionLifecycleController};
use crate::infrastructure::event_channel::{RawEvent, SubscriptionError};

type PlanResult = (u64, Result<CrawlingRangeResponse, BackendError>);

pub struct MonitorRuntime<B: CrawlerBackend + 'static> {
    controller: SessionLifecycleController,
    backend: Arc<B>,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    pending: JoinSet<PlanResult>,
    cancel: CancellationToken,
}

impl<B: CrawlerBackend + 'static> MonitorRuntime<B> {
    pub fn new(backend: Arc<B>) -> (Self, watch::Receiver<DashboardSnapshot>) {
        Self::with_controller(backend, SessionLifecycleController::new())
    }

    /// Starts from an existing controller (e.g. one seeded with a site snapshot).
    pub fn with_controller(
        backend: Arc<B>,
        controller: SessionLifecycleController,
    ) -> (Self, watch::Receiver<DashboardSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let runtime = Self {
            controller,
            backend,
            snapshot_tx,
            pending: JoinSet::new(),
            cancel: CancellationToken::new(),
        };
        (runtime, snapshot_rx)
    }

    /// Token that stops `run` when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub const fn controller(&self) -> &SessionLifecycleController {
        &self.controller
    }

    /// Drains the subscription until it closes or the token is cancelled.
    /// Returns the final controller state.
    pub async fn run(
        mut self,
        subscription: Result<broadcast::Receiver<RawEvent>, SubscriptionError>,
    ) -> SessionLifecycleController {
        let mut rx = match subscription {
            Ok(rx) => rx,
            Err(e) => {
                error!("Failed to subscribe to actor events: {}", e);
                self.publish();
                return self.controller;
            }
        };
        info!("📡 monitor runtime started");

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("monitor runtime cancelled");
                    self.pending.shutdown().await;
                    break;
                }
                Some(joined) = self.pending.join_next(), if !self.pending.is_empty() => {
                    self.on_joined(joined);
                }
                received = rx.recv() => match received {
                    Ok(event) => self.on_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Monitor lagged behind the event channel, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Actor event channel closed, stopping monitor");
                        // outstanding plan requests still land in this session's state
                        while let Some(joined) = self.pending.join_next().await {
                            self.on_joined(joined);
                        }
                        break;
                    }
                },
            }
        }

        self.publish();
        self.controller
    }

    fn on_event(&mut self, event: &RawEvent) {
        let effects = EventIngestor::ingest(&mut self.controller, &event.name, &event.payload);
        for effect in effects {
            self.dispatch(effect);
        }
        self.publish();
    }

    fn dispatch(&mut self, effect: LifecycleEffect) {
        match effect {
            LifecycleEffect::RecomputeRange { generation, request } => {
                info!(
                    generation,
                    total_pages = request.total_pages_on_site,
                    last_page_items = request.products_on_last_page,
                    "🔁 requesting next crawling range"
                );
                let backend = Arc::clone(&self.backend);
                self.pending.spawn(async move {
                    let result = backend.calculate_crawling_range(request).await;
                    (generation, result)
                });
            }
        }
    }

    fn on_joined(&mut self, joined: Result<PlanResult, tokio::task::JoinError>) {
        match joined {
            Ok((generation, Ok(response))) => {
                if self.controller.accept_plan(generation, response) {
                    self.publish();
                }
            }
            Ok((generation, Err(e))) => {
                error!(generation, error = %e, "❌ crawling range recompute failed");
            }
            Err(e) => {
                error!("Range recompute task failed: {}", e);
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        debug!(state = ?snapshot.state, generation = snapshot.generation, "snapshot published");
        self.snapshot_tx.send_replace(snapshot);
    }
}
