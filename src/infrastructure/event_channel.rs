//! Actor 이벤트 수신 채널
//!
//! 데스크톱 브리지가 전달하는 `(name, payload)` 쌍을 broadcast 채널로
//! 모니터 루프에 넘깁니다. 페이로드는 브리지와 같은 평탄화 규칙
//! (`{ "Variant": {..} }` → `{ variant, .. }`) 을 따릅니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// One event as forwarded by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Builds a raw event from an externally tagged enum value, flattening
    /// `{ "SessionStarted": { .. } }` into `{ "variant": "SessionStarted", .. }`.
    pub fn from_envelope(name: impl Into<String>, envelope: Value) -> Self {
        let payload = match envelope {
            Value::Object(map) if map.len() == 1 && map.keys().all(|k| is_variant_name(k)) => {
                let mut out = Map::new();
                for (variant, inner) in map {
                    out.insert("variant".into(), Value::String(variant));
                    match inner {
                        Value::Object(fields) => out.extend(fields),
                        other => {
                            out.insert("value".into(), other);
                        }
                    }
                }
                Value::Object(out)
            }
            other => other,
        };
        Self::new(name, payload)
    }
}

fn is_variant_name(key: &str) -> bool {
    key.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event channel is closed")]
    Closed,
}

/// Broadcast hub between the bridge and any number of monitors
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RawEvent>,
    closed: Arc<AtomicBool>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publishes an event; returns how many subscribers received it.
    pub fn publish(&self, event: RawEvent) -> usize {
        if self.closed.load(Ordering::SeqCst) {
            debug!(event = %event.name, "event dropped: bus closed");
            return 0;
        }
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<RawEvent>, SubscriptionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Closed);
        }
        Ok(self.tx.subscribe())
    }

    /// Refuses new subscriptions and publications. Existing receivers drain
    /// what is buffered and then observe `Closed` once every bus clone is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("🔌 event bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_is_flattened_like_the_bridge() {
        let raw = RawEvent::from_envelope(
            "actor-page-task-started",
            json!({ "PageTaskStarted": { "page": 4, "session_id": "s" } }),
        );
        assert_eq!(
            raw.payload,
            json!({ "variant": "PageTaskStarted", "page": 4, "session_id": "s" })
        );

        let passthrough = RawEvent::from_envelope("x", json!({ "page": 4, "seq": 1 }));
        assert_eq!(passthrough.payload, json!({ "page": 4, "seq": 1 }));

        let single_field = RawEvent::from_envelope("x", json!({ "page": 4 }));
        assert_eq!(single_field.payload, json!({ "page": 4 }));
    }

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe().expect("subscribe");
        assert_eq!(bus.publish(RawEvent::new("actor-session-started", json!({}))), 1);
        let got = rx.recv().await.expect("recv");
        assert_eq!(got.name, "actor-session-started");
    }

    #[test]
    fn closed_bus_rejects_subscribers() {
        let bus = EventBus::new(8);
        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.subscribe().unwrap_err(), SubscriptionError::Closed);
        assert_eq!(bus.publish(RawEvent::new("actor-session-started", json!({}))), 0);
    }
}
