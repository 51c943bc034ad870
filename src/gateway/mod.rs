//! Realtime notification gateway.
//!
//! The game only ever pushes events out; subscriptions and connections
//! belong to the gateway implementation.

mod http;
mod local;

pub use http::HttpGateway;
pub use local::LocalGateway;

use crate::error::GameResult;
use crate::protocol::RoomEvent;
use async_trait::async_trait;
use std::time::Duration;

/// Attempts per publish before the event is given up on
const PUBLISH_ATTEMPTS: u32 = 3;

/// Topic-based fan-out to everyone subscribed to a room
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Best-effort broadcast of `event` to all current subscribers of `topic`
    async fn publish(&self, topic: &str, event: &RoomEvent) -> GameResult<()>;

    /// Name for logs
    fn name(&self) -> &str;
}

/// Publish with a few retries, logging instead of failing.
///
/// Room state is already committed by the time anything is published, so a
/// lost event only delays clients until their next refetch.
pub async fn publish_best_effort(gateway: &dyn Gateway, topic: &str, event: &RoomEvent) {
    for attempt in 1..=PUBLISH_ATTEMPTS {
        match gateway.publish(topic, event).await {
            Ok(()) => {
                tracing::debug!(topic, event = event.name(), "Published event");
                return;
            }
            Err(e) if attempt < PUBLISH_ATTEMPTS => {
                tracing::debug!(
                    topic,
                    event = event.name(),
                    attempt,
                    "Publish via {} failed: {}",
                    gateway.name(),
                    e
                );
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
            Err(e) => {
                tracing::warn!(
                    topic,
                    event = event.name(),
                    "Dropping event after {} attempts via {}: {}",
                    PUBLISH_ATTEMPTS,
                    gateway.name(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyGateway {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Gateway for FlakyGateway {
        async fn publish(&self, _topic: &str, _event: &RoomEvent) -> GameResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(GameError::Infrastructure("unreachable".to_string()));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn event() -> RoomEvent {
        RoomEvent::RoomClosed {
            code: "ABCD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let gateway = FlakyGateway {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        };
        publish_best_effort(&gateway, "room:ABCD", &event()).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_without_panicking() {
        let gateway = FlakyGateway {
            failures_left: AtomicU32::new(100),
            calls: AtomicU32::new(0),
        };
        publish_best_effort(&gateway, "room:ABCD", &event()).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), PUBLISH_ATTEMPTS);
    }
}
