use super::Gateway;
use crate::error::GameResult;
use crate::protocol::RoomEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Buffered events per topic before slow subscribers start lagging
const TOPIC_CAPACITY: usize = 100;

/// In-process gateway: one broadcast channel per topic.
///
/// Only reaches clients connected to this instance, through `/ws`.
#[derive(Debug, Default)]
pub struct LocalGateway {
    topics: RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events for `topic`
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<RoomEvent> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            return tx.subscribe();
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Forget topics nobody listens to anymore
    pub async fn prune(&self) -> usize {
        let mut topics = self.topics.write().await;
        let before = topics.len();
        topics.retain(|_, tx| tx.receiver_count() > 0);
        before - topics.len()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Gateway for LocalGateway {
    async fn publish(&self, topic: &str, event: &RoomEvent) -> GameResult<()> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            // Ignore send errors (no receivers connected is fine)
            let _ = tx.send(event.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}
