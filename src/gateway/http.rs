use super::Gateway;
use crate::error::{GameError, GameResult};
use crate::protocol::RoomEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Gateway backed by a hosted pub/sub service's REST API.
///
/// Events are posted to `{base_url}/channels/{topic}/messages`, so every
/// server instance reaches every subscriber.
pub struct HttpGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    name: &'a str,
    data: serde_json::Value,
}

impl HttpGateway {
    pub fn new(base_url: String, api_key: String) -> GameResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GameError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn channel_url(&self, topic: &str) -> String {
        // Topics contain ':' which must be escaped in a path segment
        format!(
            "{}/channels/{}/messages",
            self.base_url,
            topic.replace(':', "%3A")
        )
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn publish(&self, topic: &str, event: &RoomEvent) -> GameResult<()> {
        let (user, pass) = self
            .api_key
            .split_once(':')
            .unwrap_or((self.api_key.as_str(), ""));

        let response = self
            .client
            .post(self.channel_url(topic))
            .basic_auth(user, Some(pass))
            .json(&PublishBody {
                name: event.name(),
                data: event.data(),
            })
            .send()
            .await
            .map_err(|e| GameError::Infrastructure(format!("publish failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GameError::Infrastructure(format!(
                "publish rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
