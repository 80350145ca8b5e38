//! Mattermost incoming-webhook client used for run notifications.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client as HttpClient;
use serde::Serialize;

use crate::error::Result;
use crate::http::{build_http_client, ensure_success, DEFAULT_COOLDOWN_MS};
use crate::rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct MattermostClient {
    http: HttpClient,
    url: String,
    /// Channels to post to; the empty string posts to the webhook default.
    channels: Vec<String>,
    limiter: RateLimiter,
}

impl MattermostClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http_client(HeaderMap::new())?,
            url: url.into(),
            channels: Vec::new(),
            limiter: RateLimiter::new(Duration::from_millis(DEFAULT_COOLDOWN_MS)),
        })
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.limiter = RateLimiter::new(cooldown);
        self
    }

    /// Posts the text to every configured channel, or once to the webhook
    /// default when no channel is configured.
    pub async fn send(&self, text: &str) -> Result<()> {
        if self.channels.is_empty() {
            return self.post(None, text).await;
        }
        for channel in &self.channels {
            let target = if channel.is_empty() {
                None
            } else {
                Some(channel.as_str())
            };
            self.post(target, text).await?;
        }
        Ok(())
    }

    async fn post(&self, channel: Option<&str>, text: &str) -> Result<()> {
        self.limiter.hit().await;
        let response = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { channel, text })
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    text: &'a str,
}
