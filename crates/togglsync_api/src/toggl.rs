//! Toggl time-tracking API client (the synchronization source).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local};
use reqwest::header::HeaderMap;
use reqwest::Client as HttpClient;
use tracing::debug;

use crate::destination::TimeSource;
use crate::error::{ApiError, Result};
use crate::http::{build_http_client, parse_json, DEFAULT_COOLDOWN_MS};
use crate::models::TogglEntry;
use crate::rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct TogglClient {
    http: HttpClient,
    base_url: String,
    api_token: String,
    limiter: RateLimiter,
}

impl TogglClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let http = build_http_client(HeaderMap::new())?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_token: api_token.into(),
            limiter: RateLimiter::new(Duration::from_millis(DEFAULT_COOLDOWN_MS)),
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.limiter = RateLimiter::new(cooldown);
        self
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Fetches the time entries of a single local calendar day, `days_back`
    /// days before today.
    pub async fn time_entries(&self, days_back: u32) -> Result<Vec<TogglEntry>> {
        let (start, end) = day_window(days_back)?;
        debug!(days_back, %start, %end, "toggl:time_entries");

        self.limiter.hit().await;
        let response = self
            .http
            .get(self.url_for("time_entries"))
            .basic_auth(&self.api_token, Some("api_token"))
            .query(&[("start_date", start.as_str()), ("end_date", end.as_str())])
            .send()
            .await?;
        parse_json(response).await
    }
}

#[async_trait]
impl TimeSource for TogglClient {
    async fn fetch(&self, days_back: u32) -> Result<Vec<TogglEntry>> {
        self.time_entries(days_back).await
    }
}

/// Resolves the local-midnight-to-midnight RFC 3339 window of the requested
/// day.
fn day_window(days_back: u32) -> Result<(String, String)> {
    let day = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(days_back as u64))
        .ok_or_else(|| ApiError::Other("requested day is out of range".to_string()))?;
    let start = day
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).single())
        .ok_or_else(|| ApiError::Other("failed to resolve local day start".to_string()))?;
    let end = start + chrono::Duration::days(1);
    Ok((start.to_rfc3339(), end.to_rfc3339()))
}
