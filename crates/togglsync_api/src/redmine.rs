//! Redmine REST API client (hour-granular destination tracker).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::destination::{Destination, TimeLogDraft};
use crate::error::{ApiError, Result};
use crate::http::{build_http_client, ensure_success, parse_json, DEFAULT_COOLDOWN_MS};
use crate::models::{value_to_id_string, DestinationEntry};
use crate::rate_limiter::RateLimiter;

const API_KEY_HEADER: &str = "X-Redmine-API-Key";
const PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct RedmineClient {
    http: HttpClient,
    base_url: String,
    dry_run: bool,
    limiter: RateLimiter,
}

impl RedmineClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_key: String = api_key.into();
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(API_KEY_HEADER.as_bytes())
            .map_err(|err| ApiError::Other(err.to_string()))?;
        let value = HeaderValue::from_str(&api_key)
            .map_err(|err| ApiError::Other(err.to_string()))?;
        headers.insert(name, value);

        Ok(Self {
            http: build_http_client(headers)?,
            base_url: base_url.into(),
            dry_run,
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

    fn payload(draft: &TimeLogDraft) -> TimeEntryPayload<'_> {
        TimeEntryPayload {
            time_entry: TimeEntryFields {
                issue_id: &draft.issue_id,
                spent_on: draft.start.as_deref().map(date_part),
                hours: draft.seconds as f64 / 3600.0,
                comments: &draft.comment,
            },
        }
    }
}

#[async_trait]
impl Destination for RedmineClient {
    async fn fetch(&self, issue_id: &str) -> Result<Vec<DestinationEntry>> {
        self.limiter.hit().await;
        let limit = PAGE_LIMIT.to_string();
        let response = self
            .http
            .get(self.url_for("time_entries.json"))
            .query(&[("issue_id", issue_id), ("limit", limit.as_str())])
            .send()
            .await?;
        let listing: TimeEntriesResponse = parse_json(response).await?;
        Ok(listing.time_entries.into_iter().map(Into::into).collect())
    }

    async fn create(&self, draft: &TimeLogDraft) -> Result<()> {
        if self.dry_run {
            info!(issue_id = %draft.issue_id, "dry run: redmine create skipped");
            return Ok(());
        }
        self.limiter.hit().await;
        let response = self
            .http
            .post(self.url_for("time_entries.json"))
            .json(&Self::payload(draft))
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn update(&self, record_id: &Value, draft: &TimeLogDraft) -> Result<()> {
        if self.dry_run {
            info!(issue_id = %draft.issue_id, "dry run: redmine update skipped");
            return Ok(());
        }
        self.limiter.hit().await;
        let path = format!("time_entries/{}.json", value_to_id_string(record_id));
        let response = self
            .http
            .put(self.url_for(&path))
            .json(&Self::payload(draft))
            .send()
            .await?;
        ensure_success(response).await
    }
}

/// Redmine stores a spent-on date, not a timestamp.
fn date_part(start: &str) -> &str {
    start.get(..10).unwrap_or(start)
}

#[derive(Debug, Deserialize)]
struct TimeEntriesResponse {
    #[serde(default)]
    time_entries: Vec<RedmineTimeEntry>,
}

#[derive(Debug, Deserialize)]
struct RedmineTimeEntry {
    id: Value,
    created_on: Option<String>,
    user: Option<NamedRef>,
    #[serde(default)]
    hours: f64,
    spent_on: Option<String>,
    issue: Option<IdRef>,
    #[serde(default)]
    comments: String,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: Value,
}

impl From<RedmineTimeEntry> for DestinationEntry {
    fn from(raw: RedmineTimeEntry) -> Self {
        let issue_id = raw
            .issue
            .map(|issue| value_to_id_string(&issue.id))
            .unwrap_or_default();
        DestinationEntry {
            id: raw.id,
            created_on: raw.created_on,
            author: raw.user.and_then(|user| user.name),
            hours: raw.hours,
            spent_on: raw.spent_on,
            issue_id,
            comment: raw.comments,
        }
    }
}

#[derive(Debug, Serialize)]
struct TimeEntryPayload<'a> {
    time_entry: TimeEntryFields<'a>,
}

#[derive(Debug, Serialize)]
struct TimeEntryFields<'a> {
    issue_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    spent_on: Option<&'a str>,
    hours: f64,
    comments: &'a str,
}
