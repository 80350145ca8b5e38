//! Jira REST API client (seconds-granular destination tracker).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::destination::{Destination, TimeLogDraft};
use crate::error::Result;
use crate::http::{build_http_client, ensure_success, parse_json, DEFAULT_COOLDOWN_MS};
use crate::models::{value_to_id_string, DestinationEntry};
use crate::rate_limiter::RateLimiter;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Clone)]
pub struct JiraClient {
    http: HttpClient,
    base_url: String,
    username: String,
    api_token: String,
    dry_run: bool,
    limiter: RateLimiter,
}

impl JiraClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_token: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        Ok(Self {
            http: build_http_client(HeaderMap::new())?,
            base_url: base_url.into(),
            username: username.into(),
            api_token: api_token.into(),
            dry_run,
            limiter: RateLimiter::new(Duration::from_millis(DEFAULT_COOLDOWN_MS)),
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.limiter = RateLimiter::new(cooldown);
        self
    }

    fn worklog_url(&self, issue_key: &str) -> String {
        format!(
            "{}/rest/api/2/issue/{}/worklog",
            self.base_url.trim_end_matches('/'),
            issue_key
        )
    }
}

#[async_trait]
impl Destination for JiraClient {
    async fn fetch(&self, issue_id: &str) -> Result<Vec<DestinationEntry>> {
        self.limiter.hit().await;
        let response = self
            .http
            .get(self.worklog_url(issue_id))
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await?;
        let listing: WorklogsResponse = parse_json(response).await?;
        Ok(listing
            .worklogs
            .into_iter()
            .map(|raw| raw.into_entry(issue_id))
            .collect())
    }

    async fn create(&self, draft: &TimeLogDraft) -> Result<()> {
        if self.dry_run {
            info!(issue_id = %draft.issue_id, "dry run: jira create skipped");
            return Ok(());
        }
        self.limiter.hit().await;
        let response = self
            .http
            .post(self.worklog_url(&draft.issue_id))
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&WorklogPayload::from(draft))
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn update(&self, record_id: &Value, draft: &TimeLogDraft) -> Result<()> {
        if self.dry_run {
            info!(issue_id = %draft.issue_id, "dry run: jira update skipped");
            return Ok(());
        }
        self.limiter.hit().await;
        let url = format!(
            "{}/{}",
            self.worklog_url(&draft.issue_id),
            value_to_id_string(record_id)
        );
        let response = self
            .http
            .put(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&WorklogPayload::from(draft))
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[derive(Debug, Deserialize)]
struct WorklogsResponse {
    #[serde(default)]
    worklogs: Vec<JiraWorklog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraWorklog {
    id: Value,
    created: Option<String>,
    author: Option<JiraAuthor>,
    #[serde(default)]
    time_spent_seconds: i64,
    started: Option<String>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraAuthor {
    display_name: Option<String>,
    name: Option<String>,
}

impl JiraWorklog {
    /// Worklog payloads do not repeat the issue key, so the requested key is
    /// carried over into the normalized entry.
    fn into_entry(self, issue_key: &str) -> DestinationEntry {
        DestinationEntry {
            id: self.id,
            created_on: self.created,
            author: self.author.and_then(|a| a.display_name.or(a.name)),
            hours: self.time_spent_seconds as f64 / SECONDS_PER_HOUR,
            spent_on: self.started,
            issue_id: issue_key.to_string(),
            comment: self.comment.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    started: Option<&'a str>,
    time_spent_seconds: i64,
    comment: &'a str,
}

impl<'a> From<&'a TimeLogDraft> for WorklogPayload<'a> {
    fn from(draft: &'a TimeLogDraft) -> Self {
        Self {
            started: draft.start.as_deref(),
            time_spent_seconds: draft.seconds,
            comment: &draft.comment,
        }
    }
}
