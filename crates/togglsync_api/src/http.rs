//! Shared HTTP plumbing for the collaborator clients.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, Result};

pub const DEFAULT_USER_AGENT: &str = "togglsync";
pub const DEFAULT_COOLDOWN_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub fn build_http_client(headers: HeaderMap) -> Result<HttpClient> {
    HttpClient::builder()
        .default_headers(headers)
        .user_agent(DEFAULT_USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|err| ApiError::Other(err.to_string()))
}

pub async fn parse_json<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        response.json::<T>().await.map_err(ApiError::from)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Authentication(format!(
            "Access denied ({}) - {}",
            status, body
        )))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(build_http_error(status, &body))
    }
}

pub async fn ensure_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Authentication(format!(
            "Access denied ({}) - {}",
            status, body
        )))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(build_http_error(status, &body))
    }
}

pub fn build_http_error(status: StatusCode, body: &str) -> ApiError {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
    ApiError::http(status, message)
}

/// Pulls a human-readable message out of a JSON error body. Redmine answers
/// with an `errors` array, Mattermost and Jira with a `message` field.
fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    if let Some(errors) = value.get("errors").and_then(|e| e.as_array()) {
        let joined = errors
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::extract_error_message;

    #[test]
    fn extracts_message_field() {
        let body = r#"{"message": "Sth went wrong"}"#;
        assert_eq!(extract_error_message(body), Some("Sth went wrong".to_string()));
    }

    #[test]
    fn extracts_redmine_errors_array() {
        let body = r#"{"errors": ["Hours is invalid", "Issue is invalid"]}"#;
        assert_eq!(
            extract_error_message(body),
            Some("Hours is invalid; Issue is invalid".to_string())
        );
    }

    #[test]
    fn non_json_body_yields_none() {
        assert_eq!(extract_error_message("Something went wrong..."), None);
    }
}
