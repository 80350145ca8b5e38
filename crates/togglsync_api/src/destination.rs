//! Collaborator contracts the reconciliation engine is written against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{DestinationEntry, TogglEntry};

/// The fields of a time log to be written to a destination tracker. The
/// amount is carried as raw seconds together with the raw start timestamp;
/// each destination converts to its own native unit and date shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeLogDraft {
    pub issue_id: String,
    pub start: Option<String>,
    pub seconds: i64,
    pub comment: String,
}

/// A source of time records to synchronize outward.
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Fetches all entries for the single calendar day `days_back` days
    /// before today (`0` is today).
    async fn fetch(&self, days_back: u32) -> Result<Vec<TogglEntry>>;
}

/// A destination issue tracker capable of listing, creating and updating
/// time-log records per issue.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn fetch(&self, issue_id: &str) -> Result<Vec<DestinationEntry>>;

    async fn create(&self, draft: &TimeLogDraft) -> Result<()>;

    /// Rewrites an existing record identified by the tracker's own opaque id.
    async fn update(&self, record_id: &Value, draft: &TimeLogDraft) -> Result<()>;
}
