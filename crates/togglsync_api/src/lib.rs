//! Typed API client crate for the togglsync collaborators: Toggl as the
//! time-tracking source, Redmine and Jira as destination issue trackers, and
//! Mattermost as the notification sink.

pub mod destination;
pub mod error;
pub mod http;
pub mod jira;
pub mod mattermost;
pub mod models;
pub mod rate_limiter;
pub mod redmine;
pub mod toggl;

pub use destination::{Destination, TimeLogDraft, TimeSource};
pub use error::{ApiError, Result};
pub use jira::JiraClient;
pub use mattermost::MattermostClient;
pub use models::{DestinationEntry, TogglEntry};
pub use redmine::RedmineClient;
pub use toggl::TogglClient;
