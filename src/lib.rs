//! Synchronizes Toggl time entries into Redmine or Jira work logs, matching
//! both sides through a correlation tag embedded in the log comment.

pub mod config;
pub mod mattermost;
pub mod synchronizer;
