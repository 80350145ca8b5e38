//! Reconciliation engine: groups Toggl entries by issue, matches them to
//! destination time logs through the embedded correlation tag and issues
//! create/update operations until both sides agree.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use togglsync_api::{
    ApiError, Destination, DestinationEntry, TimeLogDraft, TimeSource, TogglEntry,
};

use crate::config::ProjectEntry;

static CORRELATION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[toggl#(\d+)\]").expect("invalid correlation tag regex"));

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("toggl fetch for day {days_back} failed: {source}")]
    Source {
        days_back: u32,
        #[source]
        source: ApiError,
    },
    #[error("issue {issue_id}: {source}")]
    Destination {
        issue_id: String,
        #[source]
        source: ApiError,
    },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub days: Vec<DayReport>,
}

impl SyncReport {
    pub fn failure_count(&self) -> usize {
        self.days.iter().map(|day| day.failures.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct DayReport {
    pub days_back: u32,
    /// Every entry the source returned for the day, before filtering.
    pub entries: Vec<TogglEntry>,
    pub issues: Vec<IssueReport>,
    pub failures: Vec<SyncError>,
}

#[derive(Debug)]
pub struct IssueReport {
    pub issue_id: String,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl IssueReport {
    fn new(issue_id: &str) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            created: 0,
            updated: 0,
            unchanged: 0,
        }
    }
}

/// Drives the per-day reconciliation loop against one source and one
/// destination. Stateless across runs: repeatability comes entirely from the
/// correlation-tag matching.
pub struct Synchronizer<'a> {
    source: &'a dyn TimeSource,
    destination: &'a dyn Destination,
    project: &'a ProjectEntry,
    strict: bool,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        source: &'a dyn TimeSource,
        destination: &'a dyn Destination,
        project: &'a ProjectEntry,
    ) -> Self {
        Self {
            source,
            destination,
            project,
            strict: false,
        }
    }

    /// In strict mode the first collaborator failure aborts the whole run;
    /// otherwise failures are recorded per unit and processing continues.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reconciles the last `days` calendar days, one day at a time.
    pub async fn run(&self, days: u32) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        for days_back in 0..days {
            match self.sync_day(days_back).await {
                Ok(day) => report.days.push(day),
                Err(err) if self.strict => return Err(err),
                Err(err) => {
                    warn!("day {} failed: {}", days_back, err);
                    report.days.push(DayReport {
                        days_back,
                        failures: vec![err],
                        ..Default::default()
                    });
                }
            }
        }
        Ok(report)
    }

    async fn sync_day(&self, days_back: u32) -> Result<DayReport, SyncError> {
        let entries = self
            .source
            .fetch(days_back)
            .await
            .map_err(|source| SyncError::Source { days_back, source })?;
        debug!("day {}: {} toggl entries", days_back, entries.len());

        let groups = group_by_issue(&entries, self.project);
        let mut issue_ids: Vec<&String> = groups.keys().collect();
        issue_ids.sort();

        let mut day = DayReport {
            days_back,
            entries,
            ..Default::default()
        };
        for issue_id in issue_ids {
            match self.sync_issue(issue_id, &groups[issue_id]).await {
                Ok(issue) => {
                    info!(
                        "issue {}: created {} updated {} unchanged {}",
                        issue.issue_id, issue.created, issue.updated, issue.unchanged
                    );
                    day.issues.push(issue);
                }
                Err(err) if self.strict => return Err(err),
                Err(err) => {
                    warn!("{}", err);
                    day.failures.push(err);
                }
            }
        }
        Ok(day)
    }

    async fn sync_issue(
        &self,
        issue_id: &str,
        group: &[TogglEntry],
    ) -> Result<IssueReport, SyncError> {
        let for_issue = |source: ApiError| SyncError::Destination {
            issue_id: issue_id.to_string(),
            source,
        };

        let existing = self.destination.fetch(issue_id).await.map_err(for_issue)?;
        let by_tag = group_destination_by_tag(&existing);

        let mut outcome = IssueReport::new(issue_id);
        for entry in group {
            let draft = TimeLogDraft {
                issue_id: issue_id.to_string(),
                start: entry.start.clone(),
                seconds: entry.duration,
                comment: tagged_comment(entry),
            };
            match by_tag.get(&entry.id) {
                None => {
                    debug!("issue {}: creating log for toggl entry {}", issue_id, entry.id);
                    self.destination.create(&draft).await.map_err(for_issue)?;
                    outcome.created += 1;
                }
                Some(logged) if !entries_equal(entry, logged) => {
                    debug!("issue {}: updating log for toggl entry {}", issue_id, entry.id);
                    self.destination
                        .update(&logged.id, &draft)
                        .await
                        .map_err(for_issue)?;
                    outcome.updated += 1;
                }
                Some(_) => outcome.unchanged += 1,
            }
        }
        Ok(outcome)
    }
}

/// Reconstructs the destination comment for a source entry; the embedded tag
/// is the only cross-system key.
pub fn tagged_comment(entry: &TogglEntry) -> String {
    format!("{} [toggl#{}]", entry.description, entry.id)
}

/// Parses the source-entry id out of a destination comment. Comments without
/// a tag belong to unrelated manual logging.
pub fn tagged_source_id(comment: &str) -> Option<i64> {
    CORRELATION_TAG
        .captures(comment)
        .and_then(|captures| captures.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Partitions source entries by extracted issue id, preserving encounter
/// order within each group. Pending entries (negative duration) and entries
/// matching no configured pattern are dropped.
pub fn group_by_issue(
    entries: &[TogglEntry],
    project: &ProjectEntry,
) -> HashMap<String, Vec<TogglEntry>> {
    let mut groups: HashMap<String, Vec<TogglEntry>> = HashMap::new();
    for entry in entries {
        if entry.duration < 0 {
            debug!("skipping pending toggl entry {}", entry.id);
            continue;
        }
        let Some(issue_id) = project.issue_id(&entry.description) else {
            continue;
        };
        groups.entry(issue_id).or_default().push(entry.clone());
    }
    groups
}

/// Partitions destination entries by their own issue field, normalized to
/// string form so lookups against source-side groups always succeed.
pub fn group_destination_by_issue(
    entries: &[DestinationEntry],
) -> HashMap<String, Vec<DestinationEntry>> {
    let mut groups: HashMap<String, Vec<DestinationEntry>> = HashMap::new();
    for entry in entries {
        groups
            .entry(entry.issue_id.clone())
            .or_default()
            .push(entry.clone());
    }
    groups
}

/// Indexes destination entries by the source id embedded in their comment.
/// When duplicates carry the same tag only the first is matched.
fn group_destination_by_tag(entries: &[DestinationEntry]) -> HashMap<i64, &DestinationEntry> {
    let mut by_tag: HashMap<i64, &DestinationEntry> = HashMap::new();
    for entry in entries {
        if let Some(source_id) = tagged_source_id(&entry.comment) {
            by_tag.entry(source_id).or_insert(entry);
        }
    }
    by_tag
}

/// Decides whether a source entry and a destination record represent the
/// same logged time: minute-rounded duration, start reference at minute
/// granularity (date granularity for date-only trackers) and a literal match
/// of the reconstructed comment.
pub fn entries_equal(source: &TogglEntry, destination: &DestinationEntry) -> bool {
    // Ties round to even so that e.g. 3630 s still equals a logged 1.0 h.
    let tracked_minutes = (source.duration as f64 / 60.0).round_ties_even() as i64;
    let logged_minutes = (destination.hours * 60.0).round_ties_even() as i64;
    if tracked_minutes != logged_minutes {
        return false;
    }
    if !start_matches(source.start.as_deref(), destination.spent_on.as_deref()) {
        return false;
    }
    destination.comment == tagged_comment(source)
}

fn start_matches(source: Option<&str>, destination: Option<&str>) -> bool {
    match (source, destination) {
        (None, None) => true,
        (Some(src), Some(dest)) => {
            if NaiveDate::parse_from_str(dest, "%Y-%m-%d").is_ok() {
                src.get(..10) == Some(dest)
            } else {
                match (minute_key(src), minute_key(dest)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
        }
        _ => false,
    }
}

/// Normalizes an ISO-ish timestamp to minute granularity, absorbing
/// sub-second and timezone-format differences between the two systems.
fn minute_key(value: &str) -> Option<String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).format("%Y-%m-%dT%H:%M").to_string());
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc).format("%Y-%m-%dT%H:%M").to_string());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.format("%Y-%m-%dT%H:%M").to_string())
}
