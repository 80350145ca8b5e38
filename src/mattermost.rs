//! Builds the Mattermost run summary: entry counts, a worked-time mood line,
//! issue-id coverage and a top-3 per-issue breakdown.

use std::collections::HashMap;

use chrono::Local;
use togglsync_api::{MattermostClient, Result as ApiResult, TogglEntry};

use crate::config::ProjectEntry;

const SECONDS_PER_HOUR: i64 = 3600;
const SHORT_DAY_SECS: i64 = 4 * SECONDS_PER_HOUR;
const OVERTIME_SECS: i64 = 8 * SECONDS_PER_HOUR;
const FEW_ENTRIES: usize = 5;
const MANY_ENTRIES: usize = 40;
const TOP_ISSUES: usize = 3;

#[derive(Debug, Default)]
pub struct MattermostNotifier {
    lines: Vec<String>,
}

impl MattermostNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn append_duration(&mut self, days: u32) {
        let unit = if days == 1 { "day" } else { "days" };
        self.append(format!("Sync: {} {}", days, unit));
    }

    /// Appends the summary for one day of toggl entries. Pending entries
    /// (negative duration) are excluded from every aggregate; "filtered"
    /// counts the entries that also carry an issue id.
    pub fn append_entries(&mut self, entries: &[TogglEntry], project: &ProjectEntry) {
        let eligible: Vec<&TogglEntry> = entries.iter().filter(|e| e.duration >= 0).collect();
        let tracked: Vec<(&TogglEntry, String)> = eligible
            .iter()
            .filter_map(|entry| {
                project
                    .issue_id(&entry.description)
                    .map(|issue_id| (*entry, issue_id))
            })
            .collect();

        self.append(format!(
            "Found entries in toggl: **{}** (filtered: **{}**)",
            entries.len(),
            tracked.len()
        ));
        self.append_summary(&eligible, tracked.len());
        self.append_issue_summary(&tracked);
    }

    fn append_summary(&mut self, eligible: &[&TogglEntry], tracked_count: usize) {
        if eligible.is_empty() {
            self.append("Altogether you did not work today at all :cry:. Hope you ok?");
            return;
        }

        let total: i64 = eligible.iter().map(|entry| entry.duration).sum();
        if total < SHORT_DAY_SECS {
            self.append(format!(
                "You worked almost less than 4 hours today (exactly {}), not every day is a perfect day, right? :smirk:.",
                Self::format_seconds(total)
            ));
        } else if total <= OVERTIME_SECS {
            self.append(format!(
                "Solid day of work today (exactly {}). Keep the pace :sunglasses:!",
                Self::format_seconds(total)
            ));
        } else {
            self.append(format!(
                "Wow you did overtime today :rocket:! Doing overtime from time to time can be good, but life after work is also important. Remember this next time taking {} in work :sunglasses:!",
                Self::format_seconds(total)
            ));
        }

        if eligible.len() < FEW_ENTRIES {
            self.append(
                "Huh, not many entries. It means, you did only a couple of tasks, but did it right .. right? :open_mouth:",
            );
        } else if eligible.len() < MANY_ENTRIES {
            self.append("Average day. Not too few, not too many entries :sunglasses:.");
        } else {
            self.append(format!(
                "You did {} entries like a boss :smirk: :boom:!",
                eligible.len()
            ));
        }

        let ratio = tracked_count as f64 / eligible.len() as f64;
        if ratio < 0.25 {
            self.append("Ugh. Less than 25% of your work had an issue id. Not so good :cry:.");
        } else if ratio < 0.5 {
            self.append("Almost 50% of your today work had an issue id :blush:.");
        } else if ratio <= 0.75 {
            self.append("It's gooood. A lot of today work had an issue id! Congrats :sunglasses:.");
        } else {
            self.append(
                "It seems that more than 75% of your today work had an issue id! So .. you rock :rocket:!",
            );
        }
    }

    fn append_issue_summary(&mut self, tracked: &[(&TogglEntry, String)]) {
        if tracked.is_empty() {
            return;
        }

        let mut totals: HashMap<&str, i64> = HashMap::new();
        for (entry, issue_id) in tracked {
            *totals.entry(issue_id.as_str()).or_default() += entry.duration;
        }
        let mut ranked: Vec<(&str, i64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        self.append("");
        self.append("---");
        self.append("**Issue summary**");
        self.append("You spent most time on:");
        for (issue_id, seconds) in ranked.into_iter().take(TOP_ISSUES) {
            self.append(format!(
                "- #{}: {:.2} h",
                issue_id,
                seconds as f64 / SECONDS_PER_HOUR as f64
            ));
        }
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub async fn send(&self, client: &MattermostClient) -> ApiResult<()> {
        client.send(&self.render()).await
    }

    pub fn format_seconds(seconds: i64) -> String {
        if seconds < 60 {
            format!("{} s", seconds)
        } else if seconds < SECONDS_PER_HOUR {
            format!("{} m", seconds / 60)
        } else {
            format!("{:.2} h", seconds as f64 / SECONDS_PER_HOUR as f64)
        }
    }

    /// Keeps only entries started on the current local day.
    pub fn filter_today(entries: &[TogglEntry]) -> Vec<TogglEntry> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        entries
            .iter()
            .filter(|entry| {
                entry
                    .start
                    .as_deref()
                    .and_then(|start| start.get(..10))
                    .map(|date| date == today)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::MattermostNotifier;
    use crate::config::ProjectEntry;
    use chrono::Local;
    use togglsync_api::TogglEntry;

    fn project() -> ProjectEntry {
        ProjectEntry::new("test", &["(#)([0-9]{1,})"]).expect("project entry")
    }

    fn today_start() -> String {
        Local::now().format("%Y-%m-%dT08:00:00").to_string()
    }

    fn entry(id: i64, duration: i64, description: &str) -> TogglEntry {
        TogglEntry::new(id, duration, Some(&today_start()), description)
    }

    #[test]
    fn append_then_render_keeps_text_verbatim() {
        let mut notifier = MattermostNotifier::new();
        notifier.append("test");
        assert_eq!(notifier.render(), "test");
    }

    #[test]
    fn no_entries_renders_empty_day_message() {
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(&[], &project());

        assert_eq!(
            notifier.render(),
            "Found entries in toggl: **0** (filtered: **0**)\n\
             Altogether you did not work today at all :cry:. Hope you ok?"
        );
    }

    #[test]
    fn single_entry_without_issue_id() {
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(&[entry(777, 60, "")], &project());

        assert_eq!(
            notifier.render(),
            "Found entries in toggl: **1** (filtered: **0**)\n\
             You worked almost less than 4 hours today (exactly 1 m), not every day is a perfect day, right? :smirk:.\n\
             Huh, not many entries. It means, you did only a couple of tasks, but did it right .. right? :open_mouth:\n\
             Ugh. Less than 25% of your work had an issue id. Not so good :cry:."
        );
    }

    #[test]
    fn half_tracked_day_includes_issue_summary() {
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(
            &[entry(776, 60, ""), entry(777, 60, "#666 Hardwork")],
            &project(),
        );

        assert_eq!(
            notifier.render(),
            "Found entries in toggl: **2** (filtered: **1**)\n\
             You worked almost less than 4 hours today (exactly 2 m), not every day is a perfect day, right? :smirk:.\n\
             Huh, not many entries. It means, you did only a couple of tasks, but did it right .. right? :open_mouth:\n\
             It's gooood. A lot of today work had an issue id! Congrats :sunglasses:.\n\
             \n\
             ---\n\
             **Issue summary**\n\
             You spent most time on:\n\
             - #666: 0.02 h"
        );
    }

    #[test]
    fn pending_entries_are_excluded_from_aggregates() {
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(
            &[
                entry(777, 3600, "test #333"),
                entry(778, -300, "test #334"),
            ],
            &project(),
        );

        assert_eq!(
            notifier.render(),
            "Found entries in toggl: **2** (filtered: **1**)\n\
             You worked almost less than 4 hours today (exactly 1.00 h), not every day is a perfect day, right? :smirk:.\n\
             Huh, not many entries. It means, you did only a couple of tasks, but did it right .. right? :open_mouth:\n\
             It seems that more than 75% of your today work had an issue id! So .. you rock :rocket:!\n\
             \n\
             ---\n\
             **Issue summary**\n\
             You spent most time on:\n\
             - #333: 1.00 h"
        );
    }

    #[test]
    fn overtime_day_gets_the_overtime_line() {
        let entries: Vec<TogglEntry> = (0..9)
            .map(|i| entry(i, 4 * 3600, "#666 Hardwork"))
            .collect();
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(&entries, &project());

        let rendered = notifier.render();
        assert!(rendered.contains(
            "Wow you did overtime today :rocket:! Doing overtime from time to time can be good, \
             but life after work is also important. Remember this next time taking 36.00 h in work :sunglasses:!"
        ));
        assert!(rendered.contains("Average day. Not too few, not too many entries :sunglasses:."));
    }

    #[test]
    fn many_entries_get_the_boss_line() {
        let entries: Vec<TogglEntry> =
            (0..50).map(|i| entry(i, 60, "#666 Hardwork")).collect();
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(&entries, &project());

        assert!(notifier
            .render()
            .contains("You did 50 entries like a boss :smirk: :boom:!"));
    }

    #[test]
    fn issue_summary_ranks_top_three_by_time() {
        let mut notifier = MattermostNotifier::new();
        notifier.append_entries(
            &[
                entry(1, 3600, "test #333"),
                entry(2, 3600, "test #333"),
                entry(3, 3600, "test #333"),
                entry(4, 3600, "test #333"),
                entry(5, 30 * 60, "test #334"),
                entry(6, 2 * 3600, "test #335"),
                entry(7, 10 * 3600, "test #400"),
            ],
            &project(),
        );

        let rendered = notifier.render();
        let summary_at = rendered.find("You spent most time on:").expect("summary");
        assert_eq!(
            &rendered[summary_at..],
            "You spent most time on:\n\
             - #400: 10.00 h\n\
             - #333: 4.00 h\n\
             - #335: 2.00 h"
        );
    }

    #[test]
    fn duration_header_pluralizes_days() {
        for (days, expected) in [(0, "Sync: 0 days"), (1, "Sync: 1 day"), (2, "Sync: 2 days")] {
            let mut notifier = MattermostNotifier::new();
            notifier.append_duration(days);
            assert_eq!(notifier.render(), expected);
        }
    }

    #[test]
    fn format_seconds_picks_readable_units() {
        assert_eq!(MattermostNotifier::format_seconds(45), "45 s");
        assert_eq!(MattermostNotifier::format_seconds(5 * 60), "5 m");
        assert_eq!(MattermostNotifier::format_seconds(36000), "10.00 h");
    }

    #[test]
    fn filter_today_drops_other_days_and_missing_starts() {
        let today = entry(777, 3600, "#666 Hardwork");
        let undated = TogglEntry::new(778, 3600, None, "#666 Hardwork");
        let yesterday = TogglEntry::new(779, 3600, Some("2016-01-01T08:00:00"), "#666 Hardwork");

        let actual = MattermostNotifier::filter_today(&[today, undated, yesterday]);

        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].id, 777);
    }

    #[test]
    fn filter_today_handles_empty_input() {
        assert!(MattermostNotifier::filter_today(&[]).is_empty());
    }
}
