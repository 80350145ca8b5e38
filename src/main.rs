use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use togglsync::config::{Config, ProjectEntry};
use togglsync::mattermost::MattermostNotifier;
use togglsync::synchronizer::{SyncReport, Synchronizer};
use togglsync_api::{Destination, JiraClient, MattermostClient, RedmineClient, TogglClient};

#[derive(Debug, Parser)]
#[command(
    name = "togglsync",
    about = "Synchronizes Toggl time entries into Redmine or Jira work logs"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Number of days back to synchronize, starting with today.
    #[arg(short, long, default_value_t = 1)]
    days: u32,

    /// Send a summary to the configured Mattermost webhook after the run.
    #[arg(short, long)]
    mattermost: bool,

    /// Abort the whole run on the first collaborator failure.
    #[arg(long)]
    strict: bool,

    /// Log create/update operations instead of writing to the destination.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let mut failures = 0;
    for entry in &config.entries {
        info!("synchronizing {:?}", entry.label);
        let toggl = TogglClient::new(config.toggl.as_str(), entry.toggl.as_str())?;
        let destination = build_destination(&config, entry, args.dry_run)?;
        let synchronizer =
            Synchronizer::new(&toggl, destination.as_ref(), entry).strict(args.strict);

        let report = synchronizer.run(args.days).await?;
        log_report(&report);
        failures += report.failure_count();

        if args.mattermost {
            notify(&config, entry, args.days, &report).await?;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} issue group(s) failed to synchronize");
    }
    Ok(())
}

fn build_destination(
    config: &Config,
    entry: &ProjectEntry,
    dry_run: bool,
) -> anyhow::Result<Box<dyn Destination>> {
    if let Some(api_key) = &entry.redmine {
        let url = config
            .redmine
            .as_ref()
            .context("redmine entry without a redmine url")?;
        return Ok(Box::new(RedmineClient::new(
            url.as_str(),
            api_key.as_str(),
            dry_run,
        )?));
    }
    if let Some(api_token) = &entry.jira {
        let jira = config
            .jira
            .as_ref()
            .context("jira entry without a jira section")?;
        return Ok(Box::new(JiraClient::new(
            jira.url.as_str(),
            jira.username.as_str(),
            api_token.as_str(),
            dry_run,
        )?));
    }
    anyhow::bail!("entry {:?} configures no destination", entry.label);
}

fn log_report(report: &SyncReport) {
    for day in &report.days {
        info!(
            "day {}: {} toggl entries, {} issue group(s), {} failure(s)",
            day.days_back,
            day.entries.len(),
            day.issues.len(),
            day.failures.len()
        );
        for failure in &day.failures {
            warn!("{failure}");
        }
    }
}

async fn notify(
    config: &Config,
    entry: &ProjectEntry,
    days: u32,
    report: &SyncReport,
) -> anyhow::Result<()> {
    let Some(section) = &config.mattermost else {
        warn!("mattermost notification requested but not configured");
        return Ok(());
    };

    let client = MattermostClient::new(section.url.as_str())?.with_channels(section.channels());
    let mut notifier = MattermostNotifier::new();
    notifier.append_duration(days);
    for day in &report.days {
        notifier.append_entries(&day.entries, entry);
    }
    notifier
        .send(&client)
        .await
        .context("error sending to mattermost")?;
    Ok(())
}
