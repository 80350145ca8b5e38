//! YAML configuration model: collaborator endpoints plus one entry per
//! synchronized project.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid task pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Top-level configuration file contents.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Toggl API base URL.
    pub toggl: String,
    /// Redmine base URL, when Redmine is a configured destination.
    #[serde(default)]
    pub redmine: Option<String>,
    #[serde(default)]
    pub jira: Option<JiraSection>,
    #[serde(default)]
    pub mattermost: Option<MattermostSection>,
    pub entries: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
pub struct JiraSection {
    pub url: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct MattermostSection {
    pub url: String,
    #[serde(default)]
    pub channel: Option<ChannelSpec>,
}

/// One channel or a list of channels; the empty string stands for the
/// webhook's default channel.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChannelSpec {
    One(String),
    Many(Vec<String>),
}

impl MattermostSection {
    pub fn channels(&self) -> Vec<String> {
        match &self.channel {
            None => Vec::new(),
            Some(ChannelSpec::One(channel)) => vec![channel.clone()],
            Some(ChannelSpec::Many(channels)) => channels.clone(),
        }
    }
}

/// Per-project synchronization entry: the API credentials for both ends and
/// the ordered issue patterns used to extract issue ids from descriptions.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEntry {
    pub label: String,
    /// Toggl API token for this project.
    pub toggl: String,
    /// Redmine API key; mutually exclusive with `jira`.
    #[serde(default)]
    pub redmine: Option<String>,
    /// Jira API token; mutually exclusive with `redmine`.
    #[serde(default)]
    pub jira: Option<String>,
    pub task_patterns: Vec<String>,
    #[serde(skip)]
    patterns: Vec<Regex>,
}

impl ProjectEntry {
    /// Builds an entry directly from patterns, compiling them immediately.
    pub fn new(label: &str, task_patterns: &[&str]) -> Result<Self, ConfigError> {
        let mut entry = Self {
            label: label.to_string(),
            toggl: String::new(),
            redmine: None,
            jira: None,
            task_patterns: task_patterns.iter().map(|p| p.to_string()).collect(),
            patterns: Vec::new(),
        };
        entry.compile_patterns()?;
        Ok(entry)
    }

    fn compile_patterns(&mut self) -> Result<(), ConfigError> {
        self.patterns = self
            .task_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Extracts the issue identifier from a free-text description. Patterns
    /// are tried in configured order and the first match wins; the pattern's
    /// last capture group carries the identifier with the prefix stripped.
    /// `None` means the description has no issue association.
    pub fn issue_id(&self, description: &str) -> Option<String> {
        for pattern in &self.patterns {
            if let Some(captures) = pattern.captures(description) {
                let last = captures
                    .get(captures.len() - 1)
                    .or_else(|| captures.get(0));
                if let Some(matched) = last {
                    return Some(matched.as_str().to_string());
                }
            }
        }
        None
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        for entry in &mut config.entries {
            entry.compile_patterns()?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::Invalid("no entries configured".to_string()));
        }
        for entry in &self.entries {
            match (&entry.redmine, &entry.jira) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "entry {:?} configures both redmine and jira",
                        entry.label
                    )));
                }
                (None, None) => {
                    return Err(ConfigError::Invalid(format!(
                        "entry {:?} configures no destination",
                        entry.label
                    )));
                }
                (Some(_), None) if self.redmine.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "entry {:?} uses redmine but no redmine url is configured",
                        entry.label
                    )));
                }
                (None, Some(_)) if self.jira.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "entry {:?} uses jira but no jira section is configured",
                        entry.label
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, ProjectEntry};
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("togglsync-tests-{name}-{nanos}/config.yml"))
    }

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = unique_path(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("create temp directory");
        fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn loads_full_config() {
        let path = write_config(
            "full",
            r##"
toggl: https://www.toggl.com/api/v8/
redmine: http://redmine.url/
mattermost:
  url: http://mattermost.url/
  channel: "#channell"
entries:
  - label: entry 1
    toggl: toggl-api-key
    redmine: redmine-api-key
    task_patterns: ["(#)([0-9]{1,})"]
  - label: entry 2
    toggl: toggl-api-key2
    redmine: redmine-api-key2
    task_patterns: ["(#)([0-9]{1,})"]
"##,
        );

        let config = Config::from_file(&path).expect("config");
        assert_eq!(config.toggl, "https://www.toggl.com/api/v8/");
        assert_eq!(config.redmine.as_deref(), Some("http://redmine.url/"));
        let mattermost = config.mattermost.expect("mattermost");
        assert_eq!(mattermost.url, "http://mattermost.url/");
        assert_eq!(mattermost.channels(), vec!["#channell".to_string()]);

        assert_eq!(config.entries.len(), 2);
        assert_eq!(config.entries[0].label, "entry 1");
        assert_eq!(config.entries[0].redmine.as_deref(), Some("redmine-api-key"));
        assert_eq!(config.entries[1].toggl, "toggl-api-key2");

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn channel_list_is_preserved_in_order() {
        let path = write_config(
            "channels",
            r##"
toggl: https://www.toggl.com/api/v8/
redmine: http://redmine.url/
mattermost:
  url: http://mattermost.url/
  channel: ["", "#channel2"]
entries:
  - label: entry 1
    toggl: toggl-api-key
    redmine: redmine-api-key
    task_patterns: ["(#)([0-9]{1,})"]
"##,
        );

        let config = Config::from_file(&path).expect("config");
        let channels = config.mattermost.expect("mattermost").channels();
        assert_eq!(channels, vec![String::new(), "#channel2".to_string()]);

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn missing_toggl_url_is_a_parse_error() {
        let path = write_config(
            "no-toggl",
            r#"
redmine: http://redmine.url/
entries: []
"#,
        );

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_)));

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn empty_entries_are_rejected() {
        let path = write_config(
            "no-entries",
            r#"
toggl: https://www.toggl.com/api/v8/
redmine: http://redmine.url/
entries: []
"#,
        );

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn entry_without_destination_is_rejected() {
        let path = write_config(
            "no-destination",
            r#"
toggl: https://www.toggl.com/api/v8/
entries:
  - label: entry 1
    toggl: toggl-api-key
    task_patterns: ["(#)([0-9]{1,})"]
"#,
        );

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn jira_entry_requires_jira_section() {
        let path = write_config(
            "jira-missing",
            r#"
toggl: https://www.toggl.com/api/v8/
entries:
  - label: entry 1
    toggl: toggl-api-key
    jira: jira-api-token
    task_patterns: ["([A-Z]+-[0-9]+)"]
"#,
        );

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn invalid_task_pattern_is_rejected() {
        let path = write_config(
            "bad-pattern",
            r#"
toggl: https://www.toggl.com/api/v8/
redmine: http://redmine.url/
entries:
  - label: entry 1
    toggl: toggl-api-key
    redmine: redmine-api-key
    task_patterns: ["(#)([0-9"]
"#,
        );

        let err = Config::from_file(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::Pattern { .. }));

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn issue_id_takes_first_matching_pattern() {
        let entry =
            ProjectEntry::new("test", &["(#)([0-9]{1,})", "([A-Z]+-[0-9]+)"]).expect("entry");

        assert_eq!(entry.issue_id("#987 hard work"), Some("987".to_string()));
        assert_eq!(entry.issue_id("work on SYNC-42"), Some("SYNC-42".to_string()));
        assert_eq!(entry.issue_id("#987 or SYNC-42"), Some("987".to_string()));
        assert_eq!(entry.issue_id("no reference here"), None);
    }
}
