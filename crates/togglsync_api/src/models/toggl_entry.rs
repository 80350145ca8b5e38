use serde::Deserialize;

/// A single Toggl time record. A negative `duration` marks an entry that is
/// still running and must not be synchronized.
#[derive(Debug, Deserialize, Clone)]
pub struct TogglEntry {
    pub id: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl TogglEntry {
    pub fn new(
        id: i64,
        duration: i64,
        start: Option<&str>,
        description: &str,
    ) -> Self {
        Self {
            id,
            duration,
            start: start.map(ToOwned::to_owned),
            description: description.to_string(),
        }
    }
}
