use serde_json::Value;

/// A time-log record in the destination tracker, normalized to a common
/// shape. `id` stays opaque because Redmine uses integers and Jira strings;
/// `hours` is the logged amount converted to decimal hours regardless of the
/// tracker's native unit.
#[derive(Debug, Clone)]
pub struct DestinationEntry {
    pub id: Value,
    pub created_on: Option<String>,
    pub author: Option<String>,
    pub hours: f64,
    /// Start reference as recorded by the tracker: a `YYYY-MM-DD` date for
    /// Redmine, a full timestamp for Jira.
    pub spent_on: Option<String>,
    /// Issue identifier in string form, whatever the tracker's native type.
    pub issue_id: String,
    pub comment: String,
}

impl DestinationEntry {
    /// Renders the opaque record id into its URL path form.
    pub fn id_string(&self) -> String {
        value_to_id_string(&self.id)
    }
}

pub(crate) fn value_to_id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
