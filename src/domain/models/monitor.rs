#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde_derive::Deserialize;
use serde_derive::Serialize;

fn deserialize_last_checked<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    // The backend reports never-checked monitors with the zero timestamp.
    let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    return Ok(value.filter(|checked_at| return checked_at.year() > 1));
}

fn deserialize_explanation<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    return Ok(value.filter(|text| return !text.trim().is_empty()));
}

/// A health-check target as last reported by the backend. Monitors are
/// immutable from the client's point of view, the store only ever swaps the
/// whole list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub url: String,
    #[serde(rename = "interval")]
    pub interval_nanoseconds: i64,
    #[serde(
        rename = "last_checked",
        default,
        deserialize_with = "deserialize_last_checked"
    )]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_code: i64,
    #[serde(rename = "response_time", default)]
    pub response_time_millis: i64,
    #[serde(default)]
    pub is_healthy: bool,
    #[serde(default)]
    pub is_running: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_explanation",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_explanation: Option<String>,
}

impl Monitor {
    pub fn interval_seconds(&self) -> f64 {
        return self.interval_nanoseconds as f64 / 1_000_000_000.0;
    }

    pub fn has_been_checked(&self) -> bool {
        return self.status_code != 0;
    }

    /// Failing after at least one real check. Fresh monitors report unhealthy
    /// until their first check and are not highlighted.
    pub fn is_degraded(&self) -> bool {
        return !self.is_healthy && self.has_been_checked();
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_healthy {
            return "Operational";
        }
        return "Failed";
    }

    pub fn status_code_label(&self) -> String {
        if !self.has_been_checked() {
            return "--".to_string();
        }
        return self.status_code.to_string();
    }

    pub fn response_time_label(&self) -> String {
        if self.response_time_millis == 0 {
            return "-- ms".to_string();
        }
        return format!("{}ms", self.response_time_millis);
    }

    pub fn last_checked_label(&self, now: DateTime<Utc>) -> String {
        return match self.last_checked_at {
            Some(checked_at) => humanize_since(checked_at, now),
            None => "Pending".to_string(),
        };
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        return format!("1 {unit}");
    }
    return format!("{count} {unit}s");
}

pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "less than a minute ago".to_string();
    }
    if minutes < 60 {
        return format!("{} ago", plural(minutes, "minute"));
    }

    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("about {} ago", plural(hours, "hour"));
    }

    return format!("{} ago", plural(elapsed.num_days(), "day"));
}

/// What Presentation renders for the monitor list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorsView {
    pub monitors: Vec<Monitor>,
    /// True until the first refresh settles, either way.
    pub loading: bool,
    /// Transient banner left by the most recent failed refresh.
    pub error: Option<String>,
    pub applied_sequence: u64,
}

impl Default for MonitorsView {
    fn default() -> MonitorsView {
        return MonitorsView {
            monitors: vec![],
            loading: true,
            error: None,
            applied_sequence: 0,
        };
    }
}
