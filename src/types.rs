//! Wire types received from the dashboard backend.
//!
//! The backend owns scoring and extraction; these are value objects taken
//! verbatim from each response. Decoding is lenient: a missing, `null` or
//! wrong-typed field becomes its empty value rather than failing the whole
//! fetch.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Treat `null` and values of the wrong shape like an absent field.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Accept RFC 3339 or a naive ISO timestamp (assumed UTC). Anything else is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Dashboard entities
// ============================================================================

/// A work context: a cluster of related emails, documents and meetings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub related_items: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub urgency: String,
    /// `YYYY-MM-DD`
    #[serde(default, deserialize_with = "lenient")]
    pub deadline: String,
    #[serde(default, deserialize_with = "lenient")]
    pub tasks: Vec<String>,
}

/// A task with its backend-computed priority score (0-100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    /// Name of the work context this task belongs to.
    #[serde(default, deserialize_with = "lenient")]
    pub context: String,
    #[serde(default, deserialize_with = "lenient")]
    pub deadline: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub priority_score: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient")]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveLoad {
    #[serde(default, deserialize_with = "lenient")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient")]
    pub active_contexts: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub urgent_tasks: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub switches: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub breakdown: String,
}

impl CognitiveLoad {
    /// Decode a `cognitive_load` value. The backend sends `{}` when it has
    /// nothing to report, which is "no data", not a zero score.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match &value {
            serde_json::Value::Object(map) if !map.is_empty() => {
                serde_json::from_value(value).ok()
            }
            _ => None,
        }
    }
}

/// A behavioral observation, e.g. frequent context switching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: String,
    #[serde(default, deserialize_with = "lenient")]
    pub count: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub task: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tasks: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default, deserialize_with = "lenient")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient")]
    pub expected_impact: String,
}

/// Aggregate of every dashboard resource in one response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default, deserialize_with = "lenient")]
    pub contexts: Vec<Context>,
    #[serde(default, deserialize_with = "lenient")]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "load_field")]
    pub cognitive_load: Option<CognitiveLoad>,
    #[serde(default, deserialize_with = "lenient")]
    pub insights: Vec<Insight>,
    #[serde(default, deserialize_with = "lenient")]
    pub recommendations: Vec<Recommendation>,
}

fn load_field<'de, D>(deserializer: D) -> Result<Option<CognitiveLoad>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(CognitiveLoad::from_value(value))
}

// ============================================================================
// Google link
// ============================================================================

/// Link status as reported by `/api/google/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub connected: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub has_calendar_data: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub has_email_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedCounts {
    #[serde(default, deserialize_with = "lenient")]
    pub calendar: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub emails: u32,
}

/// Body of a completed `/api/google/sync` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// `success`, `partial` or `error`.
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient")]
    pub synced: SyncedCounts,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub errors: Vec<String>,
}

impl SyncReport {
    /// The backend completed the pass but one source failed.
    pub fn is_partial(&self) -> bool {
        self.status == "partial"
    }

    /// The backend completed the request but the pass itself failed.
    pub fn is_failure(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Assistant
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantContextUsed {
    #[serde(default, deserialize_with = "lenient")]
    pub contexts: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub tasks: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub load_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default, deserialize_with = "lenient")]
    pub response: String,
    #[serde(default, deserialize_with = "lenient")]
    pub context_used: Option<AssistantContextUsed>,
}
