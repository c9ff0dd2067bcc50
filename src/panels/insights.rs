//! Work habit insights panel.

use async_trait::async_trait;

use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::Insight;

pub struct InsightsPanel;

#[async_trait]
impl Panel for InsightsPanel {
    const NAME: &'static str = "insights";
    type Snapshot = Vec<Insight>;

    async fn load(&self, api: &dyn DashboardApi, user_id: &str) -> Result<Vec<Insight>, ApiError> {
        api.insights(user_id).await
    }

    fn is_empty(snapshot: &Vec<Insight>) -> bool {
        snapshot.is_empty()
    }

    fn empty_message() -> &'static str {
        "No insights yet. Keep working and patterns will show up here."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Severity::High,
            "medium" | "warning" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

/// Highest severity first. Backend order is kept within a severity.
pub fn by_severity(insights: &[Insight]) -> Vec<&Insight> {
    let mut out: Vec<&Insight> = insights.iter().collect();
    out.sort_by_key(|i| Severity::parse(&i.severity));
    out
}

/// `context_switching` -> `Context switching`
pub fn kind_label(insight: &Insight) -> String {
    let words = insight.kind.replace('_', " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Insight".to_string(),
    }
}

/// What the insight is about, if the backend said.
pub fn subject(insight: &Insight) -> Option<String> {
    if let Some(tasks) = insight.tasks.as_ref().filter(|t| !t.is_empty()) {
        return Some(tasks.join(", "));
    }
    if let Some(task) = insight.task.as_ref().filter(|t| !t.is_empty()) {
        return Some(task.clone());
    }
    insight.count.map(|n| format!("{} times", n))
}
