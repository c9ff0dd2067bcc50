//! Work contexts panel.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::Context;

pub struct ContextsPanel;

#[async_trait]
impl Panel for ContextsPanel {
    const NAME: &'static str = "contexts";
    type Snapshot = Vec<Context>;

    async fn load(&self, api: &dyn DashboardApi, user_id: &str) -> Result<Vec<Context>, ApiError> {
        api.contexts(user_id).await
    }

    fn is_empty(snapshot: &Vec<Context>) -> bool {
        snapshot.is_empty()
    }

    fn empty_message() -> &'static str {
        "No work contexts yet. Contexts appear once calendar and email data has been synced."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    High,
    Medium,
    Low,
    Unknown,
}

impl Urgency {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" | "critical" => Urgency::High,
            "medium" | "normal" => Urgency::Medium,
            "low" => Urgency::Low,
            _ => Urgency::Unknown,
        }
    }
}

pub fn urgency(context: &Context) -> Urgency {
    Urgency::parse(&context.urgency)
}

/// Days from `today` to the context deadline. Negative when overdue.
pub fn days_until_deadline(context: &Context, today: NaiveDate) -> Option<i64> {
    let deadline = NaiveDate::parse_from_str(context.deadline.trim(), "%Y-%m-%d").ok()?;
    Some((deadline - today).num_days())
}

/// Most urgent first, then nearest deadline, then name.
pub fn by_urgency(contexts: &[Context]) -> Vec<&Context> {
    let mut out: Vec<&Context> = contexts.iter().collect();
    out.sort_by(|a, b| {
        urgency(a)
            .cmp(&urgency(b))
            .then_with(|| compare_deadline(&a.deadline, &b.deadline))
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

fn compare_deadline(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (false, false) => a.cmp(b),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(name: &str, urgency: &str, deadline: &str) -> Context {
        Context {
            id: format!("ctx_{}", name.to_lowercase()),
            name: name.to_string(),
            urgency: urgency.to_string(),
            deadline: deadline.to_string(),
            ..Context::default()
        }
    }

    #[test]
    fn orders_by_urgency_then_deadline() {
        let contexts = vec![
            context("College", "medium", "2026-03-09"),
            context("Side project", "", ""),
            context("Hackathon Review", "high", "2026-03-04"),
            context("Taxes", "medium", "2026-03-05"),
        ];
        let names: Vec<&str> = by_urgency(&contexts).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Hackathon Review", "Taxes", "College", "Side project"]);
    }

    #[test]
    fn urgency_is_case_insensitive() {
        assert_eq!(Urgency::parse("HIGH"), Urgency::High);
        assert_eq!(Urgency::parse(" low "), Urgency::Low);
        assert_eq!(Urgency::parse("whenever"), Urgency::Unknown);
    }

    #[test]
    fn deadline_distance() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(
            days_until_deadline(&context("A", "high", "2026-03-04"), today),
            Some(2)
        );
        assert_eq!(
            days_until_deadline(&context("B", "high", "2026-03-01"), today),
            Some(-1)
        );
        assert_eq!(days_until_deadline(&context("C", "high", ""), today), None);
        assert_eq!(
            days_until_deadline(&context("D", "high", "next week"), today),
            None
        );
    }
}
