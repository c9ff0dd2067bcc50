//! "Why this task is priority #1" panel.
//!
//! Explains the top-ranked task with the four factors the backend weighs.
//! The factor values are read off the task and its context; no score is
//! recomputed here.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::contexts;
use super::tasks::{self, SourceIcon};
use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::{Context, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    DeadlineProximity,
    ContextImportance,
    ActivitySignals,
    DelayRisk,
}

impl Factor {
    pub const ALL: [Factor; 4] = [
        Factor::DeadlineProximity,
        Factor::ContextImportance,
        Factor::ActivitySignals,
        Factor::DelayRisk,
    ];

    /// Share of the final score, in percent.
    pub fn weight(&self) -> u8 {
        match self {
            Factor::DeadlineProximity => 40,
            Factor::ContextImportance => 30,
            Factor::ActivitySignals => 20,
            Factor::DelayRisk => 10,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Factor::DeadlineProximity => "Deadline Proximity",
            Factor::ContextImportance => "Context Importance",
            Factor::ActivitySignals => "User Activity Signals",
            Factor::DelayRisk => "Delay Risk",
        }
    }

    fn legend_name(&self) -> &'static str {
        match self {
            Factor::DeadlineProximity => "deadline proximity",
            Factor::ContextImportance => "context importance",
            Factor::ActivitySignals => "activity signals",
            Factor::DelayRisk => "delay risk",
        }
    }
}

/// "A weighted combination of deadline proximity (40%), ..."
pub fn weighting_legend() -> String {
    let parts: Vec<String> = Factor::ALL
        .iter()
        .map(|f| format!("{} ({}%)", f.legend_name(), f.weight()))
        .collect();
    let last = parts.len() - 1;
    format!(
        "A weighted combination of {}, and {}.",
        parts[..last].join(", "),
        parts[last]
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    pub factor: Factor,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explanation<'a> {
    pub task: &'a Task,
    pub factors: Vec<FactorRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityInputs {
    pub tasks: Vec<Task>,
    pub contexts: Vec<Context>,
}

pub struct PriorityPanel;

#[async_trait]
impl Panel for PriorityPanel {
    const NAME: &'static str = "priority";
    type Snapshot = PriorityInputs;

    async fn load(&self, api: &dyn DashboardApi, user_id: &str) -> Result<PriorityInputs, ApiError> {
        let (tasks, contexts) = tokio::try_join!(api.tasks(user_id), api.contexts(user_id))?;
        Ok(PriorityInputs { tasks, contexts })
    }

    fn is_empty(snapshot: &PriorityInputs) -> bool {
        snapshot.tasks.is_empty()
    }

    fn empty_message() -> &'static str {
        "Nothing to explain yet. The top task's breakdown appears once tasks are detected."
    }
}

/// Breakdown for the highest-ranked task, `None` when there are no tasks.
pub fn explain(inputs: &PriorityInputs, today: NaiveDate) -> Option<Explanation<'_>> {
    let task = *tasks::ranked(&inputs.tasks).first()?;
    let context = inputs.contexts.iter().find(|c| c.name == task.context);

    let factors = Factor::ALL
        .iter()
        .map(|&factor| FactorRow {
            factor,
            value: factor_value(factor, task, context, today),
        })
        .collect();

    Some(Explanation { task, factors })
}

fn factor_value(factor: Factor, task: &Task, context: Option<&Context>, today: NaiveDate) -> String {
    match factor {
        Factor::DeadlineProximity => deadline_proximity(task, context, today).to_string(),
        Factor::ContextImportance => {
            if task.context.trim().is_empty() {
                "Unassigned".to_string()
            } else {
                task.context.clone()
            }
        }
        Factor::ActivitySignals => activity_signals(task, context),
        Factor::DelayRisk => {
            if tasks::is_top_priority(task) {
                "High impact if missed".to_string()
            } else if task.priority_score >= 50.0 {
                "Moderate impact if missed".to_string()
            } else {
                "Low impact if missed".to_string()
            }
        }
    }
}

fn deadline_proximity(task: &Task, context: Option<&Context>, today: NaiveDate) -> &'static str {
    let days = task
        .deadline
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .map(|d| (d - today).num_days())
        .or_else(|| context.and_then(|c| contexts::days_until_deadline(c, today)));

    match days {
        Some(d) if d <= 1 => "High",
        Some(d) if d <= 3 => "Medium",
        Some(_) => "Low",
        None => "No deadline",
    }
}

/// Distinct sources behind the task's context, e.g. `Email + Document`.
fn activity_signals(task: &Task, context: Option<&Context>) -> String {
    let mut seen: Vec<SourceIcon> = Vec::new();
    let related = context.map(|c| c.related_items.as_slice()).unwrap_or(&[]);
    for item in related {
        if let Some(icon) = tasks::icon_for(item) {
            if !seen.contains(&icon) {
                seen.push(icon);
            }
        }
    }
    if seen.is_empty() {
        let icon = tasks::source_icon(task);
        if icon == SourceIcon::General {
            return "No recent activity".to_string();
        }
        seen.push(icon);
    }
    seen.iter().map(SourceIcon::label).collect::<Vec<_>>().join(" + ")
}
