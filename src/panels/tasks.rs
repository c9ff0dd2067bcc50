//! Ranked tasks panel ("What should I work on next?").
//!
//! Ordering and badges are derived from the fetched snapshot only; the
//! backend's `priority_score` is taken as-is.

use std::cmp::Ordering;

use async_trait::async_trait;

use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::Task;

/// Scores at or above this are flagged as top priority.
pub const TOP_PRIORITY_THRESHOLD: f64 = 80.0;

pub struct RankedTasksPanel;

#[async_trait]
impl Panel for RankedTasksPanel {
    const NAME: &'static str = "tasks";
    type Snapshot = Vec<Task>;

    async fn load(&self, api: &dyn DashboardApi, user_id: &str) -> Result<Vec<Task>, ApiError> {
        api.tasks(user_id).await
    }

    fn is_empty(snapshot: &Vec<Task>) -> bool {
        snapshot.is_empty()
    }

    fn empty_message() -> &'static str {
        "No tasks detected yet. Sync your Google account to pull in calendar and email work."
    }
}

/// Icon for where a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceIcon {
    Email,
    Document,
    Chat,
    Calendar,
    General,
}

impl SourceIcon {
    pub fn label(&self) -> &'static str {
        match self {
            SourceIcon::Email => "Email",
            SourceIcon::Document => "Document",
            SourceIcon::Chat => "Chat",
            SourceIcon::Calendar => "Calendar",
            SourceIcon::General => "Task",
        }
    }
}

const SOURCE_KEYWORDS: &[(&[&str], SourceIcon)] = &[
    (&["email", "mail", "inbox", "gmail"], SourceIcon::Email),
    (&["doc", "sheet", "slide", "drive", "file"], SourceIcon::Document),
    (&["slack", "chat", "message", "teams"], SourceIcon::Chat),
    (&["meeting", "calendar", "event", "call"], SourceIcon::Calendar),
];

/// Match a free-form label (`Inbox follow-ups`, `doc_02`) to a source icon.
pub fn icon_for(label: &str) -> Option<SourceIcon> {
    let label = label.to_lowercase();
    SOURCE_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
        .map(|(_, icon)| *icon)
}

/// Pick an icon from the task's context name, falling back to its id prefix
/// (`email_01`, `meeting_03`, ...).
pub fn source_icon(task: &Task) -> SourceIcon {
    icon_for(&task.context)
        .or_else(|| icon_for(&task.id))
        .unwrap_or(SourceIcon::General)
}

pub fn is_top_priority(task: &Task) -> bool {
    task.priority_score >= TOP_PRIORITY_THRESHOLD
}

/// Highest score first; ties go to the earlier deadline, then title.
pub fn ranked(tasks: &[Task]) -> Vec<&Task> {
    let mut out: Vec<&Task> = tasks.iter().collect();
    out.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| compare_deadline(a.deadline.as_deref(), b.deadline.as_deref()))
            .then_with(|| a.title.cmp(&b.title))
    });
    out
}

fn compare_deadline(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow<'a> {
    /// 1-based.
    pub rank: usize,
    pub task: &'a Task,
    pub top_priority: bool,
    pub icon: SourceIcon,
}

pub fn rows(tasks: &[Task]) -> Vec<TaskRow<'_>> {
    ranked(tasks)
        .into_iter()
        .enumerate()
        .map(|(i, task)| TaskRow {
            rank: i + 1,
            task,
            top_priority: is_top_priority(task),
            icon: source_icon(task),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::task;

    #[test]
    fn ranks_by_score_and_flags_top_priority() {
        let tasks = vec![
            task("t2", "B", "College", 40.0),
            task("t1", "A", "Hackathon Review", 90.0),
        ];
        let rows = rows(&tasks);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].task.title, "A");
        assert_eq!(rows[0].rank, 1);
        assert!(rows[0].top_priority);
        assert_eq!(rows[1].task.title, "B");
        assert!(!rows[1].top_priority);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(is_top_priority(&task("t", "edge", "", 80.0)));
        assert!(!is_top_priority(&task("t", "below", "", 79.9)));
    }

    #[test]
    fn ties_prefer_earlier_deadline() {
        let mut later = task("t1", "Later", "", 70.0);
        later.deadline = Some("2026-03-10".to_string());
        let mut sooner = task("t2", "Sooner", "", 70.0);
        sooner.deadline = Some("2026-03-02".to_string());
        let undated = task("t3", "Undated", "", 70.0);

        let tasks = vec![undated, later, sooner];
        let titles: Vec<&str> = ranked(&tasks).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later", "Undated"]);
    }

    #[test]
    fn source_icons() {
        assert_eq!(
            source_icon(&task("t", "x", "Inbox follow-ups", 1.0)),
            SourceIcon::Email
        );
        assert_eq!(
            source_icon(&task("doc_02", "x", "Hackathon Review", 1.0)),
            SourceIcon::Document
        );
        assert_eq!(
            source_icon(&task("t", "x", "Team meeting prep", 1.0)),
            SourceIcon::Calendar
        );
        assert_eq!(
            source_icon(&task("task_01", "x", "College", 1.0)),
            SourceIcon::General
        );
        assert_eq!(SourceIcon::General.label(), "Task");
    }

    #[test]
    fn ranking_does_not_mutate_snapshot() {
        let tasks = vec![task("a", "Low", "", 10.0), task("b", "High", "", 95.0)];
        let _ = ranked(&tasks);
        assert_eq!(tasks[0].title, "Low");
    }
}
