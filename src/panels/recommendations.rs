//! Recommended actions panel.

use async_trait::async_trait;

use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::Recommendation;

pub struct RecommendationsPanel;

#[async_trait]
impl Panel for RecommendationsPanel {
    const NAME: &'static str = "recommendations";
    type Snapshot = Vec<Recommendation>;

    async fn load(
        &self,
        api: &dyn DashboardApi,
        user_id: &str,
    ) -> Result<Vec<Recommendation>, ApiError> {
        api.recommendations(user_id).await
    }

    fn is_empty(snapshot: &Vec<Recommendation>) -> bool {
        actionable(snapshot).next().is_none()
    }

    fn empty_message() -> &'static str {
        "No recommendations right now."
    }
}

/// Recommendations with something to do. Entries with a blank action are
/// skipped.
pub fn actionable(recs: &[Recommendation]) -> impl Iterator<Item = &Recommendation> {
    recs.iter().filter(|r| !r.action.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(action: &str) -> Recommendation {
        Recommendation {
            action: action.to_string(),
            reason: "because".to_string(),
            expected_impact: String::new(),
        }
    }

    #[test]
    fn blank_actions_are_skipped() {
        let recs = vec![rec("Block 9-11 AM"), rec("  "), rec("Batch review tasks")];
        let actions: Vec<&str> = actionable(&recs).map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["Block 9-11 AM", "Batch review tasks"]);
    }

    #[test]
    fn only_blank_actions_counts_as_empty() {
        assert!(RecommendationsPanel::is_empty(&vec![rec("")]));
        assert!(RecommendationsPanel::is_empty(&Vec::new()));
        assert!(!RecommendationsPanel::is_empty(&vec![rec("Defer College tasks")]));
    }
}
