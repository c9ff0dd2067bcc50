//! Cognitive load gauge.

use async_trait::async_trait;

use super::Panel;
use crate::api::{ApiError, DashboardApi};
use crate::types::CognitiveLoad;

pub struct CognitiveLoadPanel;

#[async_trait]
impl Panel for CognitiveLoadPanel {
    const NAME: &'static str = "cognitive_load";
    type Snapshot = Option<CognitiveLoad>;

    async fn load(
        &self,
        api: &dyn DashboardApi,
        user_id: &str,
    ) -> Result<Option<CognitiveLoad>, ApiError> {
        api.cognitive_load(user_id).await
    }

    fn is_empty(snapshot: &Option<CognitiveLoad>) -> bool {
        snapshot.is_none()
    }

    fn empty_message() -> &'static str {
        "Not enough activity to estimate cognitive load yet."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBand {
    Low,
    Moderate,
    High,
}

impl LoadBand {
    pub const MODERATE_FROM: f64 = 40.0;
    pub const HIGH_FROM: f64 = 70.0;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_FROM {
            LoadBand::High
        } else if score >= Self::MODERATE_FROM {
            LoadBand::Moderate
        } else {
            LoadBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadBand::Low => "Low",
            LoadBand::Moderate => "Moderate",
            LoadBand::High => "High",
        }
    }
}

/// Score clamped to the 0-100 gauge.
pub fn gauge_value(load: &CognitiveLoad) -> f64 {
    if load.score.is_nan() {
        return 0.0;
    }
    load.score.clamp(0.0, 100.0)
}

/// Backend status text when it sent one, otherwise the computed band.
pub fn status_label(load: &CognitiveLoad) -> String {
    if load.status.trim().is_empty() {
        LoadBand::from_score(gauge_value(load)).label().to_string()
    } else {
        load.status.clone()
    }
}
