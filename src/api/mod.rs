//! Dashboard backend API.
//!
//! Modules:
//! - client: reqwest implementation of [`DashboardApi`]
//!
//! Every request is scoped to one identity via the `X-User-Id` header. Panels
//! and the Google link orchestrator only see the trait, so tests substitute
//! an in-memory backend.

pub mod client;

use async_trait::async_trait;

pub use crate::error::ApiError;
use crate::types::{
    CognitiveLoad, Context, DashboardData, Insight, LinkStatus, Recommendation, SyncReport, Task,
};

/// Header carrying the identity every scoped request is issued for.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Query parameter that makes each GET URL unique so no cache answers it.
pub const CACHE_BUST_PARAM: &str = "_";

#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// GET /api/contexts
    async fn contexts(&self, user_id: &str) -> Result<Vec<Context>, ApiError>;

    /// GET /api/tasks
    async fn tasks(&self, user_id: &str) -> Result<Vec<Task>, ApiError>;

    /// GET /api/cognitive-load. `None` when the backend has no score yet.
    async fn cognitive_load(&self, user_id: &str) -> Result<Option<CognitiveLoad>, ApiError>;

    /// GET /api/insights
    async fn insights(&self, user_id: &str) -> Result<Vec<Insight>, ApiError>;

    /// GET /api/recommendations
    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>, ApiError>;

    /// GET /api/dashboard
    async fn dashboard(&self, user_id: &str) -> Result<DashboardData, ApiError>;

    /// GET /api/google/status
    async fn link_status(&self, user_id: &str) -> Result<LinkStatus, ApiError>;

    /// GET /api/google/auth
    async fn link_initiate(&self, user_id: &str) -> Result<(), ApiError>;

    /// POST /api/google/sync. Resolves once the backend's pass has completed.
    async fn link_sync(&self, user_id: &str) -> Result<SyncReport, ApiError>;
}
