//! In-memory dashboard backend for tests.
//!
//! Each call can be held open with a gate so tests decide the order in which
//! responses complete. Data is read after the gate opens, so a held call
//! returns whatever the backend holds at completion time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::api::{ApiError, DashboardApi};
use crate::types::{
    CognitiveLoad, Context, DashboardData, Insight, LinkStatus, Recommendation, SyncReport,
    SyncedCounts, Task,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Contexts,
    Tasks,
    CognitiveLoad,
    Insights,
    Recommendations,
    Dashboard,
    LinkStatus,
    LinkInitiate,
    LinkSync,
}

#[derive(Default)]
pub struct FakeApi {
    data: Mutex<HashMap<String, DashboardData>>,
    link: Mutex<HashMap<String, LinkStatus>>,
    failures: Mutex<HashMap<Resource, ApiError>>,
    gates: Mutex<HashMap<Resource, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<(Resource, String)>>,
    sync_report: Mutex<Option<SyncReport>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_tasks(&self, user_id: &str, tasks: Vec<Task>) {
        self.data.lock().entry(user_id.to_string()).or_default().tasks = tasks;
    }

    pub fn set_contexts(&self, user_id: &str, contexts: Vec<Context>) {
        self.data.lock().entry(user_id.to_string()).or_default().contexts = contexts;
    }

    pub fn set_insights(&self, user_id: &str, insights: Vec<Insight>) {
        self.data.lock().entry(user_id.to_string()).or_default().insights = insights;
    }

    pub fn set_cognitive_load(&self, user_id: &str, load: Option<CognitiveLoad>) {
        self.data.lock().entry(user_id.to_string()).or_default().cognitive_load = load;
    }

    pub fn set_recommendations(&self, user_id: &str, recs: Vec<Recommendation>) {
        self.data.lock().entry(user_id.to_string()).or_default().recommendations = recs;
    }

    pub fn set_link_status(&self, user_id: &str, status: LinkStatus) {
        self.link.lock().insert(user_id.to_string(), status);
    }

    pub fn set_sync_report(&self, report: SyncReport) {
        *self.sync_report.lock() = Some(report);
    }

    /// Every call to `resource` fails with `err` until [`FakeApi::heal`].
    pub fn fail(&self, resource: Resource, err: ApiError) {
        self.failures.lock().insert(resource, err);
    }

    pub fn heal(&self, resource: Resource) {
        self.failures.lock().remove(&resource);
    }

    /// Hold the next not-yet-gated call to `resource` until the sender fires
    /// (or is dropped).
    pub fn gate(&self, resource: Resource) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().entry(resource).or_default().push_back(rx);
        tx
    }

    pub fn calls(&self, resource: Resource) -> usize {
        self.calls.lock().iter().filter(|(r, _)| *r == resource).count()
    }

    pub fn calls_for(&self, resource: Resource, user_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(r, u)| *r == resource && u == user_id)
            .count()
    }

    async fn enter(&self, resource: Resource, user_id: &str) -> Result<(), ApiError> {
        self.calls.lock().push((resource, user_id.to_string()));
        let gate = self
            .gates
            .lock()
            .get_mut(&resource)
            .and_then(|queue| queue.pop_front());
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.failures.lock().get(&resource) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn snapshot(&self, user_id: &str) -> DashboardData {
        self.data.lock().get(user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DashboardApi for FakeApi {
    async fn contexts(&self, user_id: &str) -> Result<Vec<Context>, ApiError> {
        self.enter(Resource::Contexts, user_id).await?;
        Ok(self.snapshot(user_id).contexts)
    }

    async fn tasks(&self, user_id: &str) -> Result<Vec<Task>, ApiError> {
        self.enter(Resource::Tasks, user_id).await?;
        Ok(self.snapshot(user_id).tasks)
    }

    async fn cognitive_load(&self, user_id: &str) -> Result<Option<CognitiveLoad>, ApiError> {
        self.enter(Resource::CognitiveLoad, user_id).await?;
        Ok(self.snapshot(user_id).cognitive_load)
    }

    async fn insights(&self, user_id: &str) -> Result<Vec<Insight>, ApiError> {
        self.enter(Resource::Insights, user_id).await?;
        Ok(self.snapshot(user_id).insights)
    }

    async fn recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>, ApiError> {
        self.enter(Resource::Recommendations, user_id).await?;
        Ok(self.snapshot(user_id).recommendations)
    }

    async fn dashboard(&self, user_id: &str) -> Result<DashboardData, ApiError> {
        self.enter(Resource::Dashboard, user_id).await?;
        Ok(self.snapshot(user_id))
    }

    async fn link_status(&self, user_id: &str) -> Result<LinkStatus, ApiError> {
        self.enter(Resource::LinkStatus, user_id).await?;
        Ok(self.link.lock().get(user_id).cloned().unwrap_or_default())
    }

    async fn link_initiate(&self, user_id: &str) -> Result<(), ApiError> {
        self.enter(Resource::LinkInitiate, user_id).await?;
        self.link
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .connected = true;
        Ok(())
    }

    async fn link_sync(&self, user_id: &str) -> Result<SyncReport, ApiError> {
        self.enter(Resource::LinkSync, user_id).await?;
        let now = Utc::now();
        {
            let mut link = self.link.lock();
            let status = link.entry(user_id.to_string()).or_default();
            status.connected = true;
            status.last_sync = Some(now);
            status.has_calendar_data = true;
            status.has_email_data = true;
        }
        Ok(self.sync_report.lock().clone().unwrap_or(SyncReport {
            status: "success".to_string(),
            synced: SyncedCounts {
                calendar: 1,
                emails: 1,
            },
            timestamp: Some(now),
            errors: Vec::new(),
        }))
    }
}

pub fn task(id: &str, title: &str, context: &str, score: f64) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        context: context.to_string(),
        deadline: None,
        priority_score: score,
        status: "not_started".to_string(),
        explanation: String::new(),
    }
}

/// Let spawned tasks run until they are all parked on timers or I/O.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time, then let woken tasks run.
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}
