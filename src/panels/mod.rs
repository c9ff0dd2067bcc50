//! Dashboard panels.
//!
//! Every panel follows the same fetch contract, implemented once in
//! [`consumer`]; a panel module only says what to load and how to derive its
//! display from the loaded snapshot.
//!
//! Modules:
//! - consumer: mount/unmount, identity scoping, refresh + interval refetch,
//!   stale-response discard
//! - contexts, tasks, priority, insights, cognitive_load, recommendations

pub mod cognitive_load;
pub mod consumer;
pub mod contexts;
pub mod insights;
pub mod priority;
pub mod recommendations;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{ApiError, DashboardApi};
use crate::identity::IdentitySource;
use crate::refresh::RefreshBroadcaster;

pub use consumer::{mount, PanelHandle};

/// A data-consuming panel.
#[async_trait]
pub trait Panel: Send + Sync + 'static {
    /// Short name for logs.
    const NAME: &'static str;

    type Snapshot: Clone + Send + Sync + 'static;

    /// Fetch this panel's data for one identity.
    async fn load(&self, api: &dyn DashboardApi, user_id: &str)
        -> Result<Self::Snapshot, ApiError>;

    /// A successful fetch with nothing to show.
    fn is_empty(snapshot: &Self::Snapshot) -> bool;

    fn empty_message() -> &'static str;
}

/// Shared collaborators handed to every panel at mount time.
#[derive(Clone)]
pub struct PanelContext {
    pub api: Arc<dyn DashboardApi>,
    pub identity: Arc<IdentitySource>,
    pub refresh: Arc<RefreshBroadcaster>,
    pub poll_interval: Duration,
}

/// Everything a panel renders from.
#[derive(Debug, Clone)]
pub struct PanelState<T> {
    /// Identity the snapshot belongs to. `None` while signed out.
    pub user_id: Option<String>,
    pub snapshot: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        Self {
            user_id: None,
            snapshot: None,
            loading: false,
            error: None,
            updated_at: None,
        }
    }
}

/// What a panel should draw right now.
#[derive(Debug, PartialEq)]
pub enum PanelView<'a, T> {
    SignedOut,
    /// Nothing fetched yet for this identity.
    Loading,
    /// No data and the last fetch failed.
    Failed(&'a str),
    /// Last successful fetch had no items. `error` is a later failed refetch.
    Empty {
        message: &'static str,
        error: Option<&'a str>,
    },
    /// Data to draw, possibly stale with an inline error banner.
    Ready {
        snapshot: &'a T,
        error: Option<&'a str>,
        refreshing: bool,
    },
}

impl<T> PanelState<T> {
    pub fn view<P: Panel<Snapshot = T>>(&self) -> PanelView<'_, T> {
        if self.user_id.is_none() {
            return PanelView::SignedOut;
        }
        let error = self.error.as_deref();
        match &self.snapshot {
            Some(snapshot) if P::is_empty(snapshot) => PanelView::Empty {
                message: P::empty_message(),
                error,
            },
            Some(snapshot) => PanelView::Ready {
                snapshot,
                error,
                refreshing: self.loading,
            },
            None => match error {
                Some(message) if !self.loading => PanelView::Failed(message),
                _ => PanelView::Loading,
            },
        }
    }
}
