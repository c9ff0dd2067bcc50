//! Google account linking.
//!
//! Modules:
//! - orchestrator: status / connect / sync workflow, per-identity
//!   single-flight sync, refresh publication after a completed sync
//! - poller: periodic status refresh tied to the current identity

pub mod orchestrator;
pub mod poller;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::error::LinkError;
use crate::types::{LinkStatus, SyncReport};

pub use orchestrator::{LinkOrchestrator, LinkSettings};
pub use poller::{start_status_poller, PollerHandle};

/// Where the link workflow is for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPhase {
    #[default]
    Unlinked,
    Connecting,
    Linked {
        syncing: bool,
    },
}

/// Link status as far as this client knows.
///
/// `Provisional` is the optimistic value set after a successful connect. The
/// next successful status fetch replaces it unconditionally.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StatusValue {
    #[default]
    Unknown,
    Provisional(LinkStatus),
    Confirmed(LinkStatus),
}

impl StatusValue {
    pub fn get(&self) -> Option<&LinkStatus> {
        match self {
            StatusValue::Unknown => None,
            StatusValue::Provisional(s) | StatusValue::Confirmed(s) => Some(s),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.get().is_some_and(|s| s.connected)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, StatusValue::Confirmed(_))
    }
}

/// What the link control renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkView {
    /// Identity this view belongs to. `None` while signed out.
    pub user_id: Option<String>,
    pub phase: LinkPhase,
    pub status: StatusValue,
    /// Last connect/sync failure, shown next to the control.
    pub error: Option<LinkError>,
    pub last_report: Option<SyncReport>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl LinkView {
    pub fn for_user(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_owned),
            ..Self::default()
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.phase == LinkPhase::Linked { syncing: true }
    }

    /// Warnings from the last partial sync.
    pub fn warnings(&self) -> &[String] {
        match &self.last_report {
            Some(report) if report.is_partial() => &report.errors,
            _ => &[],
        }
    }

    /// "Last synced 5 minutes ago", relative to `now`.
    pub fn last_synced_label(&self, now: DateTime<Utc>) -> String {
        let Some(last) = self.status.get().and_then(|s| s.last_sync) else {
            return "Never synced".to_string();
        };
        let minutes = (now - last).num_minutes().max(0);
        match minutes {
            0 => "Last synced just now".to_string(),
            1 => "Last synced 1 minute ago".to_string(),
            m if m < 60 => format!("Last synced {} minutes ago", m),
            m if m < 120 => "Last synced 1 hour ago".to_string(),
            m if m < 60 * 24 => format!("Last synced {} hours ago", m / 60),
            _ => format!("Last synced {}", last.format("%Y-%m-%d")),
        }
    }
}

/// Background task that is aborted when its owner drops it.
pub(crate) struct AbortOnDrop(pub(crate) JoinHandle<()>);

impl AbortOnDrop {
    pub(crate) fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
