//! Google link workflow.
//!
//! `Unlinked -> Connecting -> Linked(idle) <-> Linked(syncing)`. A failed
//! connect falls back to `Unlinked`, a failed sync back to `Linked(idle)`,
//! both keeping the error for display.
//!
//! At most one sync runs per identity. A sync requested while one is running
//! joins it and gets the same outcome; the backend never sees two.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{AbortOnDrop, LinkPhase, LinkView, StatusValue};
use crate::api::DashboardApi;
use crate::config::Config;
use crate::error::LinkError;
use crate::identity::IdentitySource;
use crate::refresh::RefreshBroadcaster;
use crate::types::{LinkStatus, SyncReport};

type SyncOutcome = Result<SyncReport, LinkError>;

/// Timing knobs for the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Wait between a successful connect and the automatic first sync.
    pub connect_sync_delay: Duration,
    /// Extra refresh publications after a sync, each measured from completion.
    pub trailing_refresh_delays: Vec<Duration>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for LinkSettings {
    fn from(config: &Config) -> Self {
        Self {
            connect_sync_delay: config.connect_sync_delay(),
            trailing_refresh_delays: config.trailing_refresh_delays(),
        }
    }
}

pub struct LinkOrchestrator {
    api: Arc<dyn DashboardApi>,
    identity: Arc<IdentitySource>,
    refresh: Arc<RefreshBroadcaster>,
    settings: LinkSettings,
    view: watch::Sender<LinkView>,
    /// Running syncs by identity. Joiners wait for `Some(outcome)`.
    in_flight: DashMap<String, watch::Receiver<Option<SyncOutcome>>>,
    /// Delayed auto-syncs and trailing refreshes.
    background: Mutex<Vec<AbortOnDrop>>,
}

/// Held by the leading sync. On drop the in-flight entry is removed first,
/// then joiners get the outcome. A leader dropped before finishing leaves
/// no outcome, joiners see the channel close and the view stops syncing.
struct SyncSlot<'a> {
    map: &'a DashMap<String, watch::Receiver<Option<SyncOutcome>>>,
    view: &'a watch::Sender<LinkView>,
    user_id: &'a str,
    tx: watch::Sender<Option<SyncOutcome>>,
    outcome: Option<SyncOutcome>,
}

impl Drop for SyncSlot<'_> {
    fn drop(&mut self) {
        self.map.remove(self.user_id);
        match self.outcome.take() {
            Some(outcome) => {
                self.tx.send_replace(Some(outcome));
            }
            None => {
                log::info!("Google link: sync for {} was abandoned", self.user_id);
                self.view.send_if_modified(|view| {
                    if view.user_id.as_deref() != Some(self.user_id) || !view.is_syncing() {
                        return false;
                    }
                    view.phase = idle_phase(view.status.is_connected());
                    true
                });
            }
        }
    }
}

impl LinkOrchestrator {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        identity: Arc<IdentitySource>,
        refresh: Arc<RefreshBroadcaster>,
        settings: LinkSettings,
    ) -> Arc<Self> {
        let initial = LinkView::for_user(identity.current().ready_id());
        let (view, _) = watch::channel(initial);
        Arc::new(Self {
            api,
            identity,
            refresh,
            settings,
            view,
            in_flight: DashMap::new(),
            background: Mutex::new(Vec::new()),
        })
    }

    pub fn identity(&self) -> &Arc<IdentitySource> {
        &self.identity
    }

    pub fn view(&self) -> LinkView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkView> {
        self.view.subscribe()
    }

    /// Start over for `user_id`. Updates still in flight for any other
    /// identity are dropped from here on.
    pub fn reset(&self, user_id: Option<&str>) {
        self.view.send_if_modified(|view| {
            if view.user_id.as_deref() == user_id {
                return false;
            }
            *view = LinkView::for_user(user_id);
            true
        });
    }

    /// Current ready identity, or `NotAuthenticated`.
    pub fn current_user(&self) -> Result<String, LinkError> {
        self.identity
            .current()
            .ready_id()
            .map(str::to_owned)
            .ok_or(LinkError::NotAuthenticated)
    }

    /// Fetch the authoritative link status. A failure leaves the view as it
    /// was and is only returned to the caller.
    pub async fn fetch_status(&self, user_id: &str) -> Result<LinkStatus, LinkError> {
        let status = self.api.link_status(user_id).await.map_err(|e| {
            log::warn!("Google link: status check failed for {}: {}", user_id, e);
            LinkError::status(&e)
        })?;

        self.apply(user_id, |view| {
            view.status = StatusValue::Confirmed(status.clone());
            view.last_checked = Some(Utc::now());
            // Connect and sync own the phase while they run.
            if matches!(view.phase, LinkPhase::Unlinked | LinkPhase::Linked { syncing: false }) {
                view.phase = idle_phase(status.connected);
            }
        });
        Ok(status)
    }

    /// Start linking. On success the status is optimistically marked
    /// connected and a sync follows after the configured delay, provided the
    /// identity has not changed by then.
    pub async fn connect(self: &Arc<Self>, user_id: &str) -> Result<(), LinkError> {
        log::info!("Google link: connecting {}", user_id);
        self.apply(user_id, |view| {
            view.phase = LinkPhase::Connecting;
            view.error = None;
        });

        if let Err(e) = self.api.link_initiate(user_id).await {
            let err = LinkError::connect(&e);
            log::warn!("Google link: connect failed for {}: {}", user_id, e);
            self.apply(user_id, |view| {
                view.phase = LinkPhase::Unlinked;
                view.error = Some(err.clone());
            });
            return Err(err);
        }

        self.apply(user_id, |view| {
            let mut status = view.status.get().cloned().unwrap_or_default();
            status.connected = true;
            view.status = StatusValue::Provisional(status);
            view.phase = LinkPhase::Linked { syncing: false };
        });
        self.schedule_auto_sync(user_id.to_string());
        Ok(())
    }

    /// Run a backend sync and wait for the pass to complete.
    ///
    /// On success the status is refetched and a refresh is published. A
    /// `partial` report is a success with warnings; an `error` report is a
    /// failure and publishes nothing.
    pub async fn sync(&self, user_id: &str) -> SyncOutcome {
        let claimed = match self.in_flight.entry(user_id.to_string()) {
            Entry::Occupied(entry) => Err(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx);
                Ok(tx)
            }
        };
        let tx = match claimed {
            Ok(tx) => tx,
            Err(rx) => {
                log::info!("Google link: sync already running for {}, joining", user_id);
                return join(rx).await;
            }
        };

        let mut slot = SyncSlot {
            map: &self.in_flight,
            view: &self.view,
            user_id,
            tx,
            outcome: None,
        };
        let outcome = self.run_sync(user_id).await;
        slot.outcome = Some(outcome.clone());
        outcome
    }

    pub fn is_syncing(&self, user_id: &str) -> bool {
        self.in_flight.contains_key(user_id)
    }

    /// Abort delayed auto-syncs and trailing refreshes.
    pub fn cancel_pending(&self) {
        self.background.lock().clear();
    }

    async fn run_sync(&self, user_id: &str) -> SyncOutcome {
        log::info!("Google link: sync started for {}", user_id);
        self.apply(user_id, |view| {
            view.phase = LinkPhase::Linked { syncing: true };
            view.error = None;
        });

        let outcome = match self.api.link_sync(user_id).await {
            Ok(report) if report.is_failure() => Err(LinkError::Sync(failure_message(&report))),
            Ok(report) => Ok(report),
            Err(e) => {
                log::warn!("Google link: sync request failed for {}: {}", user_id, e);
                Err(LinkError::sync(&e))
            }
        };

        match &outcome {
            Ok(report) => {
                if report.is_partial() {
                    log::warn!(
                        "Google link: partial sync for {}: {}",
                        user_id,
                        report.errors.join("; ")
                    );
                } else {
                    log::info!(
                        "Google link: sync complete for {} ({} events, {} emails)",
                        user_id,
                        report.synced.calendar,
                        report.synced.emails
                    );
                }
                self.apply(user_id, |view| {
                    view.phase = LinkPhase::Linked { syncing: false };
                    view.last_report = Some(report.clone());
                });
                if self.identity.current().ready_id() != Some(user_id) {
                    log::info!("Google link: identity changed during sync, not refreshing");
                    return outcome;
                }
                if let Err(e) = self.fetch_status(user_id).await {
                    log::warn!("Google link: status refresh after sync failed: {}", e);
                }
                self.publish_refresh();
            }
            Err(err) => {
                log::warn!("Google link: sync failed for {}: {}", user_id, err);
                self.apply(user_id, |view| {
                    view.phase = idle_phase(view.status.is_connected());
                    view.error = Some(err.clone());
                });
            }
        }
        outcome
    }

    /// One refresh now, then one per trailing delay.
    fn publish_refresh(&self) {
        self.refresh.publish();
        let completed = Instant::now();
        for &delay in &self.settings.trailing_refresh_delays {
            let refresh = Arc::downgrade(&self.refresh);
            self.track(tokio::spawn(async move {
                tokio::time::sleep_until(completed + delay).await;
                if let Some(refresh) = refresh.upgrade() {
                    refresh.publish();
                }
            }));
        }
    }

    fn schedule_auto_sync(self: &Arc<Self>, user_id: String) {
        let this: Weak<Self> = Arc::downgrade(self);
        let deadline = Instant::now() + self.settings.connect_sync_delay;
        self.track(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(this) = this.upgrade() else {
                return;
            };
            if this.identity.current().ready_id() != Some(user_id.as_str()) {
                log::info!("Google link: identity changed, skipping automatic sync");
                return;
            }
            if let Err(e) = this.sync(&user_id).await {
                log::warn!("Google link: automatic sync failed: {}", e);
            }
        }));
    }

    fn track(&self, handle: tokio::task::JoinHandle<()>) {
        let mut background = self.background.lock();
        background.retain(|task| !task.is_finished());
        background.push(AbortOnDrop(handle));
    }

    /// Mutate the view only if it still belongs to `user_id`.
    fn apply(&self, user_id: &str, f: impl FnOnce(&mut LinkView)) {
        self.view.send_if_modified(|view| {
            if view.user_id.as_deref() != Some(user_id) {
                return false;
            }
            f(view);
            true
        });
    }
}

async fn join(mut rx: watch::Receiver<Option<SyncOutcome>>) -> SyncOutcome {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            let last = rx.borrow().clone();
            return last.unwrap_or_else(|| Err(LinkError::Sync("Sync was interrupted".to_string())));
        }
    }
}

fn idle_phase(connected: bool) -> LinkPhase {
    if connected {
        LinkPhase::Linked { syncing: false }
    } else {
        LinkPhase::Unlinked
    }
}

fn failure_message(report: &SyncReport) -> String {
    if report.errors.is_empty() {
        "Sync failed".to_string()
    } else {
        report.errors.join("; ")
    }
}
