//! Background Google link status poller.
//!
//! Checks the link status on start and then on a fixed interval, so a sync
//! done elsewhere (another tab, another device) is eventually picked up.
//! Follows the current identity: a switch resets the view and polls the new
//! identity right away; sign-out clears the view and idles.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{AbortOnDrop, LinkOrchestrator};
use crate::identity::IdentityTransition;

/// Running status poller. Dropping it stops polling.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn start_status_poller(link: Arc<LinkOrchestrator>, interval: Duration) -> PollerHandle {
    PollerHandle {
        task: tokio::spawn(run_status_poller(link, interval)),
    }
}

async fn run_status_poller(link: Arc<LinkOrchestrator>, interval: Duration) {
    let mut identity_rx = link.identity().subscribe();
    let mut current = identity_rx.borrow_and_update().ready_id().map(str::to_owned);
    link.reset(current.as_deref());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<AbortOnDrop> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(user_id) = current.clone() else {
                    continue;
                };
                if pending.as_ref().is_some_and(|p| !p.is_finished()) {
                    log::debug!("Google link poller: previous status check still running");
                    continue;
                }
                let link = link.clone();
                pending = Some(AbortOnDrop(tokio::spawn(async move {
                    if let Err(e) = link.fetch_status(&user_id).await {
                        log::warn!("Google link poller: status check failed: {}", e);
                    }
                })));
            }
            changed = identity_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = identity_rx.borrow_and_update().ready_id().map(str::to_owned);
                if next == current {
                    continue;
                }
                log::info!(
                    "Google link poller: {:?}",
                    IdentityTransition::between(current.as_deref(), next.as_deref())
                );
                pending = None;
                link.reset(next.as_deref());
                current = next;
                ticker.reset_immediately();
            }
        }
    }
}
