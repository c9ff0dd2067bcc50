//! Panel fetch driver.
//!
//! One background task per mounted panel owns that panel's state. It
//! refetches on mount, on identity change, on refresh generation change and
//! on a fixed interval. Every request is tagged with a sequence number and
//! the identity it was issued for; a completion is accepted only if it is the
//! latest request and the identity is still current.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{Panel, PanelContext, PanelState, PanelView};
use crate::api::ApiError;
use crate::identity::IdentityTransition;

/// A mounted panel. Dropping it unmounts.
pub struct PanelHandle<P: Panel> {
    state: watch::Receiver<PanelState<P::Snapshot>>,
    driver: JoinHandle<()>,
}

impl<P: Panel> PanelHandle<P> {
    pub fn state(&self) -> PanelState<P::Snapshot> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelState<P::Snapshot>> {
        self.state.clone()
    }

    /// Render the current state without cloning the snapshot.
    pub fn with_view<R>(&self, f: impl FnOnce(PanelView<'_, P::Snapshot>) -> R) -> R {
        let state = self.state.borrow();
        f(state.view::<P>())
    }

    pub fn is_mounted(&self) -> bool {
        !self.driver.is_finished()
    }

    /// Stop polling, drop the refresh subscription and abandon any
    /// in-flight request.
    pub fn unmount(self) {}
}

impl<P: Panel> Drop for PanelHandle<P> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct Completion<T> {
    seq: u64,
    user_id: String,
    result: Result<T, ApiError>,
}

/// Aborts the request task when superseded or when the driver goes away.
struct InFlight(JoinHandle<()>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Driver<P: Panel> {
    panel: Arc<P>,
    ctx: PanelContext,
    state: watch::Sender<PanelState<P::Snapshot>>,
    done_tx: mpsc::UnboundedSender<Completion<P::Snapshot>>,
    user_id: Option<String>,
    /// Sequence number of the most recently issued request.
    issued: u64,
    in_flight: Option<InFlight>,
}

/// Mount `panel`: start fetching for the current identity and keep the
/// returned handle's state up to date until it is dropped.
pub fn mount<P: Panel>(panel: P, ctx: &PanelContext) -> PanelHandle<P> {
    let (state_tx, state_rx) = watch::channel(PanelState::default());
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let driver = Driver {
        panel: Arc::new(panel),
        ctx: ctx.clone(),
        state: state_tx,
        done_tx,
        user_id: None,
        issued: 0,
        in_flight: None,
    };

    log::debug!("{}: mounted", P::NAME);
    PanelHandle {
        state: state_rx,
        driver: tokio::spawn(driver.run(done_rx)),
    }
}

impl<P: Panel> Driver<P> {
    async fn run(mut self, mut done_rx: mpsc::UnboundedReceiver<Completion<P::Snapshot>>) {
        let mut identity_rx = self.ctx.identity.subscribe();
        let mut refresh_rx = self.ctx.refresh.watch();
        let mut seen_generation = refresh_rx.borrow_and_update().generation;

        let initial = identity_rx.borrow_and_update().ready_id().map(str::to_owned);
        self.switch_identity(initial);

        let period = self.ctx.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = identity_rx.borrow_and_update().ready_id().map(str::to_owned);
                    if next != self.user_id {
                        self.switch_identity(next);
                        ticker.reset();
                    }
                }
                changed = refresh_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let generation = refresh_rx.borrow_and_update().generation;
                    if generation != seen_generation {
                        log::debug!("{}: refresh generation {}", P::NAME, generation);
                        seen_generation = generation;
                        self.refetch();
                    }
                }
                _ = ticker.tick() => {
                    self.refetch();
                }
                Some(done) = done_rx.recv() => {
                    self.accept(done);
                }
            }
        }

        log::debug!("{}: driver stopped", P::NAME);
    }

    /// Drop everything tied to the previous identity, then fetch for the new one.
    fn switch_identity(&mut self, next: Option<String>) {
        match IdentityTransition::between(self.user_id.as_deref(), next.as_deref()) {
            IdentityTransition::Unchanged => {}
            transition => log::debug!("{}: {:?}", P::NAME, transition),
        }

        self.in_flight = None;
        // Completions already queued for the old identity no longer match.
        self.issued += 1;
        self.user_id = next.clone();
        self.state.send_modify(|s| {
            *s = PanelState {
                user_id: next,
                ..PanelState::default()
            };
        });

        self.refetch();
    }

    /// Issue a request for the current identity. The snapshot on screen stays
    /// until the response lands.
    fn refetch(&mut self) {
        let Some(user_id) = self.user_id.clone() else {
            return;
        };

        self.issued += 1;
        let seq = self.issued;
        self.state.send_modify(|s| s.loading = true);

        let panel = self.panel.clone();
        let api = self.ctx.api.clone();
        let done_tx = self.done_tx.clone();
        let task = tokio::spawn(async move {
            let result = panel.load(api.as_ref(), &user_id).await;
            let _ = done_tx.send(Completion {
                seq,
                user_id,
                result,
            });
        });

        // Replacing the previous request aborts it.
        self.in_flight = Some(InFlight(task));
    }

    fn accept(&mut self, done: Completion<P::Snapshot>) {
        if done.seq != self.issued || self.user_id.as_deref() != Some(done.user_id.as_str()) {
            log::debug!(
                "{}: discarding stale response #{} (latest #{})",
                P::NAME,
                done.seq,
                self.issued
            );
            return;
        }

        self.in_flight = None;
        match done.result {
            Ok(snapshot) => self.state.send_modify(|s| {
                s.snapshot = Some(snapshot);
                s.error = None;
                s.loading = false;
                s.updated_at = Some(Utc::now());
            }),
            Err(e) => {
                log::warn!("{}: fetch failed for {}: {}", P::NAME, done.user_id, e);
                let message = e.user_message();
                self.state.send_modify(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
            }
        }
    }
}
