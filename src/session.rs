//! One dashboard session: the shared broadcaster, the link orchestrator, the
//! status poller and every panel, torn down together.
//!
//! When identity resolves to nobody, all panels and the poller are
//! unmounted and the navigator is told to leave the dashboard, once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::api::DashboardApi;
use crate::config::Config;
use crate::error::LinkError;
use crate::google_link::{start_status_poller, LinkOrchestrator, LinkSettings, PollerHandle};
use crate::identity::{IdentitySource, IdentityState};
use crate::panels::cognitive_load::CognitiveLoadPanel;
use crate::panels::contexts::ContextsPanel;
use crate::panels::insights::InsightsPanel;
use crate::panels::priority::PriorityPanel;
use crate::panels::recommendations::RecommendationsPanel;
use crate::panels::tasks::RankedTasksPanel;
use crate::panels::{mount, Panel, PanelContext, PanelHandle};
use crate::refresh::RefreshBroadcaster;
use crate::types::SyncReport;

/// Routing collaborator.
pub trait Navigator: Send + Sync {
    /// Called once, when the session's identity goes away.
    fn leave_dashboard(&self);
}

/// Every mounted panel.
pub struct Panels {
    pub contexts: PanelHandle<ContextsPanel>,
    pub tasks: PanelHandle<RankedTasksPanel>,
    pub priority: PanelHandle<PriorityPanel>,
    pub insights: PanelHandle<InsightsPanel>,
    pub cognitive_load: PanelHandle<CognitiveLoadPanel>,
    pub recommendations: PanelHandle<RecommendationsPanel>,
}

impl Panels {
    fn mount_all(ctx: &PanelContext) -> Self {
        Self {
            contexts: mount(ContextsPanel, ctx),
            tasks: mount(RankedTasksPanel, ctx),
            priority: mount(PriorityPanel, ctx),
            insights: mount(InsightsPanel, ctx),
            cognitive_load: mount(CognitiveLoadPanel, ctx),
            recommendations: mount(RecommendationsPanel, ctx),
        }
    }

    /// Every panel has finished at least one fetch for the current identity.
    pub fn all_settled(&self) -> bool {
        settled(&self.contexts)
            && settled(&self.tasks)
            && settled(&self.priority)
            && settled(&self.insights)
            && settled(&self.cognitive_load)
            && settled(&self.recommendations)
    }
}

fn settled<P: Panel>(handle: &PanelHandle<P>) -> bool {
    let state = handle.state();
    state.user_id.is_some() && !state.loading && (state.snapshot.is_some() || state.error.is_some())
}

struct Mounted {
    panels: Panels,
    _poller: PollerHandle,
}

pub struct DashboardSession {
    identity: Arc<IdentitySource>,
    refresh: Arc<RefreshBroadcaster>,
    link: Arc<LinkOrchestrator>,
    mounted: Arc<Mutex<Option<Mounted>>>,
    watcher: JoinHandle<()>,
}

impl DashboardSession {
    /// Build and mount everything. Must be called inside a tokio runtime.
    pub fn start(
        config: &Config,
        api: Arc<dyn DashboardApi>,
        identity: Arc<IdentitySource>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let refresh = RefreshBroadcaster::new();
        let link = LinkOrchestrator::new(
            api.clone(),
            identity.clone(),
            refresh.clone(),
            LinkSettings::from(config),
        );

        let ctx = PanelContext {
            api,
            identity: identity.clone(),
            refresh: refresh.clone(),
            poll_interval: config.poll_interval(),
        };
        let mounted = Arc::new(Mutex::new(Some(Mounted {
            panels: Panels::mount_all(&ctx),
            _poller: start_status_poller(link.clone(), config.status_poll_interval()),
        })));

        let watcher = tokio::spawn(watch_sign_out(
            identity.clone(),
            link.clone(),
            mounted.clone(),
            navigator,
        ));

        log::info!("Dashboard session started");
        Self {
            identity,
            refresh,
            link,
            mounted,
            watcher,
        }
    }

    /// Panels and poller are still mounted.
    pub fn is_active(&self) -> bool {
        self.mounted.lock().is_some()
    }

    pub fn with_panels<R>(&self, f: impl FnOnce(&Panels) -> R) -> Option<R> {
        self.mounted.lock().as_ref().map(|m| f(&m.panels))
    }

    pub fn identity(&self) -> IdentityState {
        self.identity.current()
    }

    pub fn link(&self) -> &Arc<LinkOrchestrator> {
        &self.link
    }

    pub fn refresh(&self) -> &Arc<RefreshBroadcaster> {
        &self.refresh
    }

    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.refresh.last_refresh_at()
    }

    /// Manual refresh: every mounted panel refetches.
    pub fn refresh_now(&self) {
        if self.is_active() {
            log::info!("Manual refresh requested");
            self.refresh.publish();
        }
    }

    /// Connect Google for the current identity.
    pub async fn connect_google(&self) -> Result<(), LinkError> {
        let user_id = self.link.current_user()?;
        self.link.connect(&user_id).await
    }

    /// Sync Google for the current identity and wait for it to complete.
    pub async fn sync_google(&self) -> Result<SyncReport, LinkError> {
        let user_id = self.link.current_user()?;
        self.link.sync(&user_id).await
    }

    /// Unmount everything and stop background work.
    pub fn shutdown(self) {}

    fn teardown(&mut self) {
        self.watcher.abort();
        self.link.cancel_pending();
        if self.mounted.lock().take().is_some() {
            log::info!("Dashboard session stopped");
        }
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Resolved to nobody: unmount, then navigate away.
async fn watch_sign_out(
    identity: Arc<IdentitySource>,
    link: Arc<LinkOrchestrator>,
    mounted: Arc<Mutex<Option<Mounted>>>,
    navigator: Arc<dyn Navigator>,
) {
    let mut rx = identity.subscribe();
    loop {
        let signed_out = {
            let state = rx.borrow_and_update();
            !state.loading && state.id.is_none()
        };
        if signed_out {
            break;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }

    let unmounted = mounted.lock().take();
    link.cancel_pending();
    drop(unmounted);
    log::info!("Signed out, leaving dashboard");
    navigator.leave_dashboard();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::panels::PanelView;
    use crate::testing::{advance, settle, task, FakeApi, Resource};

    #[derive(Default)]
    struct CountingNavigator {
        leaves: AtomicUsize,
    }

    impl Navigator for CountingNavigator {
        fn leave_dashboard(&self) {
            self.leaves.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn start(
        identity: IdentitySource,
    ) -> (
        Arc<FakeApi>,
        Arc<IdentitySource>,
        Arc<CountingNavigator>,
        DashboardSession,
    ) {
        let api = FakeApi::new();
        api.set_tasks(
            "u1",
            vec![task("t1", "A", "", 90.0), task("t2", "B", "", 40.0)],
        );
        let identity = Arc::new(identity);
        let navigator = Arc::new(CountingNavigator::default());
        let session = DashboardSession::start(
            &Config::default(),
            api.clone(),
            identity.clone(),
            navigator.clone(),
        );
        (api, identity, navigator, session)
    }

    #[tokio::test(start_paused = true)]
    async fn mounts_every_panel_for_signed_in_user() {
        let (api, _identity, navigator, session) = start(IdentitySource::signed_in("u1"));
        settle().await;

        assert!(session.is_active());
        assert_eq!(session.with_panels(|p| p.all_settled()), Some(true));
        for resource in [
            Resource::Insights,
            Resource::CognitiveLoad,
            Resource::Recommendations,
            Resource::LinkStatus,
        ] {
            assert_eq!(api.calls_for(resource, "u1"), 1, "{:?}", resource);
        }
        // The priority breakdown loads tasks and contexts too.
        assert_eq!(api.calls_for(Resource::Tasks, "u1"), 2);
        assert_eq!(api.calls_for(Resource::Contexts, "u1"), 2);
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 0);

        let top = session
            .with_panels(|p| {
                p.tasks.with_view(|view| match view {
                    PanelView::Ready { snapshot, .. } => crate::panels::tasks::rows(snapshot)
                        .first()
                        .map(|row| (row.task.title.clone(), row.top_priority)),
                    _ => None,
                })
            })
            .flatten();
        assert_eq!(top, Some(("A".to_string(), true)));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_refetches_every_panel() {
        let (api, _identity, _navigator, session) = start(IdentitySource::signed_in("u1"));
        settle().await;

        session.refresh_now();
        settle().await;
        assert_eq!(session.refresh().generation(), 1);
        assert!(session.last_refresh_at().is_some());
        assert_eq!(api.calls(Resource::Contexts), 4);
        assert_eq!(api.calls(Resource::Tasks), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_refreshes_all_panels() {
        let (api, _identity, _navigator, session) = start(IdentitySource::signed_in("u1"));
        settle().await;

        let report = session.sync_google().await.unwrap();
        assert_eq!(report.status, "success");
        settle().await;
        assert_eq!(api.calls(Resource::Insights), 2);

        // Two trailing refreshes follow, at 500ms and 1500ms.
        advance(Duration::from_millis(500)).await;
        assert_eq!(session.refresh().generation(), 2);
        assert_eq!(api.calls(Resource::Insights), 3);
        advance(Duration::from_millis(1000)).await;
        assert_eq!(session.refresh().generation(), 3);
        assert_eq!(api.calls(Resource::Insights), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_during_sync_fetches_nothing_more() {
        let (api, identity, navigator, session) = start(IdentitySource::signed_in("u1"));
        let session = Arc::new(session);
        settle().await;
        let status_checks = api.calls(Resource::LinkStatus);
        let gate = api.gate(Resource::LinkSync);

        let sync = tokio::spawn({
            let session = session.clone();
            async move { session.sync_google().await }
        });
        settle().await;
        assert!(session.link().is_syncing("u1"));

        identity.resolve(None);
        settle().await;
        assert!(!session.is_active());
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 1);

        gate.send(()).unwrap();
        settle().await;
        assert!(sync.await.unwrap().is_ok());
        advance(Duration::from_secs(5)).await;

        assert_eq!(api.calls_for(Resource::LinkStatus, "u1"), status_checks);
        assert_eq!(session.refresh().generation(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_unmounts_and_leaves_once() {
        let (api, identity, navigator, session) = start(IdentitySource::signed_in("u1"));
        settle().await;

        identity.resolve(None);
        settle().await;
        assert!(!session.is_active());
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 1);

        let before = api.calls(Resource::Tasks);
        session.refresh_now();
        advance(Duration::from_secs(120)).await;
        assert_eq!(api.calls(Resource::Tasks), before);
        assert_eq!(api.calls(Resource::LinkStatus), 1);

        identity.resolve(Some("u1".to_string()));
        identity.resolve(None);
        settle().await;
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_identity_bootstrap() {
        let (api, identity, navigator, session) = start(IdentitySource::new());
        settle().await;
        assert_eq!(api.calls(Resource::Tasks), 0);
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 0);
        assert!(session.is_active());

        identity.resolve(Some("u1".to_string()));
        settle().await;
        assert_eq!(api.calls_for(Resource::Tasks, "u1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resolving_to_nobody_at_start_leaves() {
        let (api, identity, navigator, session) = start(IdentitySource::new());
        identity.resolve(None);
        settle().await;

        assert!(!session.is_active());
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 1);
        assert_eq!(api.calls(Resource::Tasks), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn link_actions_need_identity() {
        let (_api, _identity, _navigator, session) = start(IdentitySource::new());
        assert_eq!(
            session.sync_google().await.unwrap_err(),
            LinkError::NotAuthenticated
        );
        assert_eq!(
            session.connect_google().await.unwrap_err(),
            LinkError::NotAuthenticated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_everything() {
        let (api, _identity, navigator, session) = start(IdentitySource::signed_in("u1"));
        settle().await;
        let refresh = session.refresh().clone();

        session.shutdown();
        settle().await;
        refresh.publish();
        advance(Duration::from_secs(120)).await;

        assert_eq!(api.calls(Resource::Tasks), 2);
        assert_eq!(api.calls(Resource::LinkStatus), 1);
        assert_eq!(navigator.leaves.load(Ordering::SeqCst), 0);
    }
}
