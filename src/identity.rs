//! Identity source: the signed-in user's stable id, as resolved by the
//! external auth provider.
//!
//! Backed by a `watch` channel so every panel and poller observes the current
//! value without polling. Nothing in this crate writes to it except the
//! provider integration via [`IdentitySource::resolve`].

use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub id: Option<String>,
    /// Session bootstrap in progress. No fetch may be issued while set.
    pub loading: bool,
}

impl IdentityState {
    /// The id requests may be issued for, if any.
    pub fn ready_id(&self) -> Option<&str> {
        if self.loading {
            None
        } else {
            self.id.as_deref()
        }
    }
}

/// How the ready identity moved between two observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    Unchanged,
    SignedIn(String),
    Switched { from: String, to: String },
    SignedOut { previous: String },
}

impl IdentityTransition {
    pub fn between(prev: Option<&str>, next: Option<&str>) -> Self {
        match (prev, next) {
            (a, b) if a == b => IdentityTransition::Unchanged,
            (None, Some(to)) => IdentityTransition::SignedIn(to.to_string()),
            (Some(from), Some(to)) => IdentityTransition::Switched {
                from: from.to_string(),
                to: to.to_string(),
            },
            (Some(previous), None) => IdentityTransition::SignedOut {
                previous: previous.to_string(),
            },
            (None, None) => IdentityTransition::Unchanged,
        }
    }
}

pub struct IdentitySource {
    tx: watch::Sender<IdentityState>,
}

impl IdentitySource {
    /// Start in bootstrap: no id, loading.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(IdentityState {
            id: None,
            loading: true,
        });
        Self { tx }
    }

    /// Already-resolved identity (CLI, tests).
    pub fn signed_in(id: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(IdentityState {
            id: Some(id.into()),
            loading: false,
        });
        Self { tx }
    }

    pub fn current(&self) -> IdentityState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.tx.subscribe()
    }

    /// Auth provider finished resolving the session. `None` means signed out.
    pub fn resolve(&self, id: Option<String>) {
        let next = IdentityState { id, loading: false };
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            let transition = IdentityTransition::between(state.ready_id(), next.ready_id());
            log::info!("Identity: {:?}", transition);
            *state = next;
            true
        });
        if !changed {
            log::debug!("Identity: resolve with unchanged state ignored");
        }
    }

    /// Auth provider is re-establishing the session.
    pub fn begin_loading(&self) {
        self.tx.send_if_modified(|state| {
            if state.loading {
                return false;
            }
            state.loading = true;
            true
        });
    }
}

impl Default for IdentitySource {
    fn default() -> Self {
        Self::new()
    }
}
