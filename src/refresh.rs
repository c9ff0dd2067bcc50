//! Refresh broadcaster: one per dashboard session.
//!
//! Holds the refresh generation (starts at 0, +1 per publish) and the time of
//! the last publish. Panels learn that a refetch is warranted by subscribing,
//! never by comparing timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshState {
    pub generation: u64,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

type Callback = Arc<dyn Fn(u64) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
    /// Highest generation delivered to this subscriber.
    delivered: Arc<AtomicU64>,
}

pub struct RefreshBroadcaster {
    state: watch::Sender<RefreshState>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl RefreshBroadcaster {
    pub fn new() -> Arc<Self> {
        let (state, _) = watch::channel(RefreshState::default());
        Arc::new(Self {
            state,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Bump the generation and notify every current subscriber.
    pub fn publish(&self) {
        let (generation, targets) = {
            let subscribers = self.subscribers.lock();
            let mut generation = 0;
            self.state.send_modify(|s| {
                s.generation += 1;
                s.last_refresh_at = Some(Utc::now());
                generation = s.generation;
            });
            let targets: Vec<(Callback, Arc<AtomicU64>)> = subscribers
                .iter()
                .map(|s| (s.callback.clone(), s.delivered.clone()))
                .collect();
            (generation, targets)
        };

        log::debug!(
            "Refresh: generation {} published to {} subscriber(s)",
            generation,
            targets.len()
        );

        // Delivered outside the lock so callbacks may publish or unsubscribe.
        for (callback, delivered) in targets {
            if delivered.fetch_max(generation, Ordering::AcqRel) < generation {
                callback(generation);
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().last_refresh_at
    }

    pub fn snapshot(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Receiver for async consumers. Always yields the current generation,
    /// even if intermediate publishes were coalesced.
    pub fn watch(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    /// Invoke `callback` once per generation bump until the returned
    /// subscription is dropped or unsubscribed.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(u64) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock();
        subscribers.push(Subscriber {
            id,
            callback: Arc::new(callback),
            delivered: Arc::new(AtomicU64::new(self.state.borrow().generation)),
        });
        Subscription {
            broadcaster: Arc::downgrade(self),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
    }
}

/// Disposer returned by [`RefreshBroadcaster::subscribe`].
pub struct Subscription {
    broadcaster: Weak<RefreshBroadcaster>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.remove(self.id);
        }
    }
}
