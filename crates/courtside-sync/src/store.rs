//! Observable snapshot of the match collection.
//!
//! Observers are plain callbacks invoked synchronously after every change,
//! with the snapshot that change produced. They receive an immutable
//! `Arc<Snapshot>`, so nothing they do can mutate the collection. An observer
//! may read the store or drop its own [`Subscription`] from inside the
//! callback, but must not call [`SnapshotStore::apply`] or
//! [`SnapshotStore::replace`] there.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::merge::merge_in_place;
use crate::metrics;
use crate::model::{Match, MatchUpdate};

type Observer = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

/// Point-in-time view of the collection plus its derived aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    matches: Vec<Match>,
    live_count: usize,
}

impl Snapshot {
    fn new(matches: Vec<Match>) -> Self {
        let live_count = matches.iter().filter(|m| m.is_live()).count();
        Self {
            matches,
            live_count,
        }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn get(&self, match_id: &str) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

struct StoreInner {
    /// Serializes writers so merge and notification happen as one step.
    writer: Mutex<()>,
    current: RwLock<Arc<Snapshot>>,
    observers: RwLock<BTreeMap<u64, Observer>>,
    next_observer: AtomicU64,
    watch_tx: watch::Sender<Arc<Snapshot>>,
}

/// Shared handle to the snapshot store. Cloning is cheap and every clone
/// refers to the same collection.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let initial = Arc::new(Snapshot::default());
        let (watch_tx, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(StoreInner {
                writer: Mutex::new(()),
                current: RwLock::new(initial),
                observers: RwLock::new(BTreeMap::new()),
                next_observer: AtomicU64::new(1),
                watch_tx,
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current.read().clone()
    }

    /// Bulk load used for hydration. Later duplicates of an id are dropped so
    /// ids stay unique.
    pub fn replace(&self, matches: Vec<Match>) {
        let _writer = self.inner.writer.lock();
        let total = matches.len();
        let mut seen = HashSet::with_capacity(total);
        let matches: Vec<Match> = matches
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        if matches.len() != total {
            warn!(
                dropped = total - matches.len(),
                "bulk load carried duplicate match ids"
            );
        }
        debug!(count = matches.len(), "snapshot replaced");
        self.publish(Snapshot::new(matches));
    }

    /// Merges one update. Returns `false`, without notifying anyone, when the
    /// update names a match that is not in the collection.
    pub fn apply(&self, update: &MatchUpdate) -> bool {
        let _writer = self.inner.writer.lock();
        let current = self.snapshot();
        if current.get(&update.match_id).is_none() {
            return false;
        }
        let mut matches = current.matches.clone();
        merge_in_place(&mut matches, update);
        self.publish(Snapshot::new(matches));
        true
    }

    /// Registers `observer`; it stays registered until the returned
    /// subscription is dropped or unsubscribed.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.write().insert(id, Arc::new(observer));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Async view of the same snapshots, for consumers that prefer to await
    /// changes instead of registering a callback.
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.watch_tx.subscribe()
    }

    /// Caller must hold the writer lock.
    fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.inner.current.write() = snapshot.clone();
        metrics::LIVE_MATCHES.set(snapshot.live_count as i64);
        self.inner.watch_tx.send_replace(snapshot.clone());

        let observers: Vec<Observer> = self.inner.observers.read().values().cloned().collect();
        for observer in observers {
            observer(&snapshot);
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle returned by [`SnapshotStore::subscribe`].
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.observers.write().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchStatus;
    use std::sync::Mutex as StdMutex;

    fn seeded() -> SnapshotStore {
        let store = SnapshotStore::new();
        let mut m1 = Match::new("m1", "Falcons", "Otters");
        m1.status = MatchStatus::Live;
        m1.score_a = 10;
        m1.score_b = 8;
        m1.current_set = 2;
        store.replace(vec![m1, Match::new("m2", "Herons", "Lynx")]);
        store
    }

    #[test]
    fn apply_recomputes_live_count() {
        let store = seeded();
        assert_eq!(store.snapshot().live_count(), 1);

        assert!(store.apply(&MatchUpdate::new("m2").with_status(MatchStatus::Live)));
        assert_eq!(store.snapshot().live_count(), 2);

        assert!(store.apply(&MatchUpdate::new("m1").with_status(MatchStatus::Completed)));
        assert_eq!(store.snapshot().live_count(), 1);
    }

    #[test]
    fn observers_see_final_state_of_each_merge() {
        let store = seeded();
        let seen: Arc<StdMutex<Vec<(u32, usize)>>> = Arc::default();
        let _sub = {
            let seen = seen.clone();
            store.subscribe(move |snapshot| {
                let m1 = snapshot.get("m1").unwrap();
                seen.lock().unwrap().push((m1.score_a, snapshot.live_count()));
            })
        };

        store.apply(&MatchUpdate::new("m1").with_score_a(11));
        store.apply(&MatchUpdate::new("m1").with_score_a(12));
        assert_eq!(*seen.lock().unwrap(), vec![(11, 1), (12, 1)]);
    }

    #[test]
    fn unknown_match_does_not_notify() {
        let store = seeded();
        let calls = Arc::new(AtomicU64::new(0));
        let _sub = {
            let calls = calls.clone();
            store.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let before = store.snapshot();
        assert!(!store.apply(&MatchUpdate::new("ghost").with_score(1, 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn every_observer_is_notified_until_unsubscribed() {
        let store = seeded();
        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));
        let sub_first = {
            let first = first.clone();
            store.subscribe(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _sub_second = {
            let second = second.clone();
            store.subscribe(move |_| {
                second.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(store.observer_count(), 2);

        store.apply(&MatchUpdate::new("m1").with_score_a(1));
        sub_first.unsubscribe();
        store.apply(&MatchUpdate::new("m1").with_score_a(2));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(store.observer_count(), 1);
    }

    #[test]
    fn observer_may_read_the_store_while_notified() {
        let store = seeded();
        let reader = store.clone();
        let matched = Arc::new(AtomicU64::new(0));
        let _sub = {
            let matched = matched.clone();
            store.subscribe(move |snapshot| {
                if Arc::ptr_eq(snapshot, &reader.snapshot()) {
                    matched.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        store.apply(&MatchUpdate::new("m2").with_score_a(5));
        assert_eq!(matched.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replace_drops_duplicate_ids_and_keeps_order() {
        let store = SnapshotStore::new();
        let mut dup = Match::new("a", "x", "y");
        dup.score_a = 42;
        store.replace(vec![
            Match::new("b", "x", "y"),
            Match::new("a", "x", "y"),
            dup,
        ]);
        let snapshot = store.snapshot();
        let ids: Vec<_> = snapshot.matches().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(snapshot.get("a").unwrap().score_a, 0);
    }

    #[tokio::test]
    async fn watch_receivers_track_the_latest_snapshot() {
        let store = seeded();
        let mut rx = store.watch();
        store.apply(&MatchUpdate::new("m2").with_status(MatchStatus::Live));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().live_count(), 2);
    }
}
