//! Dependency Store
//!
//! The store owns every graph-mutating operation: adding and removing
//! subscription edges, dirty bookkeeping, and propagation after a source
//! write.
//!
//! # Propagation
//!
//! When a source commits a new value it asks its store to propagate:
//!
//! 1. Walk the transitive closure of the source's observers breadth first,
//!    visiting every node once.
//! 2. Mark every graph node in the closure dirty. Nothing recomputes yet.
//! 3. Once all marking is done, call `update()` on every greedy observer
//!    (effects, display adapters, plain subscribers) found in the closure,
//!    each exactly once.
//!
//! Greedy observers therefore only ever pull from a fully dirtied graph,
//! which is what keeps reads glitch free.
//!
//! Two variants exist. [`SyncStore`] performs the operations directly and is
//! the default. [`LockedStore`] serialises them behind one reentrant mutex for
//! graphs shared between concurrently scheduled tasks.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::node::{Node, Reactive};
use crate::reactive::Observer;

/// Observer set stored inline on each node.
pub type ObserverSet = SmallVec<[Subscription; 4]>;

/// Identity of an observer, derived from the address of its allocation.
///
/// Stays valid while the observer is being dropped, which is what lets a node
/// remove itself from its dependencies' observer sets in `Drop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverKey(usize);

impl ObserverKey {
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr as *const () as usize)
    }
}

/// A weak edge from a node to one of its observers.
#[derive(Clone)]
pub enum Subscription {
    /// Another graph node. Marked dirty during propagation and walked
    /// through transitively.
    Node(Weak<dyn Reactive>),

    /// A greedy observer. Notified after marking completes.
    Greedy(Weak<dyn Observer>),
}

impl Subscription {
    pub fn key(&self) -> ObserverKey {
        match self {
            Subscription::Node(weak) => ObserverKey::of(weak.as_ptr()),
            Subscription::Greedy(weak) => ObserverKey::of(weak.as_ptr()),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Subscription::Node(weak) => weak.strong_count() > 0,
            Subscription::Greedy(weak) => weak.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Live> {
        match self {
            Subscription::Node(weak) => weak.upgrade().map(Live::Node),
            Subscription::Greedy(weak) => weak.upgrade().map(Live::Greedy),
        }
    }
}

/// A subscription that was alive when it was looked at.
#[derive(Clone)]
pub enum Live {
    Node(Arc<dyn Reactive>),
    Greedy(Arc<dyn Observer>),
}

impl Live {
    pub fn key(&self) -> ObserverKey {
        match self {
            Live::Node(node) => ObserverKey::of(Arc::as_ptr(node)),
            Live::Greedy(observer) => ObserverKey::of(Arc::as_ptr(observer)),
        }
    }
}

/// Graph operations shared by every node attached to the store.
pub trait Store: Send + Sync + 'static {
    /// Add `subscription` to `node`'s observer set.
    ///
    /// Duplicates and self-observation are ignored.
    fn subscribe(&self, node: &Node, subscription: Subscription);

    /// Remove the observer identified by `key` from `node`'s observer set.
    fn unsubscribe(&self, node: &Node, key: ObserverKey);

    fn mark_dirty(&self, nodes: &[&Node]);

    fn mark_clean(&self, node: &Node);

    fn is_dirty(&self, node: &Node) -> bool;

    /// Every live observer reachable from `node`, each listed once.
    fn observers_of(&self, node: &Node) -> Vec<Live>;

    /// Live graph nodes directly observing `node`.
    fn dependents(&self, node: &Node) -> Vec<Arc<dyn Reactive>>;

    /// Live greedy observers directly subscribed to `node`.
    fn greedy_observers(&self, node: &Node) -> Vec<Arc<dyn Observer>>;

    /// Dirty the transitive closure of `node` and notify greedy observers.
    ///
    /// Does nothing unless `node` itself is dirty.
    fn propagate(&self, node: &Node);
}

/// Which store new nodes attach to by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sync,
    Locked,
}

impl StoreKind {
    pub fn build(self) -> Arc<dyn Store> {
        match self {
            StoreKind::Sync => Arc::new(SyncStore::new()),
            StoreKind::Locked => Arc::new(LockedStore::new()),
        }
    }
}

/// Store that performs every operation directly on the caller's thread.
#[derive(Debug, Default)]
pub struct SyncStore;

impl SyncStore {
    pub fn new() -> Self {
        Self
    }
}

impl Store for SyncStore {
    fn subscribe(&self, node: &Node, subscription: Subscription) {
        subscribe(node, subscription);
    }

    fn unsubscribe(&self, node: &Node, key: ObserverKey) {
        unsubscribe(node, key);
    }

    fn mark_dirty(&self, nodes: &[&Node]) {
        for node in nodes {
            node.add_dirty();
        }
    }

    fn mark_clean(&self, node: &Node) {
        node.clear_dirty();
    }

    fn is_dirty(&self, node: &Node) -> bool {
        node.dirty_marker() > 0
    }

    fn observers_of(&self, node: &Node) -> Vec<Live> {
        observers_of(node)
    }

    fn dependents(&self, node: &Node) -> Vec<Arc<dyn Reactive>> {
        snapshot(node)
            .into_iter()
            .filter_map(|live| match live {
                Live::Node(node) => Some(node),
                Live::Greedy(_) => None,
            })
            .collect()
    }

    fn greedy_observers(&self, node: &Node) -> Vec<Arc<dyn Observer>> {
        snapshot(node)
            .into_iter()
            .filter_map(|live| match live {
                Live::Greedy(observer) => Some(observer),
                Live::Node(_) => None,
            })
            .collect()
    }

    fn propagate(&self, node: &Node) {
        if !self.is_dirty(node) {
            return;
        }

        let mut greedy = Vec::new();
        let mut marked = 0usize;
        for live in observers_of(node) {
            match live {
                Live::Node(observer) => {
                    observer.node().add_dirty();
                    marked += 1;
                }
                Live::Greedy(observer) => greedy.push(observer),
            }
        }

        trace!(
            node = %node.label(),
            marked,
            greedy = greedy.len(),
            "propagated write"
        );

        for observer in greedy {
            observer.update();
        }
    }
}

/// Store that serialises every operation behind one reentrant mutex.
///
/// Greedy observers run while the lock is held, so they may freely read and
/// write other nodes on the same thread. Other threads wait until the whole
/// propagation finishes.
pub struct LockedStore {
    lock: ReentrantMutex<()>,
    inner: SyncStore,
}

impl LockedStore {
    pub fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            inner: SyncStore::new(),
        }
    }
}

impl Default for LockedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for LockedStore {
    fn subscribe(&self, node: &Node, subscription: Subscription) {
        let _serial = self.lock.lock();
        self.inner.subscribe(node, subscription);
    }

    fn unsubscribe(&self, node: &Node, key: ObserverKey) {
        let _serial = self.lock.lock();
        self.inner.unsubscribe(node, key);
    }

    fn mark_dirty(&self, nodes: &[&Node]) {
        let _serial = self.lock.lock();
        self.inner.mark_dirty(nodes);
    }

    fn mark_clean(&self, node: &Node) {
        let _serial = self.lock.lock();
        self.inner.mark_clean(node);
    }

    fn is_dirty(&self, node: &Node) -> bool {
        let _serial = self.lock.lock();
        self.inner.is_dirty(node)
    }

    fn observers_of(&self, node: &Node) -> Vec<Live> {
        let _serial = self.lock.lock();
        self.inner.observers_of(node)
    }

    fn dependents(&self, node: &Node) -> Vec<Arc<dyn Reactive>> {
        let _serial = self.lock.lock();
        self.inner.dependents(node)
    }

    fn greedy_observers(&self, node: &Node) -> Vec<Arc<dyn Observer>> {
        let _serial = self.lock.lock();
        self.inner.greedy_observers(node)
    }

    fn propagate(&self, node: &Node) {
        let _serial = self.lock.lock();
        self.inner.propagate(node);
    }
}

fn subscribe(node: &Node, subscription: Subscription) {
    if let Subscription::Node(weak) = &subscription {
        let is_self = weak
            .upgrade()
            .is_some_and(|observer| observer.node().id() == node.id());
        if is_self {
            return;
        }
    }

    let key = subscription.key();
    let mut observers = node.observers();
    observers.retain(|existing| existing.is_alive());
    if observers.iter().any(|existing| existing.key() == key) {
        return;
    }
    observers.push(subscription);
    debug!(node = %node.id(), observers = observers.len(), "subscribed");
}

fn unsubscribe(node: &Node, key: ObserverKey) {
    let mut observers = node.observers();
    let before = observers.len();
    observers.retain(|existing| existing.key() != key && existing.is_alive());
    if observers.len() != before {
        debug!(node = %node.id(), observers = observers.len(), "unsubscribed");
    }
}

/// Live direct observers of `node`. The lock is released before returning.
fn snapshot(node: &Node) -> Vec<Live> {
    node.observers()
        .iter()
        .filter_map(Subscription::upgrade)
        .collect()
}

fn observers_of(node: &Node) -> Vec<Live> {
    let mut reached = Vec::new();
    let mut visited = HashSet::new();
    let mut queue: VecDeque<Live> = snapshot(node).into();

    while let Some(live) = queue.pop_front() {
        if !visited.insert(live.key()) {
            continue;
        }
        if let Live::Node(observer) = &live {
            queue.extend(snapshot(observer.node()));
        }
        reached.push(live);
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::graph::NodeKind;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct TestNode {
        node: Node,
    }

    impl TestNode {
        fn new(kind: NodeKind, store: &Arc<dyn Store>) -> Arc<Self> {
            Arc::new(Self {
                node: Node::new(kind, Arc::clone(store)),
            })
        }

        fn edge(self: &Arc<Self>) -> Subscription {
            let weak: Weak<dyn Reactive> = Arc::downgrade(self) as Weak<dyn Reactive>;
            Subscription::Node(weak)
        }
    }

    impl Reactive for TestNode {
        fn node(&self) -> &Node {
            &self.node
        }

        fn refresh(&self) -> Result<()> {
            Ok(())
        }
    }

    struct Counter(AtomicI32);

    impl Observer for Counter {
        fn update(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn greedy(counter: &Arc<Counter>) -> Subscription {
        let weak: Weak<dyn Observer> = Arc::downgrade(counter) as Weak<dyn Observer>;
        Subscription::Greedy(weak)
    }

    fn stores() -> Vec<Arc<dyn Store>> {
        vec![StoreKind::Sync.build(), StoreKind::Locked.build()]
    }

    #[test]
    fn subscribe_ignores_duplicates_and_self() {
        for store in stores() {
            let source = TestNode::new(NodeKind::Source, &store);
            let derived = TestNode::new(NodeKind::Derived, &store);

            store.subscribe(&source.node, derived.edge());
            store.subscribe(&source.node, derived.edge());
            store.subscribe(&source.node, source.edge());

            assert_eq!(source.node.observer_count(), 1);

            store.unsubscribe(&source.node, derived.edge().key());
            assert_eq!(source.node.observer_count(), 0);
        }
    }

    #[test]
    fn dropped_observers_are_not_counted() {
        let store = StoreKind::Sync.build();
        let source = TestNode::new(NodeKind::Source, &store);
        let derived = TestNode::new(NodeKind::Derived, &store);
        store.subscribe(&source.node, derived.edge());

        drop(derived);
        assert_eq!(source.node.observer_count(), 0);
        assert!(store.observers_of(&source.node).is_empty());
    }

    #[test]
    fn observers_of_is_transitive_and_deduplicated() {
        for store in stores() {
            // source -> left, right -> bottom
            let source = TestNode::new(NodeKind::Source, &store);
            let left = TestNode::new(NodeKind::Derived, &store);
            let right = TestNode::new(NodeKind::Derived, &store);
            let bottom = TestNode::new(NodeKind::Derived, &store);

            store.subscribe(&source.node, left.edge());
            store.subscribe(&source.node, right.edge());
            store.subscribe(&left.node, bottom.edge());
            store.subscribe(&right.node, bottom.edge());

            let reached = store.observers_of(&source.node);
            assert_eq!(reached.len(), 3);
            assert_eq!(store.dependents(&source.node).len(), 2);
        }
    }

    #[test]
    fn propagate_marks_then_notifies_each_greedy_once() {
        for store in stores() {
            let source = TestNode::new(NodeKind::Source, &store);
            let left = TestNode::new(NodeKind::Derived, &store);
            let right = TestNode::new(NodeKind::Derived, &store);
            let counter = Arc::new(Counter(AtomicI32::new(0)));

            store.subscribe(&source.node, left.edge());
            store.subscribe(&source.node, right.edge());
            store.subscribe(&left.node, greedy(&counter));
            store.subscribe(&right.node, greedy(&counter));
            assert_eq!(store.greedy_observers(&left.node).len(), 1);

            store.mark_clean(&left.node);
            store.mark_clean(&right.node);

            // Not dirty: nothing happens.
            store.propagate(&source.node);
            assert_eq!(counter.0.load(Ordering::SeqCst), 0);

            store.mark_dirty(&[&source.node]);
            store.propagate(&source.node);
            store.mark_clean(&source.node);

            assert!(store.is_dirty(&left.node));
            assert!(store.is_dirty(&right.node));
            assert!(!store.is_dirty(&source.node));
            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn store_kind_deserializes_lowercase() {
        let kind: StoreKind = serde_json::from_str("\"locked\"").unwrap();
        assert_eq!(kind, StoreKind::Locked);
        assert_eq!(StoreKind::default(), StoreKind::Sync);
    }
}
