//! Graph Nodes
//!
//! This module defines the per-node core shared by every reactive handle:
//! identity, kind, an optional name, the version counter, the dirty marker and
//! the weak observer set. It also defines the [`Reactive`] contract concrete
//! nodes implement so the store and the dependency tracker can treat sources
//! and derived values uniformly.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use super::store::{ObserverSet, Store};
use crate::error::Result;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). Written directly by user code.
    Source,

    /// A derived node (computed). Caches the result of a producing function.
    Derived,

    /// The derived node backing an effect. Never read by other nodes.
    Effect,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Source => "signal",
            NodeKind::Derived => "computed",
            NodeKind::Effect => "effect",
        };
        f.write_str(name)
    }
}

/// Evaluation state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The cached value is up to date.
    Clean,

    /// Something upstream was written. The next read checks the
    /// dependencies' versions and recomputes only if one advanced.
    Dirty,

    /// The producing function is running on some thread.
    Evaluating,
}

/// Identifies a node in error messages and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabel {
    id: NodeId,
    kind: NodeKind,
    name: Option<Arc<str>>,
}

impl NodeLabel {
    pub fn new(id: NodeId, kind: NodeKind, name: Option<Arc<str>>) -> Self {
        Self { id, kind, name }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} '{}' ({})", self.kind, name, self.id),
            None => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// Contract every concrete node satisfies.
///
/// The store only ever sees nodes through this trait: it marks them dirty via
/// [`Reactive::node`] and the owning handle brings the value up to date in
/// [`Reactive::refresh`] when somebody pulls.
pub trait Reactive: Send + Sync + 'static {
    /// The shared node core.
    fn node(&self) -> &Node;

    /// Bring the cached value up to date.
    ///
    /// Sources refresh whatever reactive node they currently point at.
    /// Derived nodes pull their dependencies and recompute if needed.
    fn refresh(&self) -> Result<()>;
}

/// Per-node state shared by every handle of one node.
///
/// The observer set and the dirty marker are owned by this struct but only
/// mutated through a [`Store`].
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    name: RwLock<Option<Arc<str>>>,

    /// Incremented on every committed value change.
    version: AtomicU64,

    /// 0 when clean, otherwise the number of unacknowledged notifications.
    dirty: AtomicU64,

    evaluating: AtomicBool,

    /// Weak references to everything that reads this node.
    observers: Mutex<ObserverSet>,

    store: Arc<dyn Store>,
}

impl Node {
    /// Create a new node with the given kind, attached to `store`.
    pub fn new(kind: NodeKind, store: Arc<dyn Store>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            name: RwLock::new(None),
            version: AtomicU64::new(0),
            dirty: AtomicU64::new(match kind {
                NodeKind::Source => 0,
                // Start dirty so the first read evaluates.
                NodeKind::Derived | NodeKind::Effect => 1,
            }),
            evaluating: AtomicBool::new(false),
            observers: Mutex::new(ObserverSet::new()),
            store,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> Option<Arc<str>> {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<Arc<str>>) {
        *self.name.write() = Some(name.into());
    }

    pub fn label(&self) -> NodeLabel {
        NodeLabel::new(self.id, self.kind, self.name())
    }

    /// Current version. Starts at 0 and only ever grows.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn state(&self) -> NodeState {
        if self.evaluating.load(Ordering::Acquire) {
            NodeState::Evaluating
        } else if self.store.is_dirty(self) {
            NodeState::Dirty
        } else {
            NodeState::Clean
        }
    }

    /// The store this node was created with.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Number of live observers directly subscribed to this node.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().iter().filter(|s| s.is_alive()).count()
    }

    pub(crate) fn observers(&self) -> MutexGuard<'_, ObserverSet> {
        self.observers.lock()
    }

    pub(crate) fn dirty_marker(&self) -> u64 {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn add_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(0, Ordering::Release);
    }

    /// Clear the dirty marker only if nothing marked the node since `seen`
    /// was read. Returns `false` when a write slipped in during evaluation.
    pub(crate) fn settle(&self, seen: u64) -> bool {
        self.dirty
            .compare_exchange(seen, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Flag the node as evaluating until the returned guard is dropped.
    pub(crate) fn begin_evaluation(&self) -> EvaluationGuard<'_> {
        self.evaluating.store(true, Ordering::Release);
        EvaluationGuard { node: self }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("version", &self.version())
            .field("dirty", &self.dirty_marker())
            .finish()
    }
}

pub(crate) struct EvaluationGuard<'a> {
    node: &'a Node,
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        self.node.evaluating.store(false, Ordering::Release);
    }
}
