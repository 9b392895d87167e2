//! Computed Implementation
//!
//! A Computed is a cached derived value. Its dependencies are whatever it
//! happened to read the last time it ran.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its producing function and caches
//!    the result. Every node read during the run becomes a dependency, stamped
//!    with the version it had at the time.
//!
//! 2. When something upstream is written, the computed is marked dirty. It
//!    does not recompute yet.
//!
//! 3. On the next access, the computed first brings each dependency up to
//!    date, then compares their versions to the recorded stamps.
//!
//! 4. If no stamp moved, the cached value is still right: mark clean and
//!    return it. Otherwise recompute.
//!
//! 5. After a successful recompute the dependency set is reconciled: edges to
//!    nodes that were not read this time are removed, edges to newly read
//!    nodes are added. If the new value differs from the cached one, the
//!    version is bumped and direct observers are marked dirty.
//!
//! # Why This Matters
//!
//! - A write only costs a walk that flips dirty markers
//! - Computeds that are never read stay dirty (no wasted work)
//! - A computed whose inputs were touched but came out unchanged never
//!   re-runs, and neither does anything downstream of it
//! - Reads are glitch free: a computed always pulls its inputs before
//!   deciding anything, so it can never observe half of an update
//!
//! # Failure
//!
//! If the producing function fails, nothing is committed: the cached value
//! and the recorded dependencies stay as they were, the node stays dirty, and
//! the error is returned to the reader. The next read tries again.

use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::change;
use super::context::{ReactiveContext, TrackedRead};
use super::resolve::Resolve;
use super::runtime::Runtime;
use super::rx::{Payload, Read};
use super::subscriber::{self, Observer};
use crate::error::{BoxError, Error, Result};
use crate::graph::{Node, NodeId, NodeKind, NodeState, ObserverKey, Reactive, Store, Subscription};

type Producer<T> = Box<dyn Fn() -> std::result::Result<T, BoxError> + Send + Sync>;

/// A cached value derived from other reactive nodes.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    node: Node,
    produce: Producer<T>,
    value: RwLock<Option<T>>,

    /// Nodes read during the last successful evaluation.
    dependencies: Mutex<Vec<TrackedRead>>,

    /// Recompute on next read even if no dependency moved.
    forced: AtomicBool,

    this: Weak<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Computed<T> {
    pub(crate) fn core(&self) -> &Node {
        &self.inner.node
    }
}

impl<T: Payload> Computed<T> {
    /// Create a computed from an infallible producing function.
    ///
    /// Nothing runs until the first read.
    pub fn new<F>(produce: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_store(produce, Runtime::store())
    }

    /// Create a computed attached to `store` instead of the default one.
    pub fn with_store<F>(produce: F, store: Arc<dyn Store>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(
            NodeKind::Derived,
            store,
            Box::new(move || Ok::<T, BoxError>(produce())),
        )
    }

    /// Create a computed whose producing function may fail.
    ///
    /// A failure is returned from `try_get` as [`Error::Producer`], unless the
    /// function returned a runtime [`Error`] itself, which is passed through.
    pub fn try_new<F, E>(produce: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::build(
            NodeKind::Derived,
            Runtime::store(),
            Box::new(move || produce().map_err(Into::<BoxError>::into)),
        )
    }

    /// Create a computed, accepting an explicit dependency list.
    ///
    /// The list is not used: dependencies are always discovered from the
    /// reads the producing function makes.
    pub fn with_dependencies<F>(produce: F, dependencies: &[NodeId]) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let computed = Self::new(produce);
        debug!(
            node = %computed.id(),
            declared = dependencies.len(),
            "ignoring declared dependencies; they are discovered on evaluation"
        );
        computed
    }

    /// Create a computed and evaluate it immediately.
    pub fn eager<F>(produce: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let computed = Self::new(produce);
        computed.inner.refresh()?;
        Ok(computed)
    }

    /// Fallible counterpart of [`Computed::eager`].
    ///
    /// A producer failure on the first evaluation is returned and the
    /// computed is dropped.
    pub fn try_eager<F, E>(produce: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let computed = Self::try_new(produce);
        computed.inner.refresh()?;
        Ok(computed)
    }

    pub(crate) fn build(kind: NodeKind, store: Arc<dyn Store>, produce: Producer<T>) -> Self {
        let inner = Arc::new_cyclic(|this| ComputedInner {
            node: Node::new(kind, store),
            produce,
            value: RwLock::new(None),
            dependencies: Mutex::new(Vec::new()),
            forced: AtomicBool::new(false),
            this: this.clone(),
        });
        Runtime::emit_created(&inner.node);
        Self { inner }
    }

    /// Give the computed a name, used in logs and error messages.
    pub fn with_name(self, name: impl Into<Arc<str>>) -> Self {
        self.set_name(name);
        self
    }

    pub fn set_name(&self, name: impl Into<Arc<str>>) {
        self.inner.node.set_name(name);
        Runtime::emit_named(&self.inner.node);
    }

    pub fn id(&self) -> NodeId {
        self.inner.node.id()
    }

    pub fn name(&self) -> Option<Arc<str>> {
        self.inner.node.name()
    }

    pub fn version(&self) -> u64 {
        self.inner.node.version()
    }

    pub fn state(&self) -> NodeState {
        self.inner.node.state()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of live observers directly subscribed to this computed.
    pub fn observer_count(&self) -> usize {
        self.inner.node.observer_count()
    }

    /// Ids of the nodes read during the last successful evaluation.
    pub fn dependency_ids(&self) -> Vec<NodeId> {
        self.inner
            .dependencies
            .lock()
            .iter()
            .map(|read| read.source.node().id())
            .collect()
    }

    /// Get the current value, recomputing first if needed.
    ///
    /// # Panics
    ///
    /// Panics if evaluation fails. Use [`Computed::try_get`] to handle the
    /// error instead.
    pub fn get(&self) -> T {
        Read::get(self)
    }

    /// Get the current value, or the error raised while computing it.
    pub fn try_get(&self) -> Result<T> {
        self.inner.refresh()?;
        ReactiveContext::track_read(self.reactive(), self.inner.node.version());
        Runtime::emit_read(&self.inner.node);
        Ok(self
            .inner
            .value
            .read()
            .clone()
            .expect("refreshed computed should have a value"))
    }

    /// Get the current value without tracking dependencies.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Computed::get`].
    pub fn get_untracked(&self) -> T {
        ReactiveContext::untracked(|| self.get())
    }

    /// Force the next read to re-run the producing function.
    ///
    /// Everything downstream is dirtied too, and greedy observers are
    /// notified as they would be after a write.
    pub fn invalidate(&self) {
        self.inner.forced.store(true, Ordering::Release);
        let node = &self.inner.node;
        let store = node.store();
        store.mark_dirty(&[node]);
        store.propagate(node);
    }

    /// Subscribe a greedy observer. The computed holds it weakly.
    pub fn subscribe<O: Observer>(&self, observer: &Arc<O>) {
        subscriber::attach(&self.inner.node, observer);
    }

    pub fn unsubscribe<O: Observer>(&self, observer: &Arc<O>) {
        subscriber::detach(&self.inner.node, observer);
    }

    pub(crate) fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }
}

impl<T: Payload> ComputedInner<T> {
    fn subscription(&self) -> Subscription {
        let weak: Weak<dyn Reactive> = self.this.clone();
        Subscription::Node(weak)
    }

    fn recompute(&self, seen: u64) -> Result<()> {
        let (produced, reads) = {
            let _evaluating = self.node.begin_evaluation();
            let frame = ReactiveContext::enter(self.node.id());
            let produced = (self.produce)();
            (produced, frame.take_reads())
        };

        let next = match produced {
            Ok(value) => value,
            Err(err) => {
                let err = Error::producer(self.node.label(), err);
                debug!(node = %self.node.label(), error = %err, "evaluation failed");
                return Err(err);
            }
        };

        self.reconcile(reads);
        self.forced.store(false, Ordering::Release);

        let changed = match &*self.value.read() {
            Some(previous) => change::differs(previous, &next),
            None => true,
        };

        let store = self.node.store();
        if changed {
            *self.value.write() = Some(next);
            self.node.bump_version();
            Runtime::emit_updated(&self.node);

            let dependents = store.dependents(&self.node);
            let nodes: Vec<&Node> = dependents.iter().map(|dependent| dependent.node()).collect();
            store.mark_dirty(&nodes);
        }

        if !self.node.settle(seen) {
            trace!(node = %self.node.id(), "invalidated while evaluating");
        }
        trace!(node = %self.node.id(), changed, version = self.node.version(), "recomputed");
        Ok(())
    }

    /// Replace the recorded dependencies with `reads`, adjusting edges.
    fn reconcile(&self, reads: Vec<TrackedRead>) {
        let key = ObserverKey::of(self as *const Self);
        let mut dependencies = self.dependencies.lock();

        let next: HashSet<NodeId> = reads.iter().map(|read| read.source.node().id()).collect();
        let previous: HashSet<NodeId> = dependencies
            .iter()
            .map(|read| read.source.node().id())
            .collect();

        for dropped in dependencies
            .iter()
            .filter(|read| !next.contains(&read.source.node().id()))
        {
            let node = dropped.source.node();
            node.store().unsubscribe(node, key);
        }

        for added in reads
            .iter()
            .filter(|read| !previous.contains(&read.source.node().id()))
        {
            let node = added.source.node();
            node.store().subscribe(node, self.subscription());
        }

        let retired = mem::replace(&mut *dependencies, reads);
        drop(dependencies);
        drop(retired);
    }
}

impl<T: Payload> Reactive for ComputedInner<T> {
    fn node(&self) -> &Node {
        &self.node
    }

    fn refresh(&self) -> Result<()> {
        if ReactiveContext::is_evaluating(self.node.id()) {
            return Err(Error::ReentrantEvaluation {
                node: self.node.label(),
            });
        }

        let store = self.node.store();
        let has_value = self.value.read().is_some();
        let forced = self.forced.load(Ordering::Acquire);
        if has_value && !forced && !store.is_dirty(&self.node) {
            return Ok(());
        }

        if has_value && !forced {
            let dependencies = self.dependencies.lock().clone();
            for dependency in &dependencies {
                dependency.source.refresh()?;
            }

            let seen = self.node.dirty_marker();
            let moved = dependencies
                .iter()
                .any(|dependency| dependency.source.node().version() != dependency.version);
            if !moved {
                trace!(node = %self.node.id(), "inputs unchanged; keeping cached value");
                self.node.settle(seen);
                return Ok(());
            }
            return self.recompute(seen);
        }

        let seen = self.node.dirty_marker();
        self.recompute(seen)
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let key = ObserverKey::of(self as *const Self);
        for dependency in self.dependencies.get_mut().iter() {
            let node = dependency.source.node();
            node.store().unsubscribe(node, key);
        }
    }
}

impl<T: Payload> Read<T> for Computed<T> {
    fn try_get(&self) -> Result<T> {
        Computed::try_get(self)
    }

    fn node(&self) -> &Node {
        &self.inner.node
    }

    fn reactive(&self) -> Arc<dyn Reactive> {
        Arc::clone(&self.inner) as Arc<dyn Reactive>
    }
}

impl<T: Payload + fmt::Display> fmt::Display for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_get_untracked() {
            Ok(value) => write!(f, "<{value}>"),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl<T: Payload> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("version", &self.version())
            .field("has_value", &self.has_value())
            .finish()
    }
}

/// Lift a plain function into one that builds computeds.
///
/// The returned function takes anything implementing [`Resolve`]: a plain
/// value wrapped in [`Plain`](super::Plain), a signal or computed, or a tuple
/// mixing them. Arguments are resolved, and their reactive parts tracked,
/// every time the computed evaluates.
///
/// ```rust
/// use ripple_core::reactive::{computed, Signal};
///
/// let source = Signal::new(5);
/// let doubled = computed(|x: i32| x * 2)(source.clone());
///
/// assert_eq!(doubled.get(), 10);
/// source.set(7);
/// assert_eq!(doubled.get(), 14);
/// ```
pub fn computed<A, R, F>(f: F) -> impl Fn(A) -> Computed<R>
where
    A: Resolve + Send + Sync + 'static,
    F: Fn(A::Output) -> R + Send + Sync + 'static,
    R: Payload,
{
    let f = Arc::new(f);
    move |args: A| {
        let f = Arc::clone(&f);
        Computed::try_new(move || args.resolve().map(|resolved| f(resolved)))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
