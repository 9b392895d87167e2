//! Signal Implementation
//!
//! A Signal is the source of truth in the graph. It holds a value, or a
//! reference to another reactive node whose value it forwards, and is the
//! only kind of node user code writes to directly.
//!
//! # How Signals Work
//!
//! 1. Reading a signal while a computed is evaluating records the signal as
//!    one of the computed's dependencies, stamped with the signal's version.
//!
//! 2. Writing a signal first asks the change oracle whether the new value
//!    differs from the stored one. Writes that change nothing are stored but
//!    go no further.
//!
//! 3. A real change bumps the version and asks the store to propagate: every
//!    node downstream is marked dirty and greedy observers are notified.
//!    Nothing downstream recomputes until it is read.
//!
//! # Nesting
//!
//! A signal may store another signal or computed instead of a plain value.
//! Reads resolve through the reference, and the signal subscribes to the
//! referenced node so writes to it reach the signal's own observers. When the
//! referenced node's version moves, the signal's version moves with it.
//!
//! # Thread Safety
//!
//! The stored value sits behind a `parking_lot::RwLock`; handles are cheap
//! `Arc` clones and can be sent between threads.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{trace, warn};

use super::change;
use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::rx::{Nested, Payload, Read, Rx};
use super::subscriber::{self, Observer};
use crate::error::Result;
use crate::graph::{Node, NodeId, NodeKind, ObserverKey, Reactive, Store, Subscription};

/// A reactive signal holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (dirties everything downstream)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    node: Node,
    value: RwLock<Nested<T>>,

    /// Version of the referenced node when this signal last looked at it.
    nested_seen: AtomicU64,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Payload> Signal<T> {
    /// Create a new signal attached to the default store.
    pub fn new(value: impl Into<Nested<T>>) -> Self {
        Self::with_store(value, Runtime::store())
    }

    /// Create a new signal attached to `store`.
    pub fn with_store(value: impl Into<Nested<T>>, store: Arc<dyn Store>) -> Self {
        let signal = Self {
            inner: Arc::new(SignalInner {
                node: Node::new(NodeKind::Source, store),
                value: RwLock::new(value.into()),
                nested_seen: AtomicU64::new(0),
            }),
        };

        let nested = signal.inner.value.read().rx().cloned();
        if let Some(rx) = nested {
            signal.observe(&rx);
        }

        Runtime::emit_created(&signal.inner.node);
        signal
    }

    /// Give the signal a name, used in logs and error messages.
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

    /// Number of live observers directly subscribed to this signal.
    pub fn observer_count(&self) -> usize {
        self.inner.node.observer_count()
    }

    /// Get the current value.
    ///
    /// If called while a computed is evaluating, the signal becomes one of
    /// its dependencies.
    ///
    /// # Panics
    ///
    /// Panics if the signal forwards a computed whose evaluation fails. Use
    /// [`Signal::try_get`] to handle that case.
    pub fn get(&self) -> T {
        Read::get(self)
    }

    /// Get the current value, or the error raised while resolving it.
    pub fn try_get(&self) -> Result<T> {
        self.inner.refresh()?;
        ReactiveContext::track_read(self.reactive(), self.inner.node.version());
        Runtime::emit_read(&self.inner.node);
        self.stored().resolve()
    }

    /// Get the current value without tracking dependencies.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Signal::get`].
    pub fn get_untracked(&self) -> T {
        ReactiveContext::untracked(|| self.get())
    }

    /// The stored value, without resolving references.
    pub fn stored(&self) -> Nested<T> {
        self.inner.value.read().clone()
    }

    /// Store a new value.
    ///
    /// Observers are dirtied only if the value differs from the stored one.
    pub fn set(&self, value: impl Into<Nested<T>>) {
        let next = value.into();
        let incoming = next.rx().cloned();

        let (changed, previous) = {
            let mut slot = self.inner.value.write();
            let changed = change::differs(&*slot, &next);
            (changed, mem::replace(&mut *slot, next))
        };

        if !changed {
            trace!(node = %self.id(), "write did not change value");
            return;
        }

        if let Some(rx) = previous.rx() {
            self.unobserve(rx);
        }
        if let Some(rx) = incoming {
            self.observe(&rx);
        }

        self.notify();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked();
        self.set(f(&current));
    }

    /// Mutate the value in place and notify unconditionally.
    ///
    /// Writes through to a referenced signal. Returns `false`, changing
    /// nothing, if the signal forwards a computed.
    pub fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let forwarded = self.inner.value.read().rx().cloned();
        match forwarded {
            Some(Rx::Signal(target)) => target.mutate(f),
            Some(Rx::Computed(_)) => {
                warn!(node = %self.inner.node.label(), "cannot mutate through a computed");
                false
            }
            None => {
                if let Nested::Value(value) = &mut *self.inner.value.write() {
                    f(value);
                }
                self.notify();
                true
            }
        }
    }

    /// Temporarily store `value`.
    ///
    /// The previous stored value comes back when the returned guard is
    /// dropped, including during unwinding.
    pub fn at(&self, value: impl Into<Nested<T>>) -> Override<'_, T> {
        let prior = self.stored();
        self.set(value);
        Override {
            signal: self,
            prior: Some(prior),
        }
    }

    /// Run `f` with `value` temporarily stored.
    pub fn with_value<R>(&self, value: impl Into<Nested<T>>, f: impl FnOnce() -> R) -> R {
        let _restore = self.at(value);
        f()
    }

    /// Subscribe a greedy observer. The signal holds it weakly.
    pub fn subscribe<O: Observer>(&self, observer: &Arc<O>) {
        subscriber::attach(&self.inner.node, observer);
    }

    pub fn unsubscribe<O: Observer>(&self, observer: &Arc<O>) {
        subscriber::detach(&self.inner.node, observer);
    }

    fn subscription(&self) -> Subscription {
        let weak: Weak<dyn Reactive> = Arc::downgrade(&self.inner) as Weak<dyn Reactive>;
        Subscription::Node(weak)
    }

    fn observe(&self, rx: &Rx<T>) {
        let target = rx.node();
        target.store().subscribe(target, self.subscription());
        self.inner
            .nested_seen
            .store(target.version(), Ordering::Release);
    }

    fn unobserve(&self, rx: &Rx<T>) {
        let target = rx.node();
        target
            .store()
            .unsubscribe(target, ObserverKey::of(Arc::as_ptr(&self.inner)));
    }

    fn notify(&self) {
        let node = &self.inner.node;
        node.bump_version();
        Runtime::emit_updated(node);

        let store = node.store();
        store.mark_dirty(&[node]);
        store.propagate(node);
        store.mark_clean(node);
    }
}

impl<T: Payload> Read<T> for Signal<T> {
    fn try_get(&self) -> Result<T> {
        Signal::try_get(self)
    }

    fn node(&self) -> &Node {
        &self.inner.node
    }

    fn reactive(&self) -> Arc<dyn Reactive> {
        Arc::clone(&self.inner) as Arc<dyn Reactive>
    }
}

impl<T: Payload> Reactive for SignalInner<T> {
    fn node(&self) -> &Node {
        &self.node
    }

    fn refresh(&self) -> Result<()> {
        let nested = self.value.read().rx().cloned();
        if let Some(rx) = nested {
            rx.reactive().refresh()?;
            let current = rx.node().version();
            if self.nested_seen.swap(current, Ordering::AcqRel) != current {
                self.node.bump_version();
                Runtime::emit_updated(&self.node);
            }
        }
        self.node.store().mark_clean(&self.node);
        Ok(())
    }
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        let key = ObserverKey::of(self as *const Self);
        if let Nested::Rx(rx) = self.value.get_mut() {
            let target = match rx {
                Rx::Signal(signal) => &signal.inner.node,
                Rx::Computed(computed) => computed.core(),
            };
            target.store().unsubscribe(target, key);
        }
    }
}

/// Restores a signal's previous stored value when dropped.
///
/// Returned by [`Signal::at`].
#[must_use = "the previous value is restored as soon as the guard is dropped"]
pub struct Override<'a, T: Payload> {
    signal: &'a Signal<T>,
    prior: Option<Nested<T>>,
}

impl<T: Payload> Drop for Override<'_, T> {
    fn drop(&mut self) {
        if let Some(prior) = self.prior.take() {
            self.signal.set(prior);
        }
    }
}

impl<T: Payload + fmt::Display> fmt::Display for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_get_untracked() {
            Ok(value) => write!(f, "<{value}>"),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl<T: Payload> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}
