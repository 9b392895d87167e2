//! Greedy observers.
//!
//! An observer is anything that wants to be told, eagerly, that something it
//! watches was written. Effects and display adapters are observers; so is a
//! plain [`Subscriber`] wrapping a closure.
//!
//! Observers are held weakly by the nodes they watch. Keep the `Arc` alive
//! for as long as notifications are wanted.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::graph::{Node, ObserverKey, Subscription};

/// Something notified after a write upstream of it.
///
/// `update` runs once per write, after the whole downstream graph has been
/// marked dirty, so reads made from inside it observe consistent values.
pub trait Observer: Send + Sync + 'static {
    fn update(&self);
}

/// A subscriber invoking a closure on every notification.
pub struct Subscriber {
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            notify: Box::new(notify),
        })
    }
}

impl Observer for Subscriber {
    fn update(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").finish_non_exhaustive()
    }
}

/// Add `observer` to `node`'s observer set as a weak greedy edge.
pub(crate) fn attach<O: Observer>(node: &Node, observer: &Arc<O>) {
    let weak: Weak<dyn Observer> = Arc::downgrade(observer) as Weak<dyn Observer>;
    node.store().subscribe(node, Subscription::Greedy(weak));
}

pub(crate) fn detach<O: Observer>(node: &Node, observer: &Arc<O>) {
    node.store()
        .unsubscribe(node, ObserverKey::of(Arc::as_ptr(observer)));
}
