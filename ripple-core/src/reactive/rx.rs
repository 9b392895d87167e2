//! Type-erased handles and nested values.
//!
//! [`Rx`] is "some reactive node producing `T`", whichever kind it is.
//! [`Nested`] is what a [`Signal`] stores: a plain value, or a reference to
//! another reactive node whose value it forwards.

use std::fmt;
use std::sync::Arc;

use super::change::Change;
use super::computed::Computed;
use super::context::ReactiveContext;
use super::signal::Signal;
use crate::error::Result;
use crate::graph::{Node, NodeId, Reactive};

/// Bounds every reactive value type satisfies.
pub trait Payload: Clone + Change + Send + Sync + 'static {}

impl<T: Clone + Change + Send + Sync + 'static> Payload for T {}

/// Read access shared by every reactive handle.
pub trait Read<T>: Send + Sync + 'static {
    /// Read the current value, attributing the read to the running
    /// evaluation if there is one.
    fn try_get(&self) -> Result<T>;

    /// Like [`Read::try_get`].
    ///
    /// # Panics
    ///
    /// Panics with the error's message if the value cannot be produced.
    fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Read the current value without recording a dependency.
    fn try_get_untracked(&self) -> Result<T> {
        ReactiveContext::untracked(|| self.try_get())
    }

    /// The node core behind this handle.
    fn node(&self) -> &Node;

    /// The node as seen by the graph.
    fn reactive(&self) -> Arc<dyn Reactive>;

    fn id(&self) -> NodeId {
        self.node().id()
    }
}

/// Any reactive node producing `T`.
pub enum Rx<T> {
    Signal(Signal<T>),
    Computed(Computed<T>),
}

impl<T> Clone for Rx<T> {
    fn clone(&self) -> Self {
        match self {
            Rx::Signal(signal) => Rx::Signal(signal.clone()),
            Rx::Computed(computed) => Rx::Computed(computed.clone()),
        }
    }
}

impl<T: Payload> Read<T> for Rx<T> {
    fn try_get(&self) -> Result<T> {
        match self {
            Rx::Signal(signal) => signal.try_get(),
            Rx::Computed(computed) => computed.try_get(),
        }
    }

    fn node(&self) -> &Node {
        match self {
            Rx::Signal(signal) => Read::node(signal),
            Rx::Computed(computed) => Read::node(computed),
        }
    }

    fn reactive(&self) -> Arc<dyn Reactive> {
        match self {
            Rx::Signal(signal) => signal.reactive(),
            Rx::Computed(computed) => computed.reactive(),
        }
    }
}

impl<T> From<Signal<T>> for Rx<T> {
    fn from(signal: Signal<T>) -> Self {
        Rx::Signal(signal)
    }
}

impl<T> From<Computed<T>> for Rx<T> {
    fn from(computed: Computed<T>) -> Self {
        Rx::Computed(computed)
    }
}

impl<T> From<&Signal<T>> for Rx<T> {
    fn from(signal: &Signal<T>) -> Self {
        Rx::Signal(signal.clone())
    }
}

impl<T> From<&Computed<T>> for Rx<T> {
    fn from(computed: &Computed<T>) -> Self {
        Rx::Computed(computed.clone())
    }
}

/// Two handles are the same value only if they are the same node.
impl<T: Payload> Change for Rx<T> {
    fn differs(&self, previous: &Self) -> bool {
        self.id() != previous.id()
    }
}

impl<T: Payload> fmt::Debug for Rx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rx::Signal(signal) => fmt::Debug::fmt(signal, f),
            Rx::Computed(computed) => fmt::Debug::fmt(computed, f),
        }
    }
}

/// A plain value or a reference to another reactive node.
pub enum Nested<T> {
    Value(T),
    Rx(Rx<T>),
}

impl<T> Nested<T> {
    /// The referenced node, if this is a reference.
    pub fn rx(&self) -> Option<&Rx<T>> {
        match self {
            Nested::Value(_) => None,
            Nested::Rx(rx) => Some(rx),
        }
    }
}

impl<T: Payload> Nested<T> {
    /// Follow references until a plain value is reached.
    ///
    /// Reading through a reference is a tracked read of the referenced node.
    pub fn resolve(&self) -> Result<T> {
        match self {
            Nested::Value(value) => Ok(value.clone()),
            Nested::Rx(rx) => rx.try_get(),
        }
    }
}

impl<T: Clone> Clone for Nested<T> {
    fn clone(&self) -> Self {
        match self {
            Nested::Value(value) => Nested::Value(value.clone()),
            Nested::Rx(rx) => Nested::Rx(rx.clone()),
        }
    }
}

impl<T> From<T> for Nested<T> {
    fn from(value: T) -> Self {
        Nested::Value(value)
    }
}

impl<T> From<Rx<T>> for Nested<T> {
    fn from(rx: Rx<T>) -> Self {
        Nested::Rx(rx)
    }
}

impl<T> From<Signal<T>> for Nested<T> {
    fn from(signal: Signal<T>) -> Self {
        Nested::Rx(Rx::Signal(signal))
    }
}

impl<T> From<Computed<T>> for Nested<T> {
    fn from(computed: Computed<T>) -> Self {
        Nested::Rx(Rx::Computed(computed))
    }
}

impl<T: Payload> Change for Nested<T> {
    fn differs(&self, previous: &Self) -> bool {
        match (self, previous) {
            (Nested::Value(current), Nested::Value(previous)) => current.differs(previous),
            (Nested::Rx(current), Nested::Rx(previous)) => current.differs(previous),
            _ => true,
        }
    }
}

impl<T: Payload + fmt::Debug> fmt::Debug for Nested<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nested::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Nested::Rx(rx) => f.debug_tuple("Rx").field(rx).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::differs;

    #[test]
    fn references_compare_by_node() {
        let a = Signal::new(1);
        let b = Signal::new(1);

        let first: Nested<i32> = Nested::from(a.clone());
        assert!(!differs(&first, &Nested::from(a.clone())));
        assert!(differs(&first, &Nested::from(b)));
    }

    #[test]
    fn plain_and_reference_always_differ() {
        let a = Signal::new(1);
        let plain: Nested<i32> = Nested::Value(1);
        assert!(differs(&plain, &Nested::from(a)));
    }

    #[test]
    fn resolve_follows_references() {
        let inner = Signal::new(3);
        let outer: Signal<i32> = Signal::new(inner.clone());
        let nested: Nested<i32> = Nested::from(outer);
        assert_eq!(nested.resolve().unwrap(), 3);

        inner.set(4);
        assert_eq!(nested.resolve().unwrap(), 4);
    }

    #[test]
    fn rx_erases_kind() {
        let source = Signal::new(2);
        let doubled = Computed::new({
            let source = source.clone();
            move || source.get() * 2
        });

        let handles: Vec<Rx<i32>> = vec![source.clone().into(), doubled.into()];
        let values: Vec<i32> = handles.iter().map(|rx| rx.get()).collect();
        assert_eq!(values, vec![2, 4]);
        assert_eq!(handles[0].id(), Read::id(&source));
    }
}
