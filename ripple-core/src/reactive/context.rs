//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency discovery: when a node is read while a
//! derived node is evaluating, the read is attributed to that derived node.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Evaluating a derived node pushes a
//! frame holding the node's id and an insertion-ordered set of the nodes read
//! so far. When the producing function returns, the frame is popped and its
//! reads become the node's new dependency set.
//!
//! Frames are pushed and popped by an RAII guard, so the stack is balanced
//! even when a producing function panics.
//!
//! The stack doubles as the cycle detector: a node that is already on the
//! stack cannot be entered again.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::graph::{NodeId, Reactive};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// A read recorded during evaluation, with the version seen at that time.
#[derive(Clone)]
pub(crate) struct TrackedRead {
    pub(crate) source: Arc<dyn Reactive>,
    pub(crate) version: u64,
}

struct ContextEntry {
    /// The evaluating node. `None` for frames opened by [`ReactiveContext::untracked`].
    node: Option<NodeId>,
    reads: IndexMap<NodeId, TrackedRead>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    node: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given node.
    ///
    /// Until the returned guard is dropped, reads on this thread are
    /// attributed to `node`.
    pub fn enter(node: NodeId) -> Self {
        Self::push(Some(node))
    }

    fn push(node: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                node,
                reads: IndexMap::new(),
            });
        });
        Self { node }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_node().is_some()
    }

    /// The node whose evaluation reads are attributed to, if any.
    pub fn current_node() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.node))
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Whether `node` is being evaluated anywhere on this thread's stack.
    pub fn is_evaluating(node: NodeId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|entry| entry.node == Some(node)))
    }

    /// Record a read of `source` against the top frame.
    ///
    /// Reads outside any evaluation, inside an untracked frame, or of the
    /// evaluating node itself are ignored. Only the first read of a node in
    /// one evaluation stamps its version.
    pub(crate) fn track_read(source: Arc<dyn Reactive>, version: u64) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return;
            };
            let id = source.node().id();
            if entry.node.is_none() || entry.node == Some(id) {
                return;
            }
            entry
                .reads
                .entry(id)
                .or_insert(TrackedRead { source, version });
        });
    }

    /// Ids of the nodes read so far in the top frame, in first-read order.
    pub fn dependency_ids() -> Vec<NodeId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.reads.keys().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Take the reads collected by this guard's frame.
    pub(crate) fn take_reads(&self) -> Vec<TrackedRead> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last_mut() {
                Some(entry) => {
                    debug_assert_eq!(entry.node, self.node, "ReactiveContext mismatch");
                    std::mem::take(&mut entry.reads).into_values().collect()
                }
                None => Vec::new(),
            }
        })
    }

    /// Run `f` without attributing its reads to the current evaluation.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _frame = Self::push(None);
        f()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.node, self.node,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.node, entry.node
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::graph::{Node, NodeKind, SyncStore};

    struct Probe {
        node: Node,
    }

    impl Reactive for Probe {
        fn node(&self) -> &Node {
            &self.node
        }

        fn refresh(&self) -> Result<()> {
            Ok(())
        }
    }

    fn probe() -> Arc<dyn Reactive> {
        Arc::new(Probe {
            node: Node::new(NodeKind::Source, Arc::new(SyncStore::new())),
        })
    }

    #[test]
    fn context_tracks_node() {
        let id = NodeId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_node().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_node(), Some(id));
            assert!(ReactiveContext::is_evaluating(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn reads_are_deduplicated_in_first_read_order() {
        let a = probe();
        let b = probe();
        let ctx = ReactiveContext::enter(NodeId::new());

        ReactiveContext::track_read(Arc::clone(&b), 0);
        ReactiveContext::track_read(Arc::clone(&a), 0);
        ReactiveContext::track_read(Arc::clone(&b), 0);

        assert_eq!(
            ReactiveContext::dependency_ids(),
            vec![b.node().id(), a.node().id()]
        );
        assert_eq!(ctx.take_reads().len(), 2);
    }

    #[test]
    fn reads_of_the_evaluating_node_are_ignored() {
        let a = probe();
        let ctx = ReactiveContext::enter(a.node().id());
        ReactiveContext::track_read(Arc::clone(&a), 0);
        assert!(ctx.take_reads().is_empty());
    }

    #[test]
    fn reads_outside_evaluation_are_ignored() {
        ReactiveContext::track_read(probe(), 0);
        assert!(ReactiveContext::dependency_ids().is_empty());
    }

    #[test]
    fn untracked_suspends_tracking() {
        let a = probe();
        let id = NodeId::new();
        let ctx = ReactiveContext::enter(id);

        ReactiveContext::untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::is_evaluating(id));
            ReactiveContext::track_read(Arc::clone(&a), 0);
        });

        assert!(ctx.take_reads().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_node(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_node(), Some(id2));
                assert!(ReactiveContext::is_evaluating(id1));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_node(), Some(id1));
        }

        assert!(ReactiveContext::current_node().is_none());
    }

    #[test]
    fn stack_unwinds_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(NodeId::new());
            panic!("producer failed");
        });
        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
