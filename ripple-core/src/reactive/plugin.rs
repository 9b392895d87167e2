//! Instrumentation hooks.
//!
//! A [`Plugin`] is told about node lifecycle events. Every hook has a no-op
//! default, so a plugin only implements what it cares about. Register one
//! with [`Runtime::register_plugin`](super::Runtime::register_plugin).

use tracing::{debug, trace};

use crate::graph::Node;

/// Receives node lifecycle events.
pub trait Plugin: Send + Sync + 'static {
    /// A node was created.
    fn created(&self, _node: &Node) {}

    /// A node's value was read through a public accessor.
    fn read(&self, _node: &Node) {}

    /// A node committed a new value.
    fn updated(&self, _node: &Node) {}

    /// A node was given a name.
    fn named(&self, _node: &Node) {}
}

/// Forwards every event to `tracing`.
///
/// Creation, update and naming are logged at `debug`, reads at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPlugin;

impl Plugin for TracingPlugin {
    fn created(&self, node: &Node) {
        debug!(node = %node.label(), "created");
    }

    fn read(&self, node: &Node) {
        trace!(node = %node.label(), version = node.version(), "read");
    }

    fn updated(&self, node: &Node) {
        debug!(node = %node.label(), version = node.version(), "updated");
    }

    fn named(&self, node: &Node) {
        debug!(node = %node.label(), "named");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, SyncStore};
    use std::sync::Arc;

    struct Silent;
    impl Plugin for Silent {}

    #[test]
    fn hooks_default_to_no_ops() {
        let node = Node::new(NodeKind::Source, Arc::new(SyncStore::new()));
        let plugins: [&dyn Plugin; 2] = [&Silent, &TracingPlugin];
        for plugin in plugins {
            plugin.created(&node);
            plugin.read(&node);
            plugin.updated(&node);
            plugin.named(&node);
        }
    }
}
