//! Reactive Runtime
//!
//! The runtime holds the process-wide pieces of the reactive system: the
//! default store new nodes attach to, and the registry of instrumentation
//! plugins.
//!
//! # How It Works
//!
//! 1. `Runtime::configure` may be called once, early, to pick the default
//!    store. Without it, nodes attach to a [`SyncStore`].
//!
//! 2. Every node captures the default store when it is created. A node can
//!    be pointed at a different store with `with_store`; nodes sharing a graph
//!    must share a store.
//!
//! 3. Nodes report lifecycle events (created, read, updated, named) to the
//!    runtime, which forwards them to every registered [`Plugin`]. With no
//!    plugins registered this is a single emptiness check.
//!
//! # Thread Safety
//!
//! Both the default store and the plugin registry are global and safe to use
//! from any thread. The evaluation stack is thread-local and lives in
//! [`ReactiveContext`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use super::context::ReactiveContext;
use super::plugin::Plugin;
use crate::graph::{Node, NodeId, Store, StoreKind, SyncStore};

/// Process-wide runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Store new nodes attach to.
    pub store: StoreKind,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Handle to a registered plugin.
///
/// Dropping this handle unregisters the plugin.
#[must_use = "the plugin is unregistered when the handle is dropped"]
pub struct PluginHandle {
    id: u64,
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        Runtime::unregister_plugin(self.id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

static DEFAULT_STORE: OnceLock<Arc<dyn Store>> = OnceLock::new();
static PLUGINS: OnceLock<DashMap<u64, Arc<dyn Plugin>>> = OnceLock::new();

fn plugins() -> &'static DashMap<u64, Arc<dyn Plugin>> {
    PLUGINS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Install the process default store.
    ///
    /// Returns `false` if a default store was already in place, either from
    /// an earlier call or because a node was created first.
    pub fn configure(config: RuntimeConfig) -> bool {
        let installed = DEFAULT_STORE.set(config.store.build()).is_ok();
        if installed {
            debug!(store = ?config.store, "configured default store");
        }
        installed
    }

    /// The store new nodes attach to.
    pub fn store() -> Arc<dyn Store> {
        Arc::clone(DEFAULT_STORE.get_or_init(|| Arc::new(SyncStore::new())))
    }

    /// Register a plugin.
    ///
    /// Returns a handle that unregisters the plugin when dropped.
    pub fn register_plugin(plugin: Arc<dyn Plugin>) -> PluginHandle {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let id = NEXT.fetch_add(1, Ordering::Relaxed);
        plugins().insert(id, plugin);
        debug!(plugin = id, "registered plugin");
        PluginHandle { id }
    }

    fn unregister_plugin(id: u64) {
        if plugins().remove(&id).is_some() {
            debug!(plugin = id, "unregistered plugin");
        }
    }

    /// Number of registered plugins.
    pub fn plugin_count() -> usize {
        plugins().len()
    }

    /// Get the node currently being evaluated on this thread, if any.
    pub fn current_node() -> Option<NodeId> {
        ReactiveContext::current_node()
    }

    /// Check if reads on this thread are currently tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    pub(crate) fn emit_created(node: &Node) {
        Self::emit(|plugin| plugin.created(node));
    }

    pub(crate) fn emit_read(node: &Node) {
        Self::emit(|plugin| plugin.read(node));
    }

    pub(crate) fn emit_updated(node: &Node) {
        Self::emit(|plugin| plugin.updated(node));
    }

    pub(crate) fn emit_named(node: &Node) {
        Self::emit(|plugin| plugin.named(node));
    }

    fn emit(hook: impl Fn(&dyn Plugin)) {
        let registry = plugins();
        if registry.is_empty() {
            return;
        }
        // Snapshot first: plugins may create or read nodes themselves.
        let snapshot: Vec<Arc<dyn Plugin>> = registry
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for plugin in snapshot {
            hook(plugin.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use std::sync::atomic::AtomicI32;

    struct CountingPlugin {
        watched: NodeId,
        created: AtomicI32,
        updated: AtomicI32,
    }

    impl Plugin for CountingPlugin {
        fn created(&self, node: &Node) {
            if node.id() == self.watched {
                self.created.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn updated(&self, node: &Node) {
            if node.id() == self.watched {
                self.updated.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn config_defaults_to_sync_store() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config.store, StoreKind::Sync);

        let config = RuntimeConfig::from_json(r#"{"store": "locked"}"#).unwrap();
        assert_eq!(config.store, StoreKind::Locked);

        assert!(RuntimeConfig::from_json(r#"{"store": "sharded"}"#).is_err());
    }

    #[test]
    fn configure_only_succeeds_once() {
        // Whatever ran first already fixed the default; a second call never wins.
        let _ = Runtime::store();
        assert!(!Runtime::configure(RuntimeConfig::default()));
    }

    #[test]
    fn plugins_receive_events_until_handle_drops() {
        let node = Node::new(NodeKind::Source, Runtime::store());
        let plugin = Arc::new(CountingPlugin {
            watched: node.id(),
            created: AtomicI32::new(0),
            updated: AtomicI32::new(0),
        });

        let handle = Runtime::register_plugin(plugin.clone());
        Runtime::emit_created(&node);
        Runtime::emit_updated(&node);
        Runtime::emit_updated(&node);
        assert_eq!(plugin.created.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.updated.load(Ordering::SeqCst), 2);

        drop(handle);
        Runtime::emit_updated(&node);
        assert_eq!(plugin.updated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runtime_reports_tracking_state() {
        assert!(!Runtime::is_tracking());
        let id = NodeId::new();
        let _ctx = ReactiveContext::enter(id);
        assert!(Runtime::is_tracking());
        assert_eq!(Runtime::current_node(), Some(id));
    }
}
