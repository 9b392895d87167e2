//! Dependency Graph
//!
//! This module implements the subscription graph that connects reactive
//! values to the computations that read them.
//!
//! # Overview
//!
//! - Nodes represent source values (signals) or derived values (computeds)
//! - Edges point from a node to its observers: if B reads A, A's observer
//!   set holds a weak reference to B
//!
//! When a signal changes, the store walks these edges and marks every node
//! downstream as dirty. Dirty nodes recompute lazily, the next time somebody
//! reads them, and only if one of their inputs actually changed version.
//!
//! # Design Decisions
//!
//! 1. The graph is intrusive rather than centralised. Each node carries its
//!    own observer set and dirty marker, so there is no global table to clean
//!    up when a node is dropped.
//!
//! 2. Observer edges are weak. Nothing downstream is kept alive by being
//!    subscribed; a computed that nobody holds simply disappears.
//!
//! 3. Forward edges (dependencies) live on the derived node itself, together
//!    with the version stamp observed when each one was read.

mod node;
mod store;

pub use node::{Node, NodeId, NodeKind, NodeLabel, NodeState, Reactive};
pub use store::{
    Live, LockedStore, ObserverKey, ObserverSet, Store, StoreKind, Subscription, SyncStore,
};
