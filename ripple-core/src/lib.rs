//! Ripple Core
//!
//! This crate provides the runtime for Ripple, a fine-grained reactive
//! dataflow library. It implements:
//!
//! - Source nodes (signals) and cached derived nodes (computeds)
//! - Automatic, dynamic dependency discovery
//! - Lazy, glitch-free re-evaluation with version-based skipping
//! - Eager consumers (effects, subscribers and display adapters)
//! - Instrumentation plugins
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: node state, observer sets and the stores that propagate
//!   invalidation through them
//! - `reactive`: the user-facing primitives built on the graph
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Computed, Effect, Signal};
//!
//! // Create a signal
//! let count = Signal::new(1);
//!
//! // Create a derived value
//! let doubled = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let _log = Effect::new({
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     move || println!("count: {}, doubled: {}", count.get(), doubled.get())
//! });
//!
//! // Update the signal; the effect prints "count: 5, doubled: 10"
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{BoxError, Error, Result};
