//! Reactive Primitives
//!
//! This module implements the reactive system on top of the dependency graph:
//! signals, computeds and effects, plus the pieces that make them pleasant to
//! use.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal holds a value. Reading it while a computed evaluates records it
//! as a dependency of that computed; writing a new value dirties everything
//! downstream. A signal may also forward another signal or computed.
//!
//! ## Computeds
//!
//! A Computed caches the result of a producing function. It is lazy: a write
//! upstream only marks it dirty, and it recomputes on the next read if, and
//! only if, the version of something it read last time has moved. Its
//! dependencies are rediscovered on every evaluation, so branches that are
//! not taken are not depended on.
//!
//! ## Effects
//!
//! An Effect is a computed with no value that is pulled eagerly after every
//! write that reaches it. Use effects to push state to the outside world.
//!
//! # Implementation Notes
//!
//! Dependency discovery uses a thread-local stack of evaluation frames (see
//! [`ReactiveContext`]). Nodes hold their observers weakly, so dropping the
//! last handle to a computed or effect removes it from the graph.
//!
//! Whether a write is a change is decided by the [`Change`] oracle. It
//! treats `NaN` as equal to itself, functions as never equal, and a panicking
//! comparison as a change.

mod change;
mod computed;
mod context;
mod display;
mod effect;
mod ops;
mod plugin;
mod resolve;
mod runtime;
mod rx;
mod signal;
mod subscriber;
mod value;

pub use change::{differs, Change, Hashed};
pub use computed::{computed, Computed};
pub use context::ReactiveContext;
pub use display::{display, DisplayObserver, DisplaySurface};
pub use effect::Effect;
pub use ops::{select, IntoOperand, RxExt};
pub use plugin::{Plugin, TracingPlugin};
pub use resolve::{Plain, Resolve};
pub use runtime::{PluginHandle, Runtime, RuntimeConfig};
pub use rx::{Nested, Payload, Read, Rx};
pub use signal::{Override, Signal};
pub use subscriber::{Observer, Subscriber};
pub use value::{Func, Value, ValueKind};
