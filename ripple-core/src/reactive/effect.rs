//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever something
//! it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to discover its
//!    dependencies.
//!
//! 2. Internally the function runs as the producing function of a
//!    `Computed<()>`, so dependency discovery, reconciliation and the version
//!    skip all work exactly as they do for computeds.
//!
//! 3. The effect also subscribes itself to that computed as a greedy
//!    observer. A write upstream dirties the computed; once propagation has
//!    finished marking, the effect pulls the computed, which re-runs the
//!    function only if an input actually changed.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when
//!   a dependency changes).
//! - A failing effect cannot hand its error to a reader, so it is logged.
//!
//! # Cleanup
//!
//! Effects can optionally return a cleanup function. It is called before the
//! effect re-runs and when the effect is disposed or dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::computed::Computed;
use super::runtime::Runtime;
use super::subscriber::Observer;
use crate::error::BoxError;
use crate::graph::{NodeId, NodeKind};

type Cleanup = Box<dyn FnOnce() + Send>;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use ripple_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let _effect = Effect::new({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.lock().unwrap().push(count.get())
/// });
///
/// count.set(5);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    computed: Computed<()>,
    disposed: AtomicBool,
    runs: Arc<AtomicUsize>,
    cleanup: Arc<Mutex<Option<Cleanup>>>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.inner.run();
        effect
    }

    /// Create a new effect whose function returns a cleanup closure.
    ///
    /// The cleanup from one run is called right before the next run, and
    /// when the effect is disposed.
    pub fn with_cleanup<F, C>(run: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        let effect = Self::build(move || Some(Box::new(run()) as Cleanup));
        effect.inner.run();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies, and so never runs, until [`Effect::execute`]
    /// is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(move || {
            run();
            None
        })
    }

    fn build<F>(body: F) -> Self
    where
        F: Fn() -> Option<Cleanup> + Send + Sync + 'static,
    {
        let runs = Arc::new(AtomicUsize::new(0));
        let cleanup: Arc<Mutex<Option<Cleanup>>> = Arc::new(Mutex::new(None));

        let computed = Computed::build(NodeKind::Effect, Runtime::store(), {
            let runs = Arc::clone(&runs);
            let cleanup = Arc::clone(&cleanup);
            Box::new(move || {
                let previous = cleanup.lock().take();
                if let Some(previous) = previous {
                    previous();
                }
                let next = body();
                *cleanup.lock() = next;
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            })
        });

        let inner = Arc::new(EffectInner {
            computed,
            disposed: AtomicBool::new(false),
            runs,
            cleanup,
        });
        inner.computed.subscribe(&inner);

        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.computed.id()
    }

    /// Run the effect function now, whether or not anything changed.
    pub fn execute(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.computed.invalidate();
        self.inner.run();
    }

    /// Dispose of the effect.
    ///
    /// Runs the pending cleanup, if any. After disposal, the effect will not
    /// run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies found on the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.computed.dependency_ids().len()
    }
}

impl EffectInner {
    fn run(&self) {
        if let Err(err) = self.computed.refresh() {
            warn!(effect = %self.computed.id(), error = %err, "effect failed");
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pending = self.cleanup.lock().take();
        if let Some(cleanup) = pending {
            cleanup();
        }
    }
}

impl Observer for EffectInner {
    fn update(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.run();
        }
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_only_when_input_changes() {
        let source = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let effect = Effect::new({
            let (source, seen) = (source.clone(), seen.clone());
            move || seen.lock().push(source.get())
        });

        source.set(2);
        source.set(2);
        source.set(3);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(effect.run_count(), 3);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let source = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new({
            let source = source.clone();
            move || {
                source.get();
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        source.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        effect.execute();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let source = Signal::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));

        let effect = Effect::with_cleanup({
            let (source, log) = (source.clone(), log.clone());
            move || {
                let value = source.get();
                log.lock().push(format!("run {value}"));
                let log = log.clone();
                move || log.lock().push(format!("cleanup {value}"))
            }
        });

        source.set(1);
        effect.dispose();

        assert_eq!(
            *log.lock(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn dropping_effect_stops_it() {
        let source = Signal::new(0);
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new({
            let source = source.clone();
            move || {
                source.get();
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(source.observer_count(), 1);

        drop(effect);
        assert_eq!(source.observer_count(), 0);
        source.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effects_may_write_other_signals() {
        let input = Signal::new(1);
        let mirrored = Signal::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _copy = Effect::new({
            let (input, mirrored) = (input.clone(), mirrored.clone());
            move || mirrored.set(input.get() * 10)
        });
        let _watch = Effect::new({
            let (mirrored, seen) = (mirrored.clone(), seen.clone());
            move || seen.lock().push(mirrored.get())
        });

        input.set(2);
        assert_eq!(*seen.lock(), vec![10, 20]);
    }

    #[test]
    fn diamond_runs_effect_once_per_write() {
        let root = Signal::new(1);
        let left = Computed::new({
            let root = root.clone();
            move || root.get() + 1
        });
        let right = Computed::new({
            let root = root.clone();
            move || root.get() * 2
        });
        let seen = Arc::new(Mutex::new(Vec::new()));

        let effect = Effect::new({
            let (left, right, seen) = (left.clone(), right.clone(), seen.clone());
            move || seen.lock().push((left.get(), right.get()))
        });

        root.set(5);
        assert_eq!(*seen.lock(), vec![(2, 2), (6, 10)]);
        assert_eq!(effect.dependency_count(), 2);
    }

    #[test]
    fn disposing_a_clone_stops_every_handle() {
        let source = Signal::new(0);
        let first = Effect::new({
            let source = source.clone();
            move || {
                source.get();
            }
        });
        let second = first.clone();
        assert_eq!(first.id(), second.id());

        second.dispose();
        source.set(1);
        first.execute();

        assert!(first.is_disposed());
        assert_eq!(first.run_count(), 1);
    }
}
