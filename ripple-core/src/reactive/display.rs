//! Live text rendering of a reactive value.
//!
//! [`display`] renders a node's value onto a [`DisplaySurface`] right away,
//! then again after every write that reaches the node. A surface can be
//! anything that shows text: a terminal line, a log sink, a widget.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::rx::{Payload, Read, Rx};
use super::subscriber::{self, Observer};

/// Somewhere rendered text is shown.
pub trait DisplaySurface: Send + Sync + 'static {
    /// Replace whatever is shown with `text`.
    fn render(&self, text: &str);
}

impl<F> DisplaySurface for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn render(&self, text: &str) {
        self(text)
    }
}

/// Keeps a surface in sync with a reactive value.
///
/// Dropping the last `Arc` stops the updates.
pub struct DisplayObserver<T> {
    source: Rx<T>,
    surface: Box<dyn DisplaySurface>,
    renders: AtomicUsize,
}

impl<T: Payload + fmt::Display> DisplayObserver<T> {
    /// Render the current value now.
    pub fn render(&self) {
        let text = match self.source.try_get_untracked() {
            Ok(value) => value.to_string(),
            Err(err) => {
                warn!(node = %self.source.node().label(), error = %err, "display failed");
                format!("<error: {err}>")
            }
        };
        self.surface.render(&text);
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T> DisplayObserver<T> {
    /// How many times the surface has been rendered to.
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl<T: Payload + fmt::Display> Observer for DisplayObserver<T> {
    fn update(&self) {
        self.render();
    }
}

impl<T: Payload> fmt::Debug for DisplayObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayObserver")
            .field("source", &self.source.id())
            .field("renders", &self.render_count())
            .finish_non_exhaustive()
    }
}

/// Show `source` on `surface`, now and after every change upstream.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use ripple_core::reactive::{display, Signal};
///
/// let count = Signal::new(1);
/// let shown = Arc::new(Mutex::new(String::new()));
///
/// let _view = display(&count, {
///     let shown = shown.clone();
///     move |text: &str| *shown.lock().unwrap() = text.to_string()
/// });
/// assert_eq!(*shown.lock().unwrap(), "1");
///
/// count.set(2);
/// assert_eq!(*shown.lock().unwrap(), "2");
/// ```
pub fn display<T, S>(source: impl Into<Rx<T>>, surface: S) -> Arc<DisplayObserver<T>>
where
    T: Payload + fmt::Display,
    S: DisplaySurface,
{
    let observer = Arc::new(DisplayObserver {
        source: source.into(),
        surface: Box::new(surface),
        renders: AtomicUsize::new(0),
    });
    observer.render();
    subscriber::attach(observer.source.node(), &observer);
    observer
}
