//! Error types for the reactive runtime.
//!
//! Every failure is surfaced synchronously to whoever asked for a value. The
//! runtime never retries on its own.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::NodeLabel;

/// Boxed error returned by fallible producing functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or evaluating reactive nodes.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A derived node's producing function read the node's own value,
    /// directly or through other nodes, while it was being evaluated.
    #[error("reentrant evaluation of {node}")]
    ReentrantEvaluation { node: NodeLabel },

    /// The producing function of a derived node failed. Nothing was
    /// committed and the node is still dirty.
    #[error("producing function of {node} failed: {source}")]
    Producer {
        node: NodeLabel,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The function-call convenience was used on a node whose resolved
    /// value is not a function.
    #[error("value of {node} is not callable")]
    NotCallable { node: NodeLabel },
}

impl Error {
    /// Wrap a producer failure for `node`.
    ///
    /// Errors that already are runtime errors (for example a reentrant read
    /// bubbling up through a `?`) are passed through untouched so callers
    /// can match on the original variant.
    pub(crate) fn producer(node: NodeLabel, err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => Error::Producer {
                node,
                source: Arc::from(other),
            },
        }
    }

    /// Label of the node that raised this error.
    pub fn node(&self) -> &NodeLabel {
        match self {
            Error::ReentrantEvaluation { node }
            | Error::Producer { node, .. }
            | Error::NotCallable { node } => node,
        }
    }
}
