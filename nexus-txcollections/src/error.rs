//! Error types.

use std::sync::Arc;

/// Error type returned by handler callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A captured handler failure.
///
/// Shared so the same failure can be attached to a record's argument and
/// kept as the trigger's final error.
pub type HandlerError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by containers, triggers and attach processors.
///
/// Everything except [`Error::Handler`] is a usage or consistency error and
/// is raised synchronously at the call that caused it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A new trigger was requested while a handler callback was running.
    #[error("cannot start a mutation because the container is frozen")]
    Frozen,

    /// `unfreeze` was called on a container with a zero freeze count.
    #[error("cannot unfreeze a container that is not frozen")]
    NotFrozen,

    /// A state machine operation was invoked in the wrong state.
    #[error("{machine}::{operation} requires state {expected}, but the current state is {actual}")]
    InvalidState {
        /// `"Trigger"` or `"AttachProcessor"`.
        machine: &'static str,
        /// The operation that was attempted.
        operation: &'static str,
        /// The state(s) the operation accepts.
        expected: &'static str,
        /// The state the machine was in.
        actual: &'static str,
    },

    /// An index was outside the visible window of a sequence.
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Offending index.
        index: usize,
        /// Visible length.
        len: usize,
    },

    /// A sub-list window does not fit the parent sequence.
    #[error("invalid window: head hide {head_hide} and tail hide {tail_hide} exceed size {size}")]
    InvalidWindow {
        /// Leading hidden elements.
        head_hide: usize,
        /// Trailing hidden elements.
        tail_hide: usize,
        /// Absolute size of the parent.
        size: usize,
    },

    /// A key is outside the bounds of a navigable view.
    #[error("key is out of the range {range}")]
    KeyOutOfRange {
        /// Display form of the violated range.
        range: String,
    },

    /// Range bounds are inconsistent.
    #[error("illegal range: {0}")]
    IllegalRange(&'static str),

    /// A validator rejected a key, value or element.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A manual conflict was supplied to a bidirectional container.
    #[error("manual conflicts cannot be used with bidirectional containers")]
    ManualConflictWithBidi,

    /// An internal invariant was found broken while resolving conflicts.
    #[error("illegal algorithm: {0}")]
    IllegalAlgorithm(&'static str),

    /// A cursor observed a structural change it did not make.
    #[error("container was structurally modified outside this cursor")]
    ConcurrentModification,

    /// A cursor or view had no element where one was required.
    #[error("no such element")]
    NoSuchElement,

    /// Builder configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The container's configuration does not allow the operation.
    #[error("{0} is not supported by this container")]
    Unsupported(&'static str),

    /// A handler callback failed. Delivery to every other record completed
    /// before this error was returned.
    #[error("handler callback failed: {0}")]
    Handler(HandlerError),
}

impl Error {
    /// Wraps a callback failure.
    pub fn handler(err: BoxError) -> Self {
        Error::Handler(Arc::from(err))
    }

    /// Returns the handler failure, if this error carries one.
    pub fn as_handler(&self) -> Option<&HandlerError> {
        match self {
            Error::Handler(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn invalid_state(
        machine: &'static str,
        operation: &'static str,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Error::InvalidState {
            machine,
            operation,
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = Error::IndexOutOfBounds { index: 5, len: 3 };
        assert_eq!(err.to_string(), "index 5 is out of bounds for length 3");

        let err = Error::invalid_state("Trigger", "flush", "Executed", "New");
        assert_eq!(
            err.to_string(),
            "Trigger::flush requires state Executed, but the current state is New"
        );
    }

    #[test]
    fn handler_error_is_shared() {
        let err = Error::handler("boom".into());
        let clone = err.clone();
        let (Some(a), Some(b)) = (err.as_handler(), clone.as_handler()) else {
            panic!("expected handler errors");
        };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(clone.to_string(), "handler callback failed: boom");
    }
}
