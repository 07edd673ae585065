//! Observer callbacks for structural changes.
//!
//! A handler sees every change twice. The *pre* callback (`adding`,
//! `changing`, `removing`) fires while the change is being recorded, before
//! the container is touched. The *post* callback (`added`, `changed`,
//! `removed`) fires when the trigger is flushed, after the container has
//! been mutated.
//!
//! For each change the engine first asks the handler for an argument
//! (`create_*_argument`). Returning `None` skips the pre callback for that
//! change; the post callback still fires and receives `None`. The argument
//! carries state from pre to post, and a pre callback failure is attached to
//! it through [`set_pre_error`](EntriesHandler::set_pre_error).
//!
//! Handlers never see the container itself: callbacks run while the
//! container is frozen and exclusively borrowed by the mutation.

use std::collections::BTreeSet;

use crate::error::{BoxError, HandlerError};
use crate::Error;

/// Callbacks for key/value containers.
///
/// # Example
///
/// ```
/// use nexus_txcollections::{BoxError, EntriesHandler, HashEntries};
///
/// #[derive(Default)]
/// struct Log(Vec<String>);
///
/// impl EntriesHandler<&'static str, i32> for Log {
///     type Argument = ();
///
///     fn create_adding_argument(&mut self, _: &&'static str, _: &i32) -> Option<()> { Some(()) }
///     fn create_changing_argument(&mut self, _: &&'static str, _: &i32, _: &&'static str, _: &i32) -> Option<()> { Some(()) }
///     fn create_removing_argument(&mut self, _: &&'static str, _: &i32) -> Option<()> { Some(()) }
///
///     fn added(&mut self, key: &&'static str, value: &i32, _: Option<&mut ()>) -> Result<(), BoxError> {
///         self.0.push(format!("+{key}={value}"));
///         Ok(())
///     }
/// }
///
/// let mut map = HashEntries::<&'static str, i32>::builder().build().unwrap();
/// let mut log = Log::default();
/// map.put_with("a", 1, &mut log).unwrap();
/// assert_eq!(log.0, ["+a=1"]);
/// ```
#[allow(unused_variables)]
pub trait EntriesHandler<K, V> {
    /// State carried from a pre callback to its post callback.
    type Argument;

    /// Creates the argument for an insertion, or `None` to skip `adding`.
    fn create_adding_argument(&mut self, key: &K, value: &V) -> Option<Self::Argument>;

    /// Creates the argument for a replacement, or `None` to skip `changing`.
    fn create_changing_argument(
        &mut self,
        old_key: &K,
        old_value: &V,
        new_key: &K,
        new_value: &V,
    ) -> Option<Self::Argument>;

    /// Creates the argument for a removal, or `None` to skip `removing`.
    fn create_removing_argument(&mut self, key: &K, value: &V) -> Option<Self::Argument>;

    /// Fires before an insertion.
    fn adding(&mut self, key: &K, value: &V, argument: &mut Self::Argument) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after an insertion.
    fn added(&mut self, key: &K, value: &V, argument: Option<&mut Self::Argument>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires before a replacement.
    fn changing(
        &mut self,
        old_key: &K,
        old_value: &V,
        new_key: &K,
        new_value: &V,
        argument: &mut Self::Argument,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after a replacement.
    fn changed(
        &mut self,
        old_key: &K,
        old_value: &V,
        new_key: &K,
        new_value: &V,
        argument: Option<&mut Self::Argument>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires before a removal.
    fn removing(&mut self, key: &K, value: &V, argument: &mut Self::Argument) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after a removal.
    fn removed(&mut self, key: &K, value: &V, argument: Option<&mut Self::Argument>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Receives the failure of this argument's pre callback.
    fn set_pre_error(&mut self, argument: &mut Self::Argument, error: &HandlerError) {}

    /// Receives the outcome of the structural mutation.
    fn set_execution_result(&mut self, error: Option<&Error>) {}
}

/// Callbacks for sequence containers.
///
/// Indices are absolute positions in the root sequence, also when the
/// operation was issued through a sub-list.
#[allow(unused_variables)]
pub trait ElementsHandler<E> {
    /// State carried from a pre callback to its post callback.
    type Argument;

    /// Creates the argument for an insertion, or `None` to skip `adding`.
    fn create_adding_argument(&mut self, index: usize, element: &E) -> Option<Self::Argument>;

    /// Creates the argument for a replacement, or `None` to skip `changing`.
    fn create_changing_argument(
        &mut self,
        old_index: usize,
        new_index: usize,
        old_element: &E,
        new_element: &E,
    ) -> Option<Self::Argument>;

    /// Creates the argument for a removal, or `None` to skip `removing`.
    fn create_removing_argument(&mut self, index: usize, element: &E) -> Option<Self::Argument>;

    /// Fires before an insertion.
    fn adding(&mut self, index: usize, element: &E, argument: &mut Self::Argument) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after an insertion.
    fn added(&mut self, index: usize, element: &E, argument: Option<&mut Self::Argument>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires before a replacement.
    fn changing(
        &mut self,
        old_index: usize,
        new_index: usize,
        old_element: &E,
        new_element: &E,
        argument: &mut Self::Argument,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after a replacement.
    fn changed(
        &mut self,
        old_index: usize,
        new_index: usize,
        old_element: &E,
        new_element: &E,
        argument: Option<&mut Self::Argument>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires before a removal.
    fn removing(&mut self, index: usize, element: &E, argument: &mut Self::Argument) -> Result<(), BoxError> {
        Ok(())
    }

    /// Fires after a removal.
    fn removed(&mut self, index: usize, element: &E, argument: Option<&mut Self::Argument>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Receives the absolute indices of elements about to be removed as
    /// conflicts of the current operation.
    fn set_conflict_abs_indexes(&mut self, conflict_abs_indexes: &BTreeSet<usize>) {}

    /// Receives the failure of this argument's pre callback.
    fn set_pre_error(&mut self, argument: &mut Self::Argument, error: &HandlerError) {}

    /// Receives the outcome of the structural mutation.
    fn set_execution_result(&mut self, error: Option<&Error>) {}
}

/// Observes conflict removal in a sequence so callers holding indices
/// (cursors, sub-lists) can re-base them.
///
/// `resolving` fires before the conflicting elements are removed, with the
/// absolute size and the sorted absolute indices that will disappear. Its
/// return value is handed back to `resolved` after the removal and the
/// structural mutation completed.
pub trait ElementsConflictHandler {
    /// Value passed from `resolving` to `resolved`.
    type Resolving;

    /// Fires before conflicting elements are removed.
    fn resolving(&mut self, abs_size: usize, conflict_abs_indexes: &BTreeSet<usize>) -> Self::Resolving;

    /// Fires once the operation finished structurally.
    fn resolved(&mut self, resolving: Self::Resolving);
}

/// The absent handler.
///
/// Used as the type parameter of `None` handlers; never instantiated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHandler;

impl<K, V> EntriesHandler<K, V> for NoHandler {
    type Argument = ();

    fn create_adding_argument(&mut self, _: &K, _: &V) -> Option<()> {
        None
    }

    fn create_changing_argument(&mut self, _: &K, _: &V, _: &K, _: &V) -> Option<()> {
        None
    }

    fn create_removing_argument(&mut self, _: &K, _: &V) -> Option<()> {
        None
    }
}

impl<E> ElementsHandler<E> for NoHandler {
    type Argument = ();

    fn create_adding_argument(&mut self, _: usize, _: &E) -> Option<()> {
        None
    }

    fn create_changing_argument(&mut self, _: usize, _: usize, _: &E, _: &E) -> Option<()> {
        None
    }

    fn create_removing_argument(&mut self, _: usize, _: &E) -> Option<()> {
        None
    }
}

impl ElementsConflictHandler for NoHandler {
    type Resolving = ();

    fn resolving(&mut self, _: usize, _: &BTreeSet<usize>) {}

    fn resolved(&mut self, _: ()) {}
}
