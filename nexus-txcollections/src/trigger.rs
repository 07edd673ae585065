//! Two-phase change transcripts.
//!
//! A [`Trigger`] collects the changes of one logical operation, notifies a
//! handler before each change is applied, and delivers the post callbacks
//! when flushed:
//!
//! ```text
//!   New ──pre_*──▶ New ──begin_execute──▶ Executing ──end_execute──▶ Executed ──flush──▶ Flushed
//!                   │                                                   ▲
//!                   └──────── begin_execute with a pending error ───────┘
//! ```
//!
//! Handler failures never interrupt delivery. The first failure (from a pre
//! callback, the structural mutation or a post callback) becomes the final
//! error and is returned by the flush that delivers the last record.
//!
//! The same machine serves key/value and sequence containers; the record
//! shape is the type parameter ([`EntryChange`] or [`ElementChange`]).

use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::{BoxError, HandlerError};
use crate::handler::{ElementsHandler, EntriesHandler};
use crate::{EntryId, Error, Result};

// =============================================================================
// Freeze
// =============================================================================

/// Reentrancy guard counter.
///
/// While the count is non-zero no new trigger can be created, so a handler
/// callback cannot start an independent mutation in the middle of another
/// one. This is not a lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Freeze {
    count: u32,
}

impl Freeze {
    /// Increments the count.
    #[inline]
    pub fn freeze(&mut self) {
        self.count += 1;
    }

    /// Decrements the count.
    ///
    /// # Errors
    ///
    /// [`Error::NotFrozen`] if the count is already zero.
    #[inline]
    pub fn unfreeze(&mut self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::NotFrozen);
        }
        self.count -= 1;
        Ok(())
    }

    /// Returns `true` if the count is non-zero.
    #[inline]
    pub const fn is_frozen(&self) -> bool {
        self.count != 0
    }

    /// Fails with [`Error::Frozen`] while frozen.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_frozen() { Err(Error::Frozen) } else { Ok(()) }
    }

    /// Runs `f` frozen. The count is restored even if `f` unwinds.
    #[inline]
    pub(crate) fn run<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.count += 1;
        let _thaw = Thaw(self);
        f()
    }
}

/// Drops one freeze level.
struct Thaw<'a>(&'a mut Freeze);

impl Drop for Thaw<'_> {
    #[inline]
    fn drop(&mut self) {
        self.0.count -= 1;
    }
}

// =============================================================================
// Records
// =============================================================================

/// Kind of a recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modification {
    /// Insertion; there is no old state.
    Attach,
    /// Removal; there is no new state.
    Detach,
    /// Replacement; both states are present.
    Replace,
}

/// A recorded change.
pub trait Change {
    /// Kind of this change.
    fn modification(&self) -> Modification;
}

/// Dispatches a record shape to the matching handler callbacks.
pub trait Notify<H: ?Sized>: Change {
    /// The handler's argument type.
    type Argument;

    /// Asks the handler for this change's argument.
    fn create_argument(&self, handler: &mut H) -> Option<Self::Argument>;

    /// Invokes the pre callback.
    fn pre(&self, handler: &mut H, argument: &mut Self::Argument) -> core::result::Result<(), BoxError>;

    /// Invokes the post callback.
    fn post(&self, handler: &mut H, argument: Option<&mut Self::Argument>) -> core::result::Result<(), BoxError>;

    /// Attaches a pre callback failure to the argument.
    fn set_pre_error(handler: &mut H, argument: &mut Self::Argument, error: &HandlerError);

    /// Reports the structural outcome.
    fn set_execution_result(handler: &mut H, error: Option<&Error>);
}

/// A change to a key/value container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange<K, V> {
    entry: Option<EntryId>,
    old: Option<(K, V)>,
    new: Option<(K, V)>,
}

impl<K, V> EntryChange<K, V> {
    /// An insertion of `key`/`value`.
    pub fn attach(key: K, value: V) -> Self {
        Self {
            entry: None,
            old: None,
            new: Some((key, value)),
        }
    }

    /// A replacement on the existing `entry`.
    pub fn replace(entry: EntryId, old: (K, V), new: (K, V)) -> Self {
        Self {
            entry: Some(entry),
            old: Some(old),
            new: Some(new),
        }
    }

    /// A removal of the existing `entry`.
    pub fn detach(entry: EntryId, old: (K, V)) -> Self {
        Self {
            entry: Some(entry),
            old: Some(old),
            new: None,
        }
    }

    /// The existing entry, for replacements and removals.
    #[inline]
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Key before the change.
    #[inline]
    pub fn old_key(&self) -> Option<&K> {
        self.old.as_ref().map(|(k, _)| k)
    }

    /// Value before the change.
    #[inline]
    pub fn old_value(&self) -> Option<&V> {
        self.old.as_ref().map(|(_, v)| v)
    }

    /// Key after the change.
    #[inline]
    pub fn new_key(&self) -> Option<&K> {
        self.new.as_ref().map(|(k, _)| k)
    }

    /// Value after the change.
    #[inline]
    pub fn new_value(&self) -> Option<&V> {
        self.new.as_ref().map(|(_, v)| v)
    }
}

impl<K, V> Change for EntryChange<K, V> {
    fn modification(&self) -> Modification {
        match (&self.old, &self.new) {
            (None, _) => Modification::Attach,
            (Some(_), None) => Modification::Detach,
            (Some(_), Some(_)) => Modification::Replace,
        }
    }
}

impl<K, V, H: EntriesHandler<K, V> + ?Sized> Notify<H> for EntryChange<K, V> {
    type Argument = H::Argument;

    fn create_argument(&self, handler: &mut H) -> Option<H::Argument> {
        match (&self.old, &self.new) {
            (None, Some((k, v))) => handler.create_adding_argument(k, v),
            (Some((ok, ov)), Some((nk, nv))) => handler.create_changing_argument(ok, ov, nk, nv),
            (Some((k, v)), None) => handler.create_removing_argument(k, v),
            (None, None) => None,
        }
    }

    fn pre(&self, handler: &mut H, argument: &mut H::Argument) -> core::result::Result<(), BoxError> {
        match (&self.old, &self.new) {
            (None, Some((k, v))) => handler.adding(k, v, argument),
            (Some((ok, ov)), Some((nk, nv))) => handler.changing(ok, ov, nk, nv, argument),
            (Some((k, v)), None) => handler.removing(k, v, argument),
            (None, None) => Ok(()),
        }
    }

    fn post(&self, handler: &mut H, argument: Option<&mut H::Argument>) -> core::result::Result<(), BoxError> {
        match (&self.old, &self.new) {
            (None, Some((k, v))) => handler.added(k, v, argument),
            (Some((ok, ov)), Some((nk, nv))) => handler.changed(ok, ov, nk, nv, argument),
            (Some((k, v)), None) => handler.removed(k, v, argument),
            (None, None) => Ok(()),
        }
    }

    fn set_pre_error(handler: &mut H, argument: &mut H::Argument, error: &HandlerError) {
        handler.set_pre_error(argument, error);
    }

    fn set_execution_result(handler: &mut H, error: Option<&Error>) {
        handler.set_execution_result(error);
    }
}

/// A change to a sequence container.
///
/// Indices are relative to the window the change was issued through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementChange<E> {
    old: Option<(usize, E)>,
    new: Option<(usize, E)>,
}

impl<E> ElementChange<E> {
    /// An insertion at `index`.
    pub fn attach(index: usize, element: E) -> Self {
        Self {
            old: None,
            new: Some((index, element)),
        }
    }

    /// A replacement moving `old` to `new`.
    pub fn replace(old: (usize, E), new: (usize, E)) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    /// A removal at `index`.
    pub fn detach(index: usize, element: E) -> Self {
        Self {
            old: Some((index, element)),
            new: None,
        }
    }

    /// Index before the change.
    #[inline]
    pub fn old_index(&self) -> Option<usize> {
        self.old.as_ref().map(|(i, _)| *i)
    }

    /// Element before the change.
    #[inline]
    pub fn old_element(&self) -> Option<&E> {
        self.old.as_ref().map(|(_, e)| e)
    }

    /// Index after the change.
    #[inline]
    pub fn new_index(&self) -> Option<usize> {
        self.new.as_ref().map(|(i, _)| *i)
    }

    /// Element after the change.
    #[inline]
    pub fn new_element(&self) -> Option<&E> {
        self.new.as_ref().map(|(_, e)| e)
    }
}

impl<E> Change for ElementChange<E> {
    fn modification(&self) -> Modification {
        match (&self.old, &self.new) {
            (None, _) => Modification::Attach,
            (Some(_), None) => Modification::Detach,
            (Some(_), Some(_)) => Modification::Replace,
        }
    }
}

impl<E, H: ElementsHandler<E> + ?Sized> Notify<H> for ElementChange<E> {
    type Argument = H::Argument;

    fn create_argument(&self, handler: &mut H) -> Option<H::Argument> {
        match (&self.old, &self.new) {
            (None, Some((i, e))) => handler.create_adding_argument(*i, e),
            (Some((oi, oe)), Some((ni, ne))) => handler.create_changing_argument(*oi, *ni, oe, ne),
            (Some((i, e)), None) => handler.create_removing_argument(*i, e),
            (None, None) => None,
        }
    }

    fn pre(&self, handler: &mut H, argument: &mut H::Argument) -> core::result::Result<(), BoxError> {
        match (&self.old, &self.new) {
            (None, Some((i, e))) => handler.adding(*i, e, argument),
            (Some((oi, oe)), Some((ni, ne))) => handler.changing(*oi, *ni, oe, ne, argument),
            (Some((i, e)), None) => handler.removing(*i, e, argument),
            (None, None) => Ok(()),
        }
    }

    fn post(&self, handler: &mut H, argument: Option<&mut H::Argument>) -> core::result::Result<(), BoxError> {
        match (&self.old, &self.new) {
            (None, Some((i, e))) => handler.added(*i, e, argument),
            (Some((oi, oe)), Some((ni, ne))) => handler.changed(*oi, *ni, oe, ne, argument),
            (Some((i, e)), None) => handler.removed(*i, e, argument),
            (None, None) => Ok(()),
        }
    }

    fn set_pre_error(handler: &mut H, argument: &mut H::Argument, error: &HandlerError) {
        handler.set_pre_error(argument, error);
    }

    fn set_execution_result(handler: &mut H, error: Option<&Error>) {
        handler.set_execution_result(error);
    }
}

// =============================================================================
// History
// =============================================================================

/// Read-only view over a trigger's records, starting at an offset.
#[derive(Debug)]
pub struct History<'a, C> {
    records: &'a [C],
    offset: usize,
}

impl<C> Clone for History<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for History<'_, C> {}

impl<'a, C: Change> History<'a, C> {
    /// Offset of the first visible record in the full transcript.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of visible records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are visible.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record at `index`, relative to the offset.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a C> {
        self.records.get(index)
    }

    /// Kind of the record at `index`.
    #[inline]
    pub fn modification(&self, index: usize) -> Option<Modification> {
        self.records.get(index).map(Change::modification)
    }

    /// Iterates the visible records.
    pub fn iter(&self) -> core::slice::Iter<'a, C> {
        self.records.iter()
    }
}

// =============================================================================
// Trigger
// =============================================================================

/// Trigger lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TriggerState {
    /// Recording changes.
    New,
    /// The structural mutation is running.
    Executing,
    /// The mutation finished (or was skipped).
    Executed,
    /// At least one flush ran.
    Flushed,
}

impl TriggerState {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            TriggerState::New => "New",
            TriggerState::Executing => "Executing",
            TriggerState::Executed => "Executed",
            TriggerState::Flushed => "Flushed",
        }
    }
}

/// Per-operation transcript with deferred, fail-safe delivery.
///
/// Created by containers when a handler is supplied; holds the handler for
/// the duration of one logical operation.
pub struct Trigger<'h, C, H: ?Sized>
where
    C: Notify<H>,
{
    handler: &'h mut H,
    changes: Vec<C>,
    arguments: Vec<Option<C::Argument>>,
    flushed_len: usize,
    final_error: Option<Error>,
    error_reported: bool,
    state: TriggerState,
}

impl<'h, C, H: ?Sized> Trigger<'h, C, H>
where
    C: Notify<H>,
{
    /// Starts a transcript for `handler`.
    ///
    /// # Errors
    ///
    /// [`Error::Frozen`] while the owning container is frozen.
    pub fn new(handler: &'h mut H, freeze: &Freeze) -> Result<Self> {
        Self::with_capacity(handler, freeze, 0)
    }

    /// Starts a transcript with room for `capacity` records.
    pub fn with_capacity(handler: &'h mut H, freeze: &Freeze, capacity: usize) -> Result<Self> {
        freeze.check()?;
        Ok(Self {
            handler,
            changes: Vec::with_capacity(capacity),
            arguments: Vec::with_capacity(capacity),
            flushed_len: 0,
            final_error: None,
            error_reported: false,
            state: TriggerState::New,
        })
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Number of recorded changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of records whose post callback was delivered.
    #[inline]
    pub fn flushed_len(&self) -> usize {
        self.flushed_len
    }

    /// The first failure captured so far.
    #[inline]
    pub fn final_error(&self) -> Option<&Error> {
        self.final_error.as_ref()
    }

    /// Records visible from `offset` on.
    pub fn history(&self, offset: usize) -> History<'_, C> {
        let offset = offset.min(self.changes.len());
        History {
            records: &self.changes[offset..],
            offset,
        }
    }

    /// Appends a change and runs its pre callback under `freeze`.
    ///
    /// A failing pre callback does not stop recording; its error becomes
    /// the final error (if none is pending) and is attached to the record's
    /// argument.
    pub fn record(&mut self, freeze: &mut Freeze, change: C) -> Result<()> {
        if self.state != TriggerState::New {
            return Err(Error::invalid_state(
                "Trigger",
                "record",
                "New",
                self.state.name(),
            ));
        }
        let handler = &mut *self.handler;
        let final_error = &mut self.final_error;
        let argument = freeze.run(|| {
            let mut argument = change.create_argument(handler)?;
            if let Err(err) = change.pre(handler, &mut argument) {
                let err: HandlerError = Arc::from(err);
                trace!(error = %err, "pre callback failed");
                if final_error.is_none() {
                    *final_error = Some(Error::Handler(Arc::clone(&err)));
                }
                C::set_pre_error(handler, &mut argument, &err);
            }
            Some(argument)
        });
        self.changes.push(change);
        self.arguments.push(argument);
        Ok(())
    }

    /// Moves to `Executing`, or straight to `Executed` if a failure is
    /// already pending.
    ///
    /// Returns `false` when the caller must skip the structural mutation.
    pub fn begin_execute(&mut self) -> Result<bool> {
        if self.state != TriggerState::New {
            return Err(Error::invalid_state(
                "Trigger",
                "begin_execute",
                "New",
                self.state.name(),
            ));
        }
        if self.final_error.is_some() {
            self.state = TriggerState::Executed;
            return Ok(false);
        }
        self.state = TriggerState::Executing;
        Ok(true)
    }

    /// Moves to `Executed`, keeping `error` as the final error if none is
    /// pending, and reports the outcome to the handler.
    pub fn end_execute(&mut self, error: Option<Error>) -> Result<()> {
        if self.state != TriggerState::Executing {
            return Err(Error::invalid_state(
                "Trigger",
                "end_execute",
                "Executing",
                self.state.name(),
            ));
        }
        C::set_execution_result(self.handler, error.as_ref());
        if let Some(err) = error {
            self.final_error.get_or_insert(err);
        }
        self.state = TriggerState::Executed;
        Ok(())
    }

    /// Delivers every pending post callback.
    ///
    /// See [`flush_to`](Self::flush_to).
    pub fn flush(&mut self, freeze: &mut Freeze) -> Result<bool> {
        self.flush_to(freeze, usize::MAX)
    }

    /// Delivers post callbacks for records up to `limit`.
    ///
    /// Callback failures are kept, never propagated mid-delivery. Once all
    /// records are delivered the final error, if any, is returned exactly
    /// once. Returns `Ok(true)` if any callback was delivered by this call.
    pub fn flush_to(&mut self, freeze: &mut Freeze, limit: usize) -> Result<bool> {
        if self.state < TriggerState::Executed {
            return Err(Error::invalid_state(
                "Trigger",
                "flush",
                "Executed or Flushed",
                self.state.name(),
            ));
        }
        let len = self.changes.len();
        let limit = limit.min(len);
        let mut delivered = false;
        if limit > self.flushed_len {
            let handler = &mut *self.handler;
            let final_error = &mut self.final_error;
            let changes = &self.changes[self.flushed_len..limit];
            let arguments = &mut self.arguments[self.flushed_len..limit];
            freeze.run(|| {
                for (change, argument) in changes.iter().zip(arguments.iter_mut()) {
                    if let Err(err) = change.post(handler, argument.as_mut()) {
                        let err: HandlerError = Arc::from(err);
                        trace!(error = %err, "post callback failed");
                        if final_error.is_none() {
                            *final_error = Some(Error::Handler(err));
                        }
                    }
                }
            });
            self.flushed_len = limit;
            delivered = true;
        }
        self.state = TriggerState::Flushed;
        if self.flushed_len == len && !self.error_reported {
            if let Some(err) = &self.final_error {
                self.error_reported = true;
                warn!(records = len, error = %err, "trigger flushed with a captured failure");
                return Err(err.clone());
            }
        }
        Ok(delivered)
    }
}

impl<'h, K, V, H> Trigger<'h, EntryChange<K, V>, H>
where
    H: EntriesHandler<K, V> + ?Sized,
{
    /// Records an insertion.
    pub fn pre_add(&mut self, freeze: &mut Freeze, key: K, value: V) -> Result<()> {
        self.record(freeze, EntryChange::attach(key, value))
    }

    /// Records a replacement of `entry`.
    pub fn pre_change(&mut self, freeze: &mut Freeze, entry: EntryId, old: (K, V), new: (K, V)) -> Result<()> {
        self.record(freeze, EntryChange::replace(entry, old, new))
    }

    /// Records a removal of `entry`.
    pub fn pre_remove(&mut self, freeze: &mut Freeze, entry: EntryId, old: (K, V)) -> Result<()> {
        self.record(freeze, EntryChange::detach(entry, old))
    }
}

impl<'h, E, H> Trigger<'h, ElementChange<E>, H>
where
    H: ElementsHandler<E> + ?Sized,
{
    /// Records an insertion at `index`.
    pub fn pre_add(&mut self, freeze: &mut Freeze, index: usize, element: E) -> Result<()> {
        self.record(freeze, ElementChange::attach(index, element))
    }

    /// Records a replacement.
    pub fn pre_change(
        &mut self,
        freeze: &mut Freeze,
        old_index: usize,
        new_index: usize,
        old_element: E,
        new_element: E,
    ) -> Result<()> {
        self.record(
            freeze,
            ElementChange::replace((old_index, old_element), (new_index, new_element)),
        )
    }

    /// Records a removal at `index`.
    pub fn pre_remove(&mut self, freeze: &mut Freeze, index: usize, element: E) -> Result<()> {
        self.record(freeze, ElementChange::detach(index, element))
    }

    /// Forwards the conflict set of the current operation to the handler.
    pub fn set_conflict_abs_indexes(&mut self, indexes: &std::collections::BTreeSet<usize>) {
        self.handler.set_conflict_abs_indexes(indexes);
    }
}

/// Type of entry triggers.
pub type EntriesTrigger<'h, K, V, H> = Trigger<'h, EntryChange<K, V>, H>;

/// Type of element triggers.
pub type ElementsTrigger<'h, E, H> = Trigger<'h, ElementChange<E>, H>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        fail_adding: Option<i32>,
        fail_added: Option<i32>,
        pre_errors: usize,
        execution: Option<Option<String>>,
    }

    impl EntriesHandler<i32, i32> for Recorder {
        type Argument = Vec<String>;

        fn create_adding_argument(&mut self, _: &i32, _: &i32) -> Option<Vec<String>> {
            Some(Vec::new())
        }

        fn create_changing_argument(&mut self, _: &i32, _: &i32, _: &i32, _: &i32) -> Option<Vec<String>> {
            Some(Vec::new())
        }

        fn create_removing_argument(&mut self, key: &i32, _: &i32) -> Option<Vec<String>> {
            // Odd keys opt out of the pre callback.
            if key % 2 == 0 { Some(Vec::new()) } else { None }
        }

        fn adding(&mut self, key: &i32, _: &i32, _: &mut Vec<String>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("adding {key}"));
            if self.fail_adding == Some(*key) {
                return Err(format!("adding {key} failed").into());
            }
            Ok(())
        }

        fn added(&mut self, key: &i32, _: &i32, arg: Option<&mut Vec<String>>) -> core::result::Result<(), BoxError> {
            let errors = arg.map_or(0, |a| a.len());
            self.events.push(format!("added {key} ({errors})"));
            if self.fail_added == Some(*key) {
                return Err(format!("added {key} failed").into());
            }
            Ok(())
        }

        fn changing(&mut self, ok: &i32, _: &i32, nk: &i32, _: &i32, _: &mut Vec<String>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("changing {ok}->{nk}"));
            Ok(())
        }

        fn changed(&mut self, ok: &i32, _: &i32, nk: &i32, _: &i32, _: Option<&mut Vec<String>>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("changed {ok}->{nk}"));
            Ok(())
        }

        fn removing(&mut self, key: &i32, _: &i32, _: &mut Vec<String>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("removing {key}"));
            Ok(())
        }

        fn removed(&mut self, key: &i32, _: &i32, arg: Option<&mut Vec<String>>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("removed {key} arg={}", arg.is_some()));
            Ok(())
        }

        fn set_pre_error(&mut self, argument: &mut Vec<String>, error: &HandlerError) {
            self.pre_errors += 1;
            argument.push(error.to_string());
        }

        fn set_execution_result(&mut self, error: Option<&Error>) {
            self.execution = Some(error.map(|e| e.to_string()));
        }
    }

    #[test]
    fn lifecycle_and_ordering() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder::default();
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();

        trigger.pre_add(&mut freeze, 1, 10).unwrap();
        trigger.pre_change(&mut freeze, EntryId(0), (2, 20), (2, 21)).unwrap();
        trigger.pre_remove(&mut freeze, EntryId(1), (4, 40)).unwrap();
        assert_eq!(trigger.len(), 3);
        assert!(!freeze.is_frozen());

        assert!(trigger.begin_execute().unwrap());
        assert_eq!(trigger.state(), TriggerState::Executing);
        trigger.end_execute(None).unwrap();
        assert!(trigger.flush(&mut freeze).unwrap());
        assert_eq!(trigger.state(), TriggerState::Flushed);
        assert_eq!(trigger.flushed_len(), 3);

        // Second flush is a no-op.
        assert!(!trigger.flush(&mut freeze).unwrap());
        drop(trigger);

        assert_eq!(
            handler.events,
            [
                "adding 1",
                "changing 2->2",
                "removing 4",
                "added 1 (0)",
                "changed 2->2",
                "removed 4 arg=true",
            ]
        );
        assert_eq!(handler.execution, Some(None));
    }

    #[test]
    fn skipped_argument_still_gets_post_callback() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder::default();
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        trigger.pre_remove(&mut freeze, EntryId(3), (3, 30)).unwrap();
        assert!(trigger.begin_execute().unwrap());
        trigger.end_execute(None).unwrap();
        trigger.flush(&mut freeze).unwrap();
        drop(trigger);
        assert_eq!(handler.events, ["removed 3 arg=false"]);
    }

    #[test]
    fn pre_failure_short_circuits_execution_but_delivers_everything() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder {
            fail_adding: Some(1),
            ..Default::default()
        };
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        trigger.pre_add(&mut freeze, 1, 10).unwrap();
        trigger.pre_add(&mut freeze, 2, 20).unwrap();

        // Sibling pre callback still ran.
        assert!(trigger.final_error().is_some());
        assert!(!trigger.begin_execute().unwrap());
        assert_eq!(trigger.state(), TriggerState::Executed);

        let err = trigger.flush(&mut freeze).unwrap_err();
        assert_eq!(err.to_string(), "handler callback failed: adding 1 failed");
        assert!(!trigger.flush(&mut freeze).unwrap());
        drop(trigger);

        assert_eq!(handler.pre_errors, 1);
        assert_eq!(
            handler.events,
            ["adding 1", "adding 2", "added 1 (1)", "added 2 (0)"]
        );
    }

    #[test]
    fn post_failure_is_raised_after_full_delivery() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder {
            fail_added: Some(1),
            ..Default::default()
        };
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        for k in 1..=3 {
            trigger.pre_add(&mut freeze, k, k * 10).unwrap();
        }
        assert!(trigger.begin_execute().unwrap());
        trigger.end_execute(None).unwrap();
        assert!(trigger.flush(&mut freeze).is_err());
        drop(trigger);
        assert_eq!(handler.events.iter().filter(|e| e.starts_with("added")).count(), 3);
    }

    #[test]
    fn partial_flush_defers_error() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder {
            fail_added: Some(1),
            ..Default::default()
        };
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        trigger.pre_add(&mut freeze, 1, 10).unwrap();
        trigger.pre_add(&mut freeze, 2, 20).unwrap();
        assert!(trigger.begin_execute().unwrap());
        trigger.end_execute(None).unwrap();

        assert!(trigger.flush_to(&mut freeze, 1).unwrap());
        assert_eq!(trigger.flushed_len(), 1);
        assert!(trigger.flush(&mut freeze).is_err());
    }

    #[test]
    fn execution_error_becomes_final() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder::default();
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        trigger.pre_add(&mut freeze, 1, 10).unwrap();
        assert!(trigger.begin_execute().unwrap());
        trigger
            .end_execute(Some(Error::IllegalAlgorithm("lost entry")))
            .unwrap();
        assert!(matches!(
            trigger.flush(&mut freeze),
            Err(Error::IllegalAlgorithm(_))
        ));
        drop(trigger);
        assert_eq!(
            handler.execution,
            Some(Some("illegal algorithm: lost entry".to_string()))
        );
    }

    #[test]
    fn state_violations() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder::default();
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();

        assert!(matches!(
            trigger.flush(&mut freeze),
            Err(Error::InvalidState { operation: "flush", .. })
        ));
        assert!(trigger.end_execute(None).is_err());
        assert!(trigger.begin_execute().unwrap());
        assert!(trigger.pre_add(&mut freeze, 1, 1).is_err());
        assert!(trigger.begin_execute().is_err());
    }

    #[test]
    fn frozen_container_rejects_new_trigger() {
        let mut freeze = Freeze::default();
        freeze.freeze();
        let mut handler = Recorder::default();
        assert!(matches!(
            Trigger::<EntryChange<i32, i32>, _>::new(&mut handler, &freeze),
            Err(Error::Frozen)
        ));
        freeze.unfreeze().unwrap();
        assert!(matches!(freeze.unfreeze(), Err(Error::NotFrozen)));
    }

    #[test]
    fn unwinding_callback_thaws() {
        let mut freeze = Freeze::default();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            freeze.run(|| panic!("callback failed"));
        }));
        assert!(unwound.is_err());
        assert!(!freeze.is_frozen());
        assert!(freeze.check().is_ok());
        assert_eq!(freeze.run(|| 5), 5);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn history_offsets() {
        let mut freeze = Freeze::default();
        let mut handler = Recorder::default();
        let mut trigger = Trigger::new(&mut handler, &freeze).unwrap();
        trigger.pre_remove(&mut freeze, EntryId(7), (8, 80)).unwrap();
        trigger.pre_add(&mut freeze, 1, 10).unwrap();

        let all = trigger.history(0);
        assert_eq!(all.len(), 2);
        assert_eq!(all.modification(0), Some(Modification::Detach));
        assert_eq!(all.get(0).and_then(EntryChange::entry), Some(EntryId(7)));

        let tail = trigger.history(1);
        assert_eq!(tail.offset(), 1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.modification(0), Some(Modification::Attach));
        assert_eq!(tail.get(0).and_then(|c| c.new_key()), Some(&1));
        assert_eq!(tail.get(0).and_then(|c| c.old_key()), None);
        assert!(trigger.history(5).is_empty());
    }
}
