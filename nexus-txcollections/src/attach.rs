//! Orchestration of single and bulk insertions.
//!
//! An attach processor wraps one logical insert/replace operation:
//!
//! ```text
//! New ──initialize──▶ Initialized ──resolve──▶ Resolved ──begin_execute──▶ Executing
//!                                                   │                          │
//!                                                   └──(pre error)──▶ Executed ◀┘ end_execute
//!                                                                       │
//!                                                                     flush ──▶ Flushed
//! ```
//!
//! `initialize` validates the input and works out the *conflicts*: existing
//! items that must go because the incoming value collides with them in the
//! inverse index, or because the caller named one explicitly. Conflict
//! removals are announced to the trigger before the operation's own change,
//! deleted before the operation's structural edit, and delivered to the
//! handler together with everything else at flush time.

use std::collections::BTreeSet;

use hashbrown::HashSet;
use tracing::debug;

use crate::elements::{ElementBackend, Elements, Window};
use crate::entries::{Entries, EntryBackend, ReplacementRule};
use crate::handler::{ElementsConflictHandler, ElementsHandler, EntriesHandler};
use crate::suspend::FrozenContextSuspending;
use crate::trigger::{ElementsTrigger, EntriesTrigger, Trigger};
use crate::validator::validate;
use crate::{EntryId, Error, Result};

/// Lifecycle of an attach processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum AttachState {
    New,
    Initialized,
    Resolved,
    Executing,
    Executed,
    Flushed,
}

impl AttachState {
    const fn name(self) -> &'static str {
        match self {
            AttachState::New => "New",
            AttachState::Initialized => "Initialized",
            AttachState::Resolved => "Resolved",
            AttachState::Executing => "Executing",
            AttachState::Executed => "Executed",
            AttachState::Flushed => "Flushed",
        }
    }

    #[inline]
    fn require(self, expected: AttachState, operation: &'static str) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(Error::invalid_state(
                "AttachProcessor",
                operation,
                expected.name(),
                self.name(),
            ))
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

pub(crate) struct EntriesAttachProcessor<'h, K, V, H>
where
    H: EntriesHandler<K, V> + ?Sized,
{
    trigger: Option<EntriesTrigger<'h, K, V, H>>,
    state: AttachState,
    conflicts: Vec<EntryId>,
    pending: Vec<(K, V)>,
}

impl<'h, K, V, H> EntriesAttachProcessor<'h, K, V, H>
where
    K: Clone,
    V: Clone,
    H: EntriesHandler<K, V> + ?Sized,
{
    /// Starts an operation on `entries`. Fails while the container is
    /// frozen, handler or not.
    pub(crate) fn new<B>(entries: &Entries<K, V, B>, handler: Option<&'h mut H>) -> Result<Self>
    where
        B: EntryBackend<K, V>,
    {
        entries.root.freeze.check()?;
        let trigger = match handler {
            Some(handler) => Some(Trigger::new(handler, &entries.root.freeze)?),
            None => None,
        };
        Ok(Self {
            trigger,
            state: AttachState::New,
            conflicts: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Prepares a single put. `manual_conflict` names a key to remove in
    /// the same operation; it is ignored when equal to `key`.
    pub(crate) fn initialize<B>(
        &mut self,
        entries: &mut Entries<K, V, B>,
        key: K,
        value: V,
        manual_conflict: Option<&K>,
    ) -> Result<()>
    where
        B: EntryBackend<K, V>,
    {
        self.state.require(AttachState::New, "initialize")?;
        validate(entries.root.key_validator.as_ref(), &key)?;
        validate(entries.root.value_validator.as_ref(), &value)?;

        if let Some(inverse) = &entries.root.inverse {
            if manual_conflict.is_some() {
                return Err(Error::ManualConflictWithBidi);
            }
            if entries.root.is_indexed(&value) {
                if let Some(holder) = inverse.get(&value) {
                    if !entries.backend.key_equals(holder, &key) {
                        let id = entries
                            .backend
                            .find(holder)
                            .ok_or(Error::IllegalAlgorithm("inverse index names a missing key"))?;
                        self.conflicts.push(id);
                    }
                }
            }
        } else if let Some(conflict) = manual_conflict {
            if !entries.backend.key_equals(conflict, &key) {
                if let Some(id) = entries.backend.find(conflict) {
                    self.conflicts.push(id);
                }
            }
        }

        if self.trigger.is_some() {
            self.announce_conflicts(entries)?;
            let existing = entries.backend.find(&key);
            self.announce_put(entries, existing, &key, &value)?;
        }
        self.pending.push((key, value));
        self.state = AttachState::Initialized;
        Ok(())
    }

    /// Prepares a bulk put. Later pairs win over earlier ones.
    pub(crate) fn initialize_all<B>(&mut self, entries: &mut Entries<K, V, B>, items: Vec<(K, V)>) -> Result<()>
    where
        B: EntryBackend<K, V>,
    {
        self.state.require(AttachState::New, "initialize")?;
        for (key, value) in &items {
            validate(entries.root.key_validator.as_ref(), key)?;
            validate(entries.root.value_validator.as_ref(), value)?;
        }
        let items = entries.distinct(items);

        let mut conflicted: HashSet<EntryId> = HashSet::new();
        if let Some(inverse) = &entries.root.inverse {
            for (key, value) in &items {
                if !entries.root.is_indexed(value) {
                    continue;
                }
                let Some(holder) = inverse.get(value) else {
                    continue;
                };
                if entries.backend.key_equals(holder, key) {
                    continue;
                }
                let id = entries
                    .backend
                    .find(holder)
                    .ok_or(Error::IllegalAlgorithm("inverse index names a missing key"))?;
                if conflicted.insert(id) {
                    self.conflicts.push(id);
                }
            }
        }

        if self.trigger.is_some() {
            self.announce_conflicts(entries)?;
            for (key, value) in &items {
                let existing = entries.backend.find(key).filter(|id| !conflicted.contains(id));
                self.announce_put(entries, existing, key, value)?;
            }
        }
        self.pending = items;
        self.state = AttachState::Initialized;
        Ok(())
    }

    fn announce_conflicts<B>(&mut self, entries: &mut Entries<K, V, B>) -> Result<()>
    where
        B: EntryBackend<K, V>,
    {
        let Some(trigger) = &mut self.trigger else {
            return Ok(());
        };
        for &id in &self.conflicts {
            let old = entries.pair(id);
            trigger.pre_remove(&mut entries.root.freeze, id, old)?;
        }
        Ok(())
    }

    fn announce_put<B>(&mut self, entries: &mut Entries<K, V, B>, existing: Option<EntryId>, key: &K, value: &V) -> Result<()>
    where
        B: EntryBackend<K, V>,
    {
        let Some(trigger) = &mut self.trigger else {
            return Ok(());
        };
        match existing {
            Some(id) => {
                let old = entries.pair(id);
                let new_key = match entries.root.replacement {
                    ReplacementRule::NewReferenceWin => key.clone(),
                    ReplacementRule::OldReferenceWin => old.0.clone(),
                };
                trigger.pre_change(&mut entries.root.freeze, id, old, (new_key, value.clone()))
            }
            None => trigger.pre_add(&mut entries.root.freeze, key.clone(), value.clone()),
        }
    }

    /// Deletes the conflicts. Returns `false` when a pre callback failed;
    /// the caller must then skip its own structural edit.
    ///
    /// A resuming snapshot is told about every deleted conflict so its
    /// position anchor survives.
    pub(crate) fn begin_execute<B>(
        &mut self,
        entries: &mut Entries<K, V, B>,
        mut suspending: Option<&mut FrozenContextSuspending<K, V>>,
    ) -> Result<bool>
    where
        B: EntryBackend<K, V>,
    {
        self.state.require(AttachState::Initialized, "begin_execute")?;
        self.state = AttachState::Resolved;
        if let Some(trigger) = &mut self.trigger {
            if !trigger.begin_execute()? {
                self.state = AttachState::Executed;
                return Ok(false);
            }
        }
        if !self.conflicts.is_empty() {
            debug!(conflicts = self.conflicts.len(), "deleting conflicting entries");
            for id in core::mem::take(&mut self.conflicts) {
                match suspending.as_deref_mut() {
                    Some(snapshot) => {
                        let after = entries.backend.successor_key(id);
                        let (key, _) = entries.delete_entry(id);
                        snapshot.on_conflict_deleted(&key, after, &entries.backend.unified_key_comparator());
                    }
                    None => {
                        entries.delete_entry(id);
                    }
                }
            }
        }
        self.state = AttachState::Executing;
        Ok(true)
    }

    /// The resolved puts, in application order.
    #[inline]
    pub(crate) fn take_pending(&mut self) -> Vec<(K, V)> {
        core::mem::take(&mut self.pending)
    }

    pub(crate) fn end_execute(&mut self, error: Option<Error>) -> Result<()> {
        self.state.require(AttachState::Executing, "end_execute")?;
        self.state = AttachState::Executed;
        match &mut self.trigger {
            Some(trigger) => trigger.end_execute(error),
            None => error.map_or(Ok(()), Err),
        }
    }

    /// Delivers the post callbacks. Raises the first captured failure once
    /// everything is delivered.
    pub(crate) fn flush<B>(&mut self, entries: &mut Entries<K, V, B>) -> Result<()>
    where
        B: EntryBackend<K, V>,
    {
        if self.state == AttachState::Flushed {
            return Ok(());
        }
        self.state.require(AttachState::Executed, "flush")?;
        self.state = AttachState::Flushed;
        if let Some(trigger) = &mut self.trigger {
            trigger.flush(&mut entries.root.freeze)?;
        }
        Ok(())
    }
}

// =============================================================================
// Elements
// =============================================================================

/// Attach processor for sequences.
///
/// Indexes come in two flavours: *expected* (where the caller asked for the
/// edit, before conflicts are deleted) and *actual* (the same position once
/// the conflicts below it are gone). Both are relative to the window's head;
/// the window itself may lose hidden leading items to conflict removal, so
/// its head is tracked the same way.
pub(crate) struct ElementsAttachProcessor<'h, 'r, E, H, R>
where
    H: ElementsHandler<E> + ?Sized,
    R: ElementsConflictHandler + ?Sized,
{
    trigger: Option<ElementsTrigger<'h, E, H>>,
    resolver: Option<&'r mut R>,
    resolving: Option<R::Resolving>,
    state: AttachState,
    setting: bool,
    head_hide: usize,
    actual_head_hide: usize,
    expected_index: usize,
    actual_index: usize,
    conflicts: BTreeSet<usize>,
    size_before: usize,
    trigger_len_before_edit: usize,
}

impl<'h, 'r, E, H, R> ElementsAttachProcessor<'h, 'r, E, H, R>
where
    E: Clone,
    H: ElementsHandler<E> + ?Sized,
    R: ElementsConflictHandler + ?Sized,
{
    /// Starts an operation at window-relative `index`. `setting` marks a
    /// replacement of the item at `index` rather than an insertion before it.
    pub(crate) fn new<B>(
        elements: &Elements<E, B>,
        setting: bool,
        window: Window,
        index: usize,
        handler: Option<&'h mut H>,
        resolver: Option<&'r mut R>,
    ) -> Result<Self>
    where
        B: ElementBackend<E>,
    {
        elements.root.freeze.check()?;
        let trigger = match handler {
            Some(handler) => Some(Trigger::new(handler, &elements.root.freeze)?),
            None => None,
        };
        Ok(Self {
            trigger,
            resolver,
            resolving: None,
            state: AttachState::New,
            setting,
            head_hide: window.head_hide,
            actual_head_hide: window.head_hide,
            expected_index: index,
            actual_index: index,
            conflicts: BTreeSet::new(),
            size_before: elements.len(),
            trigger_len_before_edit: 0,
        })
    }

    /// Expected position, window-relative or absolute.
    #[inline]
    pub(crate) fn expected_index(&self, absolute: bool) -> usize {
        if absolute {
            self.head_hide + self.expected_index
        } else {
            self.expected_index
        }
    }

    /// Position once conflicts are deleted, window-relative or absolute.
    #[inline]
    pub(crate) fn actual_index(&self, absolute: bool) -> usize {
        if absolute {
            self.actual_head_hide + self.actual_index
        } else {
            self.actual_index
        }
    }

    /// Prepares a single insertion or replacement of `element`.
    pub(crate) fn initialize<B>(
        &mut self,
        elements: &mut Elements<E, B>,
        element: &E,
        manual_conflict: Option<&E>,
    ) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        self.state.require(AttachState::New, "initialize")?;
        validate(elements.root.validator.as_ref(), element)?;
        let mut conflicts = BTreeSet::new();
        if let Some(inverse) = &elements.root.inverse {
            if manual_conflict.is_some() {
                return Err(Error::ManualConflictWithBidi);
            }
            if elements.root.is_indexed(element) && inverse.contains_key(element) {
                let index = elements
                    .position_of(element)
                    .ok_or(Error::IllegalAlgorithm("inverse index names a missing element"))?;
                conflicts.insert(index);
            }
        } else if let Some(conflict) = manual_conflict {
            if let Some(index) = elements.position_of(conflict) {
                conflicts.insert(index);
            }
        }
        self.initialize_conflicts(elements, conflicts)?;
        self.state = AttachState::Initialized;
        Ok(())
    }

    /// Prepares a bulk insertion, returning the deduplicated items to
    /// insert.
    pub(crate) fn initialize_all<B>(&mut self, elements: &mut Elements<E, B>, items: Vec<E>) -> Result<Vec<E>>
    where
        B: ElementBackend<E>,
    {
        if self.setting {
            return Err(Error::Unsupported("bulk initialization of a replacement"));
        }
        self.state.require(AttachState::New, "initialize")?;
        for item in &items {
            validate(elements.root.validator.as_ref(), item)?;
        }
        let mut items = items;
        if elements.root.inverse.is_some() {
            let (distinct, incoming) = elements.distinct(items);
            items = distinct;
            let mut conflicts = BTreeSet::new();
            if elements.len() < items.len() {
                for (index, existing) in elements.backend.iter_range(0, elements.len()).enumerate() {
                    if elements.root.is_indexed(existing) && incoming.contains_key(existing) {
                        conflicts.insert(index);
                    }
                }
            } else if let Some(inverse) = &elements.root.inverse {
                for item in &items {
                    if elements.root.is_indexed(item) && inverse.contains_key(item) {
                        let index = elements
                            .position_of(item)
                            .ok_or(Error::IllegalAlgorithm("inverse index names a missing element"))?;
                        conflicts.insert(index);
                    }
                }
            }
            self.initialize_conflicts(elements, conflicts)?;
        }
        self.state = AttachState::Initialized;
        Ok(items)
    }

    fn initialize_conflicts<B>(&mut self, elements: &mut Elements<E, B>, mut conflicts: BTreeSet<usize>) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        if self.setting {
            conflicts.remove(&(self.head_hide + self.expected_index));
        }
        if let Some(trigger) = &mut self.trigger {
            for (index, element) in elements.cloned_at(&conflicts) {
                trigger.pre_remove(&mut elements.root.freeze, index, element)?;
            }
        }
        let head = self.head_hide;
        self.actual_index -= conflicts.range(head..head + self.expected_index).count();
        self.actual_head_hide -= conflicts.range(..head).count();
        if let Some(trigger) = &mut self.trigger {
            trigger.set_conflict_abs_indexes(&conflicts);
        }
        self.conflicts = conflicts;
        Ok(())
    }

    /// Lets the conflict handler re-base its positions, then opens the
    /// trigger for the operation's own records. Idempotent.
    pub(crate) fn resolve<B>(&mut self, elements: &mut Elements<E, B>) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        if self.state == AttachState::Resolved {
            return Ok(());
        }
        self.state.require(AttachState::Initialized, "resolve")?;
        if !self.conflicts.is_empty() {
            if let Some(resolver) = self.resolver.as_deref_mut() {
                let size = elements.len();
                let conflicts = &self.conflicts;
                self.resolving = Some(elements.root.freeze.run(|| resolver.resolving(size, conflicts)));
            }
        }
        if let Some(trigger) = &self.trigger {
            self.trigger_len_before_edit = trigger.len();
        }
        self.state = AttachState::Resolved;
        Ok(())
    }

    /// Records the insertion of `element` at absolute `index`.
    pub(crate) fn pre_add<B>(&mut self, elements: &mut Elements<E, B>, index: usize, element: &E) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        self.resolve(elements)?;
        match &mut self.trigger {
            Some(trigger) => trigger.pre_add(&mut elements.root.freeze, index, element.clone()),
            None => Ok(()),
        }
    }

    /// Records the replacement at the expected position.
    pub(crate) fn pre_change<B>(&mut self, elements: &mut Elements<E, B>, old: &E, new: &E) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        self.resolve(elements)?;
        let old_index = self.expected_index(true);
        let new_index = self.actual_index(true);
        match &mut self.trigger {
            Some(trigger) => trigger.pre_change(
                &mut elements.root.freeze,
                old_index,
                new_index,
                old.clone(),
                new.clone(),
            ),
            None => Ok(()),
        }
    }

    /// Deletes the conflicts. Returns `false` when a pre callback failed.
    pub(crate) fn begin_execute<B>(&mut self, elements: &mut Elements<E, B>) -> Result<bool>
    where
        B: ElementBackend<E>,
    {
        self.resolve(elements)?;
        if let Some(trigger) = &mut self.trigger {
            if !trigger.begin_execute()? {
                self.state = AttachState::Executed;
                return Ok(false);
            }
        }
        if !self.conflicts.is_empty() {
            debug!(conflicts = self.conflicts.len(), "deleting conflicting elements");
            elements.delete_sorted(&self.conflicts);
        }
        self.state = AttachState::Executing;
        Ok(true)
    }

    pub(crate) fn end_execute(&mut self, error: Option<Error>) -> Result<()> {
        self.state.require(AttachState::Executing, "end_execute")?;
        self.state = AttachState::Executed;
        match &mut self.trigger {
            Some(trigger) => trigger.end_execute(error),
            None => error.map_or(Ok(()), Err),
        }
    }

    /// Shrinks `window` by the conflicts deleted outside it.
    pub(crate) fn rebase(&self, window: &mut Window) {
        window.rebase(self.size_before, &self.conflicts);
    }

    /// Delivers the conflict removals, then the resolution callback, then
    /// the operation's own records.
    pub(crate) fn flush<B>(&mut self, elements: &mut Elements<E, B>) -> Result<()>
    where
        B: ElementBackend<E>,
    {
        if self.state == AttachState::Flushed {
            return Ok(());
        }
        self.state.require(AttachState::Executed, "flush")?;
        self.state = AttachState::Flushed;
        if let Some(trigger) = &mut self.trigger {
            trigger.flush_to(&mut elements.root.freeze, self.trigger_len_before_edit)?;
        }
        if let (Some(resolver), Some(resolving)) = (self.resolver.as_deref_mut(), self.resolving.take()) {
            elements.root.freeze.run(|| resolver.resolved(resolving));
        }
        if let Some(trigger) = &mut self.trigger {
            trigger.flush(&mut elements.root.freeze)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ArrayElements;
    use crate::entries::{BidiType, HashEntries};
    use crate::handler::NoHandler;

    #[test]
    fn entries_state_is_enforced() {
        let mut m: HashEntries<i32, i32> = HashEntries::builder().build().unwrap();
        let mut p = EntriesAttachProcessor::<_, _, NoHandler>::new(&m, None).unwrap();
        p.initialize(&mut m, 1, 1, None).unwrap();
        assert!(matches!(
            p.initialize(&mut m, 2, 2, None),
            Err(Error::InvalidState { operation: "initialize", .. })
        ));
        assert!(matches!(p.end_execute(None), Err(Error::InvalidState { .. })));
        assert!(p.begin_execute(&mut m, None).unwrap());
        let pending = p.take_pending();
        m.put_pending(pending);
        p.end_execute(None).unwrap();
        p.flush(&mut m).unwrap();
        // Second flush is a no-op.
        p.flush(&mut m).unwrap();
        assert_eq!(m.get(&1), Some(&1));
    }

    #[test]
    fn entries_execution_error_surfaces_without_handler() {
        let mut m: HashEntries<i32, i32> = HashEntries::builder().build().unwrap();
        let mut p = EntriesAttachProcessor::<_, _, NoHandler>::new(&m, None).unwrap();
        p.initialize(&mut m, 1, 1, None).unwrap();
        assert!(p.begin_execute(&mut m, None).unwrap());
        assert!(matches!(p.end_execute(Some(Error::NoSuchElement)), Err(Error::NoSuchElement)));
    }

    #[test]
    fn bulk_conflicts_are_collected_once() {
        let mut m: HashEntries<&str, i32> = HashEntries::builder().bidi(BidiType::AllValues).build().unwrap();
        m.put("a", 1).unwrap();
        let mut p = EntriesAttachProcessor::<_, _, NoHandler>::new(&m, None).unwrap();
        p.initialize_all(&mut m, vec![("b", 1), ("c", 1)]).unwrap();
        assert_eq!(p.conflicts.len(), 1);
        // Only the last pair survives deduplication by value.
        assert_eq!(p.pending, [("c", 1)]);
    }

    #[derive(Default)]
    struct Recorder {
        resolving: Vec<(usize, Vec<usize>)>,
        resolved: usize,
    }

    impl ElementsConflictHandler for Recorder {
        type Resolving = usize;

        fn resolving(&mut self, abs_size: usize, conflict_abs_indexes: &BTreeSet<usize>) -> usize {
            self.resolving
                .push((abs_size, conflict_abs_indexes.iter().copied().collect()));
            conflict_abs_indexes.len()
        }

        fn resolved(&mut self, resolving: usize) {
            self.resolved += resolving;
        }
    }

    #[test]
    fn element_indexes_shift_past_conflicts() {
        let mut list: ArrayElements<char> = ArrayElements::builder().bidi(BidiType::AllValues).build().unwrap();
        list.add_all("abcdef".chars()).unwrap();
        let window = Window::new(2, 1);
        let mut recorder = Recorder::default();
        // Insert 'a' at relative index 2 (absolute 4) of the window "cde".
        let mut p =
            ElementsAttachProcessor::<_, NoHandler, _>::new(&list, false, window, 2, None, Some(&mut recorder))
                .unwrap();
        p.initialize(&mut list, &'a', None).unwrap();
        assert_eq!(p.conflicts.iter().copied().collect::<Vec<_>>(), [0]);
        assert_eq!(p.expected_index(true), 4);
        assert_eq!(p.actual_index(false), 2);
        assert_eq!(p.actual_index(true), 3);
        assert!(p.begin_execute(&mut list).unwrap());
        let mut rebased = window;
        p.rebase(&mut rebased);
        assert_eq!(rebased, Window::new(1, 1));
        p.end_execute(None).unwrap();
        p.flush(&mut list).unwrap();
        assert_eq!(recorder.resolving, [(6, vec![0])]);
        assert_eq!(recorder.resolved, 1);
    }

    #[test]
    fn setting_never_conflicts_with_itself() {
        let mut list: ArrayElements<char> = ArrayElements::builder().bidi(BidiType::AllValues).build().unwrap();
        list.add_all("abc".chars()).unwrap();
        let mut p =
            ElementsAttachProcessor::<_, NoHandler, NoHandler>::new(&list, true, Window::FULL, 1, None, None)
                .unwrap();
        p.initialize(&mut list, &'b', None).unwrap();
        assert!(p.conflicts.is_empty());
        assert!(matches!(
            p.initialize_all(&mut list, vec!['x']),
            Err(Error::Unsupported(_))
        ));
    }
}
