//! Sequence containers.
//!
//! [`Elements`] is one container type parameterized by its storage backend:
//!
//! | Alias | Backend | Indexed access |
//! |-------|---------|----------------|
//! | [`ArrayElements`] | [`GrowableArray`] | `O(1)` |
//! | [`LinkedElements`] | [`NodeList`] | `O(n)`, amortized `O(1)` for sequential reads |
//!
//! With a [`BidiType`] other than `None` every element is unique: inserting
//! an element that is already present removes the old occurrence in the
//! same operation. An inverse index keyed by element keeps the membership
//! test from scanning.
//!
//! Indexes reported to an [`ElementsHandler`] are absolute positions in the
//! root sequence, also for operations made through a [`SubList`].
//!
//! # Example
//!
//! ```
//! use nexus_txcollections::{ArrayElements, BidiType};
//!
//! let mut list = ArrayElements::<char>::builder()
//!     .bidi(BidiType::AllValues)
//!     .build()
//!     .unwrap();
//! list.add_all("abc".chars()).unwrap();
//!
//! // 'a' moves to the end instead of being duplicated.
//! list.add('a').unwrap();
//! assert_eq!(list.iter().collect::<String>(), "bca");
//! ```

pub mod array;
pub mod linked;
mod sublist;

use core::fmt;
use core::hash::Hash;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::trace;

use crate::attach::ElementsAttachProcessor;
use crate::contains::{ContainsSource, OverriddenContainsBehavior};
use crate::entries::{BidiType, KeyIndex, NullValuePredicate};
use crate::handler::{ElementsConflictHandler, ElementsHandler, NoHandler};
use crate::trigger::{Freeze, Trigger};
use crate::{EqualityComparator, Error, Result, UnifiedComparator, Validator};

pub use array::{ArrayConfig, GrowableArray};
pub use linked::{LinkedConfig, NodeList, ReaderOptimization};
pub use sublist::SubList;

/// Contiguous sequence.
pub type ArrayElements<E> = Elements<E, GrowableArray<E>>;

/// Doubly linked sequence.
pub type LinkedElements<E> = Elements<E, NodeList<E>>;

// =============================================================================
// Backend
// =============================================================================

/// Positional storage for one sequence layout.
///
/// Indexes passed to the accessors are absolute and in bounds: the container
/// checks them against the caller's window first, so an out-of-range index
/// here is a broken invariant and may panic.
pub trait ElementBackend<E>: Sized {
    /// Backend settings.
    type Config: Clone + Default;

    /// Double-ended iterator over a range.
    type Iter<'a>: DoubleEndedIterator<Item = &'a E> + ExactSizeIterator
    where
        Self: 'a,
        E: 'a;

    /// Creates an empty backend. `comparator` is the container's element
    /// strategy, for backends that cache search results.
    fn create(comparator: &UnifiedComparator<E>, config: &Self::Config) -> Result<Self>;

    /// Current settings.
    fn config(&self) -> Self::Config;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Returns `true` if there are no elements.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`.
    fn get(&self, index: usize) -> &E;

    /// Replaces the element at `index`, returning the old one.
    fn replace(&mut self, index: usize, element: E) -> E;

    /// Inserts `elements` in order before `index`.
    fn insert_all(&mut self, index: usize, elements: Vec<E>);

    /// Removes the element at `index`.
    fn remove(&mut self, index: usize) -> E;

    /// Removes every index in `indexes`, returning the elements in
    /// ascending index order.
    fn remove_sorted(&mut self, indexes: &BTreeSet<usize>) -> Vec<E> {
        let mut removed: Vec<E> = indexes.iter().rev().map(|&i| self.remove(i)).collect();
        removed.reverse();
        removed
    }

    /// Removes `start..end`.
    fn drain(&mut self, start: usize, end: usize) -> Vec<E>;

    /// Iterates `start..end`.
    fn iter_range(&self, start: usize, end: usize) -> Self::Iter<'_>;

    /// First index in `start..end` holding an element equal to `element`.
    fn position(&self, start: usize, end: usize, element: &E) -> Option<usize>;

    /// Last index in `start..end` holding an element equal to `element`.
    fn rposition(&self, start: usize, end: usize, element: &E) -> Option<usize>;

    /// Whether indexed access is `O(1)`.
    fn random_access(&self) -> bool;

    /// Whether readers can share the backend under a read lock.
    fn is_read_write_lock_supported(&self) -> bool {
        true
    }
}

// =============================================================================
// Window
// =============================================================================

pub(crate) use sealed::Window;

impl Window {
    pub(crate) const FULL: Window = Window {
        head_hide: 0,
        tail_hide: 0,
    };

    #[inline]
    pub(crate) const fn new(head_hide: usize, tail_hide: usize) -> Self {
        Self { head_hide, tail_hide }
    }

    /// Visible length over a sequence of `all` elements.
    #[inline]
    pub(crate) fn size(self, all: usize) -> Result<usize> {
        all.checked_sub(self.head_hide)
            .and_then(|rest| rest.checked_sub(self.tail_hide))
            .ok_or(Error::InvalidWindow {
                head_hide: self.head_hide,
                tail_hide: self.tail_hide,
                size: all,
            })
    }

    /// Absolute fence index over a sequence of `all` elements.
    #[inline]
    pub(crate) fn end(self, all: usize) -> usize {
        all - self.tail_hide
    }

    /// Accounts for the deletion of `conflicts` (absolute indexes over a
    /// sequence that had `size_before` elements).
    pub(crate) fn rebase(&mut self, size_before: usize, conflicts: &BTreeSet<usize>) {
        if conflicts.is_empty() {
            return;
        }
        let tail_start = size_before.saturating_sub(self.tail_hide);
        self.tail_hide -= conflicts.range(tail_start..).count();
        self.head_hide -= conflicts.range(..self.head_hide).count();
    }
}

// =============================================================================
// Root data
// =============================================================================

pub(crate) struct ElementsRoot<E> {
    pub(crate) comparator: UnifiedComparator<E>,
    pub(crate) validator: Option<Validator<E>>,
    pub(crate) bidi: BidiType,
    pub(crate) null_value: Option<NullValuePredicate<E>>,
    pub(crate) freeze: Freeze,
    pub(crate) mod_count: u64,
    pub(crate) inverse: Option<KeyIndex<E, ()>>,
}

impl<E> ElementsRoot<E> {
    /// Returns `true` if `element` takes part in the inverse index.
    #[inline]
    pub(crate) fn is_indexed(&self, element: &E) -> bool {
        match self.bidi {
            BidiType::None => false,
            BidiType::AllValues => true,
            BidiType::NonNullValues => !self.null_value.as_ref().is_some_and(|is_null| is_null(element)),
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures an [`Elements`] container.
pub struct ElementsBuilder<E, B: ElementBackend<E>> {
    pub(crate) comparator: UnifiedComparator<E>,
    pub(crate) validator: Option<Validator<E>>,
    pub(crate) bidi: BidiType,
    pub(crate) null_value: Option<NullValuePredicate<E>>,
    pub(crate) config: B::Config,
}

impl<E, B: ElementBackend<E>> Clone for ElementsBuilder<E, B> {
    fn clone(&self) -> Self {
        Self {
            comparator: self.comparator.clone(),
            validator: self.validator.clone(),
            bidi: self.bidi,
            null_value: self.null_value.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E, B: ElementBackend<E>> ElementsBuilder<E, B> {
    /// Starts from an explicit element strategy.
    pub fn new(comparator: impl Into<UnifiedComparator<E>>) -> Self {
        Self {
            comparator: comparator.into(),
            validator: None,
            bidi: BidiType::None,
            null_value: None,
            config: B::Config::default(),
        }
    }

    /// Element strategy. Decides the inverse index backend.
    pub fn comparator(mut self, comparator: impl Into<UnifiedComparator<E>>) -> Self {
        self.comparator = comparator.into();
        self
    }

    /// Rejects elements before any mutation starts.
    pub fn validator(mut self, validator: Validator<E>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Uniqueness mode.
    pub fn bidi(mut self, bidi: BidiType) -> Self {
        self.bidi = bidi;
        self
    }

    /// Marks the elements exempt from [`BidiType::NonNullValues`] uniqueness.
    pub fn null_value<F>(mut self, is_null: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.null_value = Some(Arc::new(is_null));
        self
    }

    /// Backend settings.
    pub fn config(mut self, config: B::Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the container.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid backend settings, or for
    /// [`BidiType::NonNullValues`] without a null-value predicate.
    pub fn build(self) -> Result<Elements<E, B>> {
        if self.bidi == BidiType::NonNullValues && self.null_value.is_none() {
            return Err(Error::Config(
                "NonNullValues requires a null-value predicate".into(),
            ));
        }
        let backend = B::create(&self.comparator, &self.config)?;
        let inverse = (self.bidi != BidiType::None).then(|| KeyIndex::new(self.comparator.clone()));
        Ok(Elements {
            backend,
            root: ElementsRoot {
                comparator: self.comparator,
                validator: self.validator,
                bidi: self.bidi,
                null_value: self.null_value,
                freeze: Freeze::default(),
                mod_count: 0,
                inverse,
            },
        })
    }
}

// =============================================================================
// Elements
// =============================================================================

/// A sequence with trigger-aware mutation.
pub struct Elements<E, B> {
    pub(crate) backend: B,
    pub(crate) root: ElementsRoot<E>,
}

impl<E, B> Elements<E, B>
where
    B: ElementBackend<E>,
    E: Eq + Hash + 'static,
{
    /// A builder with natural equality.
    pub fn builder() -> ElementsBuilder<E, B> {
        ElementsBuilder::new(EqualityComparator::<E>::natural())
    }
}

impl<E, B: ElementBackend<E>> Elements<E, B> {
    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Structural modification counter.
    #[inline]
    pub fn mod_count(&self) -> u64 {
        self.root.mod_count
    }

    /// Returns `true` while a handler callback is running.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.root.freeze.is_frozen()
    }

    /// Blocks new mutations until [`unfreeze`](Self::unfreeze).
    pub fn freeze(&mut self) {
        self.root.freeze.freeze();
    }

    /// Releases one [`freeze`](Self::freeze).
    pub fn unfreeze(&mut self) -> Result<()> {
        self.root.freeze.unfreeze()
    }

    /// Uniqueness mode.
    #[inline]
    pub fn bidi_type(&self) -> BidiType {
        self.root.bidi
    }

    /// Element strategy.
    #[inline]
    pub fn comparator(&self) -> &UnifiedComparator<E> {
        &self.root.comparator
    }

    /// Whether indexed access is `O(1)`.
    #[inline]
    pub fn random_access(&self) -> bool {
        self.backend.random_access()
    }

    /// Whether readers can share this container under a read lock.
    #[inline]
    pub fn is_read_write_lock_supported(&self) -> bool {
        self.backend.is_read_write_lock_supported()
    }

    /// The storage backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.get_in(Window::FULL, index)
    }

    /// First element.
    pub fn first(&self) -> Option<&E> {
        self.get(0)
    }

    /// Last element.
    pub fn last(&self) -> Option<&E> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterates in order.
    pub fn iter(&self) -> B::Iter<'_> {
        self.backend.iter_range(0, self.len())
    }

    /// Index of the first element equal to `element`.
    pub fn index_of(&self, element: &E) -> Option<usize> {
        self.index_of_in(Window::FULL, element)
    }

    /// Index of the last element equal to `element`.
    pub fn last_index_of(&self, element: &E) -> Option<usize> {
        self.last_index_of_in(Window::FULL, element)
    }

    /// Returns `true` if some element equals `element`. Answered by the
    /// inverse index when the element is indexed.
    pub fn contains(&self, element: &E) -> bool {
        self.contains_in(Window::FULL, element)
    }

    /// Returns `true` if every item of `other` is contained.
    pub fn contains_all<C>(&self, other: &C) -> bool
    where
        C: ContainsSource<E> + ?Sized,
    {
        other.source_iter().all(|e| self.contains(e))
    }

    /// A fail-fast cursor positioned before the first element.
    pub fn cursor(&self) -> ElementsCursor {
        ElementsCursor::new(self, Window::FULL)
    }

    // =========================================================================
    // Window-relative reads
    // =========================================================================

    pub(crate) fn get_in(&self, window: Window, index: usize) -> Option<&E> {
        let size = window.size(self.len()).ok()?;
        (index < size).then(|| self.backend.get(window.head_hide + index))
    }

    pub(crate) fn index_of_in(&self, window: Window, element: &E) -> Option<usize> {
        let end = window.end(self.len());
        if !self.might_contain(element) {
            return None;
        }
        self.backend
            .position(window.head_hide, end, element)
            .map(|i| i - window.head_hide)
    }

    pub(crate) fn last_index_of_in(&self, window: Window, element: &E) -> Option<usize> {
        let end = window.end(self.len());
        if !self.might_contain(element) {
            return None;
        }
        self.backend
            .rposition(window.head_hide, end, element)
            .map(|i| i - window.head_hide)
    }

    pub(crate) fn contains_in(&self, window: Window, element: &E) -> bool {
        if window == Window::FULL {
            if let Some(inverse) = &self.root.inverse {
                if self.root.is_indexed(element) {
                    return inverse.contains_key(element);
                }
            }
        }
        self.index_of_in(window, element).is_some()
    }

    /// `false` only when the inverse index proves `element` absent.
    #[inline]
    fn might_contain(&self, element: &E) -> bool {
        match &self.root.inverse {
            Some(inverse) if self.root.is_indexed(element) => inverse.contains_key(element),
            _ => true,
        }
    }

    /// Absolute index of the first occurrence of `element`.
    #[inline]
    pub(crate) fn position_of(&self, element: &E) -> Option<usize> {
        self.backend.position(0, self.len(), element)
    }
}

impl<E, B> Elements<E, B>
where
    E: Clone,
    B: ElementBackend<E>,
{
    // =========================================================================
    // Structural helpers
    // =========================================================================

    /// Clones of the elements at absolute `indexes`, paired with them.
    pub(crate) fn cloned_at(&self, indexes: &BTreeSet<usize>) -> Vec<(usize, E)> {
        let (Some(&first), Some(&last)) = (indexes.first(), indexes.last()) else {
            return Vec::new();
        };
        self.backend
            .iter_range(first, last + 1)
            .zip(first..)
            .filter(|(_, i)| indexes.contains(i))
            .map(|(e, i)| (i, e.clone()))
            .collect()
    }

    /// Inserts before absolute `index`, mirroring into the inverse index.
    pub(crate) fn insert_elements(&mut self, index: usize, elements: Vec<E>) {
        let mirrored: Vec<E> = elements.iter().filter(|e| self.root.is_indexed(e)).cloned().collect();
        if let Some(inverse) = &mut self.root.inverse {
            for e in mirrored {
                inverse.put(e, ());
            }
        }
        self.backend.insert_all(index, elements);
        self.root.mod_count += 1;
    }

    /// Replaces the element at absolute `index`, mirroring into the
    /// inverse index.
    pub(crate) fn replace_element(&mut self, index: usize, element: E) -> E {
        let mirrored = self.root.is_indexed(&element).then(|| element.clone());
        let old = self.backend.replace(index, element);
        let indexed_old = self.root.is_indexed(&old);
        if let Some(inverse) = &mut self.root.inverse {
            if indexed_old {
                inverse.remove(&old);
            }
            if let Some(element) = mirrored {
                inverse.put(element, ());
            }
        }
        old
    }

    /// Removes absolute `indexes`, mirroring into the inverse index.
    pub(crate) fn delete_sorted(&mut self, indexes: &BTreeSet<usize>) -> Vec<E> {
        let removed = self.backend.remove_sorted(indexes);
        self.unmirror(&removed);
        self.root.mod_count += 1;
        removed
    }

    fn delete_range(&mut self, start: usize, end: usize) -> Vec<E> {
        let removed = self.backend.drain(start, end);
        if start == 0 && end == self.len() + removed.len() {
            if let Some(inverse) = &mut self.root.inverse {
                inverse.clear();
            }
        } else {
            self.unmirror(&removed);
        }
        self.root.mod_count += 1;
        removed
    }

    fn unmirror(&mut self, removed: &[E]) {
        let indexed: Vec<bool> = removed.iter().map(|e| self.root.is_indexed(e)).collect();
        if let Some(inverse) = &mut self.root.inverse {
            for (e, _) in removed.iter().zip(indexed).filter(|(_, indexed)| *indexed) {
                inverse.remove(e);
            }
        }
    }

    /// Keeps the first occurrence of every indexed element. Returns the
    /// kept items and the set of their indexed elements.
    pub(crate) fn distinct(&self, items: Vec<E>) -> (Vec<E>, KeyIndex<E, ()>) {
        let mut seen: KeyIndex<E, ()> = KeyIndex::new(self.root.comparator.clone());
        let mut kept = Vec::with_capacity(items.len());
        for e in items {
            if self.root.is_indexed(&e) && !seen.insert_new(e.clone(), ()) {
                continue;
            }
            kept.push(e);
        }
        (kept, seen)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Appends `element`.
    pub fn add(&mut self, element: E) -> Result<()> {
        let index = self.len();
        self.insert(index, element)
    }

    /// [`add`](Self::add) observed by `handler`.
    pub fn add_with<H>(&mut self, element: E, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        let index = self.len();
        self.insert_with(index, element, handler)
    }

    /// Removes the first occurrence of `conflict` (if any) and appends
    /// `element` in one operation.
    ///
    /// # Errors
    ///
    /// [`Error::ManualConflictWithBidi`] on unique sequences, whose
    /// conflicts are derived from the inverse index.
    pub fn add_replacing(&mut self, conflict: &E, element: E) -> Result<()> {
        let index = self.len();
        let mut window = Window::FULL;
        self.insert_in::<NoHandler, NoHandler>(&mut window, &mut [], index, element, Some(conflict), None, None)
    }

    /// Inserts `element` before `index`.
    pub fn insert(&mut self, index: usize, element: E) -> Result<()> {
        let mut window = Window::FULL;
        self.insert_in::<NoHandler, NoHandler>(&mut window, &mut [], index, element, None, None, None)
    }

    /// [`insert`](Self::insert) observed by `handler`.
    pub fn insert_with<H>(&mut self, index: usize, element: E, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        let mut window = Window::FULL;
        self.insert_in::<H, NoHandler>(&mut window, &mut [], index, element, None, Some(handler), None)
    }

    /// [`insert`](Self::insert) with a conflict handler told about the
    /// conflicting indexes before they are deleted.
    pub fn insert_resolving<H, R>(
        &mut self,
        index: usize,
        element: E,
        handler: Option<&mut H>,
        resolver: &mut R,
    ) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
        R: ElementsConflictHandler + ?Sized,
    {
        let mut window = Window::FULL;
        self.insert_in(&mut window, &mut [], index, element, None, handler, Some(resolver))
    }

    /// Appends every item. Returns `true` if anything was added.
    pub fn add_all<I>(&mut self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
    {
        let index = self.len();
        self.insert_all(index, items)
    }

    /// [`add_all`](Self::add_all) observed by `handler`.
    pub fn add_all_with<I, H>(&mut self, items: I, handler: &mut H) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
        H: ElementsHandler<E> + ?Sized,
    {
        let index = self.len();
        self.insert_all_with(index, items, handler)
    }

    /// Inserts every item, in order, before `index`.
    pub fn insert_all<I>(&mut self, index: usize, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
    {
        let items = items.into_iter().collect();
        let mut window = Window::FULL;
        self.insert_all_in::<NoHandler, NoHandler>(&mut window, &mut [], index, items, None, None)
    }

    /// [`insert_all`](Self::insert_all) observed by `handler`.
    pub fn insert_all_with<I, H>(&mut self, index: usize, items: I, handler: &mut H) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
        H: ElementsHandler<E> + ?Sized,
    {
        let items = items.into_iter().collect();
        let mut window = Window::FULL;
        self.insert_all_in::<H, NoHandler>(&mut window, &mut [], index, items, Some(handler), None)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_in<H, R>(
        &mut self,
        window: &mut Window,
        outers: &mut [&mut Window],
        index: usize,
        element: E,
        manual_conflict: Option<&E>,
        handler: Option<&mut H>,
        resolver: Option<&mut R>,
    ) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
        R: ElementsConflictHandler + ?Sized,
    {
        let size = window.size(self.len())?;
        if index > size {
            return Err(Error::IndexOutOfBounds { index, len: size });
        }
        let mut processor = ElementsAttachProcessor::new(self, false, *window, index, handler, resolver)?;
        processor.initialize(self, &element, manual_conflict)?;
        let at = processor.actual_index(true);
        processor.pre_add(self, at, &element)?;
        if processor.begin_execute(self)? {
            self.insert_elements(at, vec![element]);
            processor.rebase(window);
            for outer in outers.iter_mut() {
                processor.rebase(outer);
            }
            processor.end_execute(None)?;
        }
        processor.flush(self)
    }

    pub(crate) fn insert_all_in<H, R>(
        &mut self,
        window: &mut Window,
        outers: &mut [&mut Window],
        index: usize,
        items: Vec<E>,
        handler: Option<&mut H>,
        resolver: Option<&mut R>,
    ) -> Result<bool>
    where
        H: ElementsHandler<E> + ?Sized,
        R: ElementsConflictHandler + ?Sized,
    {
        self.root.freeze.check()?;
        let size = window.size(self.len())?;
        if index > size {
            return Err(Error::IndexOutOfBounds { index, len: size });
        }
        if items.is_empty() {
            return Ok(false);
        }
        let mut processor = ElementsAttachProcessor::new(self, false, *window, index, handler, resolver)?;
        let items = processor.initialize_all(self, items)?;
        let at = processor.actual_index(true);
        for (offset, e) in items.iter().enumerate() {
            processor.pre_add(self, at + offset, e)?;
        }
        if processor.begin_execute(self)? {
            self.insert_elements(at, items);
            processor.rebase(window);
            for outer in outers.iter_mut() {
                processor.rebase(outer);
            }
            processor.end_execute(None)?;
        }
        processor.flush(self)?;
        Ok(true)
    }

    // =========================================================================
    // Replacement
    // =========================================================================

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, element: E) -> Result<E> {
        let mut window = Window::FULL;
        self.set_in::<NoHandler, NoHandler>(&mut window, &mut [], index, element, None, None)
    }

    /// [`set`](Self::set) observed by `handler`.
    pub fn set_with<H>(&mut self, index: usize, element: E, handler: &mut H) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        let mut window = Window::FULL;
        self.set_in::<H, NoHandler>(&mut window, &mut [], index, element, Some(handler), None)
    }

    /// [`set`](Self::set) with a conflict handler.
    pub fn set_resolving<H, R>(&mut self, index: usize, element: E, handler: Option<&mut H>, resolver: &mut R) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
        R: ElementsConflictHandler + ?Sized,
    {
        let mut window = Window::FULL;
        self.set_in(&mut window, &mut [], index, element, handler, Some(resolver))
    }

    pub(crate) fn set_in<H, R>(
        &mut self,
        window: &mut Window,
        outers: &mut [&mut Window],
        index: usize,
        element: E,
        handler: Option<&mut H>,
        resolver: Option<&mut R>,
    ) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
        R: ElementsConflictHandler + ?Sized,
    {
        let size = window.size(self.len())?;
        if index >= size {
            return Err(Error::IndexOutOfBounds { index, len: size });
        }
        let mut processor = ElementsAttachProcessor::new(self, true, *window, index, handler, resolver)?;
        processor.initialize(self, &element, None)?;
        let old = self.backend.get(processor.expected_index(true)).clone();
        processor.pre_change(self, &old, &element)?;
        let mut replaced = None;
        if processor.begin_execute(self)? {
            replaced = Some(self.replace_element(processor.actual_index(true), element));
            processor.rebase(window);
            for outer in outers.iter_mut() {
                processor.rebase(outer);
            }
            processor.end_execute(None)?;
        }
        processor.flush(self)?;
        replaced.ok_or(Error::NoSuchElement)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes the element at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<E> {
        self.remove_at_in::<NoHandler>(Window::FULL, index, None)
    }

    /// [`remove_at`](Self::remove_at) observed by `handler`.
    pub fn remove_at_with<H>(&mut self, index: usize, handler: &mut H) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.remove_at_in(Window::FULL, index, Some(handler))
    }

    /// Removes the first element equal to `element`. Returns `true` if one
    /// was found.
    pub fn remove(&mut self, element: &E) -> Result<bool> {
        self.remove_in::<NoHandler>(Window::FULL, element, None)
    }

    /// [`remove`](Self::remove) observed by `handler`.
    pub fn remove_with<H>(&mut self, element: &E, handler: &mut H) -> Result<bool>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.remove_in(Window::FULL, element, Some(handler))
    }

    /// Removes every element contained in `other`.
    pub fn remove_all<C>(&mut self, other: &C) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
    {
        self.filter_in::<C, NoHandler>(Window::FULL, other, true, None)
    }

    /// [`remove_all`](Self::remove_all) observed by `handler`.
    pub fn remove_all_with<C, H>(&mut self, other: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
        H: ElementsHandler<E> + ?Sized,
    {
        self.filter_in(Window::FULL, other, true, Some(handler))
    }

    /// Keeps only elements contained in `other`.
    pub fn retain_all<C>(&mut self, other: &C) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
    {
        self.filter_in::<C, NoHandler>(Window::FULL, other, false, None)
    }

    /// [`retain_all`](Self::retain_all) observed by `handler`.
    pub fn retain_all_with<C, H>(&mut self, other: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
        H: ElementsHandler<E> + ?Sized,
    {
        self.filter_in(Window::FULL, other, false, Some(handler))
    }

    /// Removes every element.
    pub fn clear(&mut self) -> Result<()> {
        self.clear_in::<NoHandler>(Window::FULL, None)
    }

    /// [`clear`](Self::clear) observed by `handler`.
    pub fn clear_with<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.clear_in(Window::FULL, Some(handler))
    }

    pub(crate) fn remove_at_in<H>(&mut self, window: Window, index: usize, handler: Option<&mut H>) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.root.freeze.check()?;
        let size = window.size(self.len())?;
        if index >= size {
            return Err(Error::IndexOutOfBounds { index, len: size });
        }
        let indexes = BTreeSet::from([window.head_hide + index]);
        self.remove_indexes(&indexes, handler)?.pop().ok_or(Error::NoSuchElement)
    }

    pub(crate) fn remove_in<H>(&mut self, window: Window, element: &E, handler: Option<&mut H>) -> Result<bool>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.root.freeze.check()?;
        window.size(self.len())?;
        let Some(index) = self.index_of_in(window, element) else {
            return Ok(false);
        };
        let indexes = BTreeSet::from([window.head_hide + index]);
        self.remove_indexes(&indexes, handler)?;
        Ok(true)
    }

    pub(crate) fn filter_in<C, H>(&mut self, window: Window, other: &C, remove: bool, handler: Option<&mut H>) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
        H: ElementsHandler<E> + ?Sized,
    {
        self.root.freeze.check()?;
        let size = window.size(self.len())?;
        let behavior = OverriddenContainsBehavior::new(other, &self.root.comparator);
        let indexes: BTreeSet<usize> = self
            .backend
            .iter_range(window.head_hide, window.head_hide + size)
            .zip(window.head_hide..)
            .filter(|(e, _)| behavior.contains(e) == remove)
            .map(|(_, i)| i)
            .collect();
        if indexes.is_empty() {
            return Ok(false);
        }
        trace!(count = indexes.len(), "bulk element removal");
        self.remove_indexes(&indexes, handler)?;
        Ok(true)
    }

    pub(crate) fn clear_in<H>(&mut self, window: Window, handler: Option<&mut H>) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.root.freeze.check()?;
        let size = window.size(self.len())?;
        if size == 0 {
            return Ok(());
        }
        let (start, end) = (window.head_hide, window.head_hide + size);
        let Some(handler) = handler else {
            self.delete_range(start, end);
            return Ok(());
        };
        let mut trigger = Trigger::with_capacity(handler, &self.root.freeze, size)?;
        let removed: Vec<E> = self.backend.iter_range(start, end).cloned().collect();
        for (index, element) in (start..).zip(removed) {
            trigger.pre_remove(&mut self.root.freeze, index, element)?;
        }
        if trigger.begin_execute()? {
            self.delete_range(start, end);
            trigger.end_execute(None)?;
        }
        trigger.flush(&mut self.root.freeze).map(drop)
    }

    /// Deletes absolute `indexes` under one trigger.
    pub(crate) fn remove_indexes<H>(&mut self, indexes: &BTreeSet<usize>, handler: Option<&mut H>) -> Result<Vec<E>>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        let Some(handler) = handler else {
            return Ok(self.delete_sorted(indexes));
        };
        let mut trigger = Trigger::with_capacity(handler, &self.root.freeze, indexes.len())?;
        for (index, element) in self.cloned_at(indexes) {
            trigger.pre_remove(&mut self.root.freeze, index, element)?;
        }
        let mut removed = Vec::new();
        if trigger.begin_execute()? {
            removed = self.delete_sorted(indexes);
            trigger.end_execute(None)?;
        }
        trigger.flush(&mut self.root.freeze)?;
        Ok(removed)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// A live view of `from..to`.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalRange`] if `from > to`, [`Error::IndexOutOfBounds`]
    /// if `to` exceeds the length.
    pub fn sub_list(&mut self, from: usize, to: usize) -> Result<SubList<'_, E, B>> {
        let len = self.len();
        let window = sub_window(Window::FULL, len, from, to)?;
        Ok(SubList::new(self, window, Vec::new()))
    }
}

/// Window of `from..to` inside `parent` over a sequence of `all` elements.
pub(crate) fn sub_window(parent: Window, all: usize, from: usize, to: usize) -> Result<Window> {
    let size = parent.size(all)?;
    if from > to {
        return Err(Error::IllegalRange("from must not exceed to"));
    }
    if to > size {
        return Err(Error::IndexOutOfBounds { index: to, len: size });
    }
    Ok(Window::new(parent.head_hide + from, parent.tail_hide + (size - to)))
}

impl<E: fmt::Debug, B: ElementBackend<E>> fmt::Debug for Elements<E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<E, B: ElementBackend<E>> ContainsSource<E> for Elements<E, B> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<E>> {
        // Only a unique sequence answers membership without scanning.
        (self.root.bidi == BidiType::AllValues).then(|| self.root.comparator.clone())
    }

    fn source_contains(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &E> + '_> {
        Box::new(self.iter())
    }
}

impl<'a, E, B: ElementBackend<E>> IntoIterator for &'a Elements<E, B> {
    type Item = &'a E;
    type IntoIter = B::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Cursor
// =============================================================================

mod sealed {
    use super::{ElementBackend, Elements};

    /// Leading and trailing elements hidden by a sub-list.
    ///
    /// Hides count from the ends, so insertions and removals inside the window
    /// never change them; only removals outside the window (conflicts) do.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Window {
        pub(crate) head_hide: usize,
        pub(crate) tail_hide: usize,
    }

    pub trait Host {
        type Element;
        type Backend: ElementBackend<Self::Element>;

        fn root(&self) -> &Elements<Self::Element, Self::Backend>;

        /// The root plus every window that must follow conflict removals.
        fn parts(&mut self) -> (&mut Elements<Self::Element, Self::Backend>, Vec<&mut Window>);
    }
}

/// A root container or a [`SubList`] an [`ElementsCursor`] can walk and
/// edit.
pub trait ElementsView: sealed::Host {}

impl<T: sealed::Host + ?Sized> ElementsView for T {}

impl<E, B: ElementBackend<E>> sealed::Host for Elements<E, B> {
    type Element = E;
    type Backend = B;

    #[inline]
    fn root(&self) -> &Elements<E, B> {
        self
    }

    #[inline]
    fn parts(&mut self) -> (&mut Elements<E, B>, Vec<&mut Window>) {
        (self, Vec::new())
    }
}

/// Element type of a view.
type ViewElement<S> = <S as sealed::Host>::Element;

/// Detached, fail-fast, bidirectional cursor over an [`Elements`] container
/// or one of its sub-lists.
///
/// Like [`EntriesCursor`](crate::EntriesCursor) it does not borrow the
/// container. Edits made through it (`remove`, `set`, `add`) keep it valid,
/// including conflict removals elsewhere in a unique sequence; any other
/// structural change makes the next step fail with
/// [`Error::ConcurrentModification`].
///
/// ```
/// use nexus_txcollections::LinkedElements;
///
/// let mut list = LinkedElements::<u32>::builder().build().unwrap();
/// list.add_all(0..6).unwrap();
///
/// let mut cursor = list.cursor();
/// while let Some(&e) = cursor.next(&list).unwrap() {
///     if e % 2 == 0 {
///         cursor.remove(&mut list).unwrap();
///     } else {
///         cursor.add(&mut list, e * 10).unwrap();
///     }
/// }
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 10, 3, 30, 5, 50]);
/// ```
#[derive(Debug, Clone)]
pub struct ElementsCursor {
    window: Window,
    index: usize,
    last: Option<usize>,
    expected_mod_count: u64,
}

/// Re-bases a cursor's positions when conflicts are deleted.
struct CursorRebase {
    head_hide: usize,
    index: usize,
    last: Option<usize>,
}

impl ElementsConflictHandler for CursorRebase {
    type Resolving = ();

    fn resolving(&mut self, _: usize, conflicts: &BTreeSet<usize>) {
        let head = self.head_hide;
        self.index -= conflicts.range(head..head + self.index).count();
        self.last = self.last.and_then(|last| {
            let abs = head + last;
            (!conflicts.contains(&abs)).then(|| last - conflicts.range(head..abs).count())
        });
    }

    fn resolved(&mut self, _: ()) {}
}

impl ElementsCursor {
    pub(crate) fn new<E, B: ElementBackend<E>>(elements: &Elements<E, B>, window: Window) -> Self {
        Self {
            window,
            index: 0,
            last: None,
            expected_mod_count: elements.root.mod_count,
        }
    }

    fn check<E, B>(&self, elements: &Elements<E, B>) -> Result<()> {
        if elements.root.mod_count != self.expected_mod_count {
            return Err(Error::ConcurrentModification);
        }
        Ok(())
    }

    fn rebase(&self) -> CursorRebase {
        CursorRebase {
            head_hide: self.window.head_hide,
            index: self.index,
            last: self.last,
        }
    }

    /// Window-relative index of the element [`next`](Self::next) returns.
    #[inline]
    pub fn next_index(&self) -> usize {
        self.index
    }

    /// Returns `true` if [`next`](Self::next) would return an element.
    pub fn has_next<S: ElementsView + ?Sized>(&self, view: &S) -> bool {
        self.window
            .size(view.root().len())
            .is_ok_and(|size| self.index < size)
    }

    /// Returns `true` if [`previous`](Self::previous) would return an
    /// element.
    #[inline]
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    /// Advances to the next element.
    #[allow(clippy::should_implement_trait)]
    pub fn next<'a, S: ElementsView + ?Sized>(&mut self, view: &'a S) -> Result<Option<&'a ViewElement<S>>> {
        let elements = view.root();
        self.check(elements)?;
        match elements.get_in(self.window, self.index) {
            Some(e) => {
                self.last = Some(self.index);
                self.index += 1;
                Ok(Some(e))
            }
            None => {
                self.last = None;
                Ok(None)
            }
        }
    }

    /// Steps back to the previous element.
    pub fn previous<'a, S: ElementsView + ?Sized>(&mut self, view: &'a S) -> Result<Option<&'a ViewElement<S>>> {
        let elements = view.root();
        self.check(elements)?;
        let Some(index) = self.index.checked_sub(1) else {
            self.last = None;
            return Ok(None);
        };
        let e = elements.get_in(self.window, index).ok_or(Error::NoSuchElement)?;
        self.index = index;
        self.last = Some(index);
        Ok(Some(e))
    }

    /// Removes the element last returned.
    pub fn remove<S>(&mut self, view: &mut S) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
    {
        self.remove_impl::<S, NoHandler>(view, None)
    }

    /// [`remove`](Self::remove) observed by `handler`.
    pub fn remove_with<S, H>(&mut self, view: &mut S, handler: &mut H) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        self.remove_impl(view, Some(handler))
    }

    fn remove_impl<S, H>(&mut self, view: &mut S, handler: Option<&mut H>) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        let (elements, _) = view.parts();
        self.check(elements)?;
        let last = self.last.ok_or(Error::NoSuchElement)?;
        let removed = elements.remove_at_in(self.window, last, handler)?;
        if last < self.index {
            self.index -= 1;
        }
        self.last = None;
        self.expected_mod_count = elements.root.mod_count;
        Ok(removed)
    }

    /// Replaces the element last returned.
    pub fn set<S>(&mut self, view: &mut S, element: ViewElement<S>) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
    {
        self.set_impl::<S, NoHandler>(view, element, None)
    }

    /// [`set`](Self::set) observed by `handler`.
    pub fn set_with<S, H>(&mut self, view: &mut S, element: ViewElement<S>, handler: &mut H) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        self.set_impl(view, element, Some(handler))
    }

    fn set_impl<S, H>(&mut self, view: &mut S, element: ViewElement<S>, handler: Option<&mut H>) -> Result<ViewElement<S>>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        let (elements, mut outers) = view.parts();
        self.check(elements)?;
        let last = self.last.ok_or(Error::NoSuchElement)?;
        let mut rebase = self.rebase();
        let mut window = self.window;
        let old = elements.set_in(&mut window, &mut outers, last, element, handler, Some(&mut rebase))?;
        self.window = window;
        self.index = rebase.index;
        self.last = rebase.last;
        self.expected_mod_count = elements.root.mod_count;
        Ok(old)
    }

    /// Inserts `element` before the cursor; [`next`](Self::next) is not
    /// affected by it.
    pub fn add<S>(&mut self, view: &mut S, element: ViewElement<S>) -> Result<()>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
    {
        self.add_impl::<S, NoHandler>(view, element, None)
    }

    /// [`add`](Self::add) observed by `handler`.
    pub fn add_with<S, H>(&mut self, view: &mut S, element: ViewElement<S>, handler: &mut H) -> Result<()>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        self.add_impl(view, element, Some(handler))
    }

    fn add_impl<S, H>(&mut self, view: &mut S, element: ViewElement<S>, handler: Option<&mut H>) -> Result<()>
    where
        S: ElementsView + ?Sized,
        ViewElement<S>: Clone,
        H: ElementsHandler<ViewElement<S>> + ?Sized,
    {
        let (elements, mut outers) = view.parts();
        self.check(elements)?;
        let mut rebase = self.rebase();
        let mut window = self.window;
        elements.insert_in(&mut window, &mut outers, self.index, element, None, handler, Some(&mut rebase))?;
        self.window = window;
        self.index = rebase.index + 1;
        self.last = None;
        self.expected_mod_count = elements.root.mod_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use pretty_assertions::assert_eq;

    fn unique() -> ArrayElements<char> {
        ArrayElements::builder().bidi(BidiType::AllValues).build().unwrap()
    }

    fn text<B: ElementBackend<char>>(list: &Elements<char, B>) -> String {
        list.iter().collect()
    }

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
        conflicts: Vec<Vec<usize>>,
        fail_adding: bool,
    }

    impl ElementsHandler<char> for Log {
        type Argument = ();

        fn create_adding_argument(&mut self, _: usize, _: &char) -> Option<()> {
            Some(())
        }

        fn create_changing_argument(&mut self, _: usize, _: usize, _: &char, _: &char) -> Option<()> {
            Some(())
        }

        fn create_removing_argument(&mut self, _: usize, _: &char) -> Option<()> {
            Some(())
        }

        fn adding(&mut self, index: usize, e: &char, _: &mut ()) -> core::result::Result<(), BoxError> {
            self.events.push(format!("adding {e}@{index}"));
            if self.fail_adding {
                return Err("no".into());
            }
            Ok(())
        }

        fn added(&mut self, index: usize, e: &char, _: Option<&mut ()>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("added {e}@{index}"));
            Ok(())
        }

        fn changing(
            &mut self,
            oi: usize,
            ni: usize,
            oe: &char,
            ne: &char,
            _: &mut (),
        ) -> core::result::Result<(), BoxError> {
            self.events.push(format!("changing {oe}@{oi}->{ne}@{ni}"));
            Ok(())
        }

        fn changed(
            &mut self,
            oi: usize,
            ni: usize,
            oe: &char,
            ne: &char,
            _: Option<&mut ()>,
        ) -> core::result::Result<(), BoxError> {
            self.events.push(format!("changed {oe}@{oi}->{ne}@{ni}"));
            Ok(())
        }

        fn removing(&mut self, index: usize, e: &char, _: &mut ()) -> core::result::Result<(), BoxError> {
            self.events.push(format!("removing {e}@{index}"));
            Ok(())
        }

        fn removed(&mut self, index: usize, e: &char, _: Option<&mut ()>) -> core::result::Result<(), BoxError> {
            self.events.push(format!("removed {e}@{index}"));
            Ok(())
        }

        fn set_conflict_abs_indexes(&mut self, conflicts: &BTreeSet<usize>) {
            self.conflicts.push(conflicts.iter().copied().collect());
        }
    }

    #[test]
    fn positional_editing() {
        let mut list: ArrayElements<i32> = ArrayElements::builder().build().unwrap();
        list.add_all([1, 2, 4]).unwrap();
        list.insert(2, 3).unwrap();
        assert_eq!(list.set(0, 0).unwrap(), 1);
        assert_eq!(list.remove_at(3).unwrap(), 4);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 2, 3]);
        assert!(matches!(
            list.insert(9, 9),
            Err(Error::IndexOutOfBounds { index: 9, len: 3 })
        ));
        assert!(matches!(list.remove_at(3), Err(Error::IndexOutOfBounds { .. })));
        assert_eq!(list.get(3), None);
        assert_eq!(list.first(), Some(&0));
        assert_eq!(list.last(), Some(&3));
    }

    #[test]
    fn duplicates_are_allowed_without_bidi() {
        let mut list: LinkedElements<i32> = LinkedElements::builder().build().unwrap();
        list.add_all([1, 2, 1, 2]).unwrap();
        assert_eq!(list.index_of(&2), Some(1));
        assert_eq!(list.last_index_of(&2), Some(3));
        assert!(list.remove(&1).unwrap());
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [2, 1, 2]);
    }

    #[test]
    fn unique_insert_moves_the_element() {
        let mut list = unique();
        list.add_all("abcd".chars()).unwrap();
        let mut log = Log::default();
        list.insert_with(3, 'a', &mut log).unwrap();
        assert_eq!(text(&list), "bcad");
        assert_eq!(log.conflicts, [vec![0]]);
        assert_eq!(
            log.events,
            ["removing a@0", "adding a@2", "removed a@0", "added a@2"]
        );
        assert!(list.contains(&'a'));
    }

    #[test]
    fn unique_set_keeps_its_own_slot() {
        let mut list = unique();
        list.add_all("abcd".chars()).unwrap();
        // Same element at the same slot: no conflict.
        assert_eq!(list.set(1, 'b').unwrap(), 'b');
        let mut log = Log::default();
        assert_eq!(list.set_with(3, 'a', &mut log).unwrap(), 'd');
        assert_eq!(text(&list), "bca");
        assert_eq!(log.events[1], "changing d@3->a@2");
        assert!(!list.contains(&'d'));
    }

    #[test]
    fn unique_add_all_dedups_and_removes_conflicts() {
        let mut list = unique();
        list.add_all("abc".chars()).unwrap();
        list.add_all("cxcb".chars()).unwrap();
        // Input keeps its first 'c'; the stored 'b' and 'c' are conflicts.
        assert_eq!(text(&list), "acxb");
    }

    #[test]
    fn failed_pre_callback_leaves_sequence_untouched() {
        let mut list = unique();
        list.add_all("ab".chars()).unwrap();
        let mut log = Log {
            fail_adding: true,
            ..Default::default()
        };
        let err = list.add_with('a', &mut log).unwrap_err();
        assert!(err.as_handler().is_some());
        assert_eq!(text(&list), "ab");
        assert_eq!(
            log.events,
            ["removing a@0", "adding a@1", "removed a@0", "added a@1"]
        );
    }

    #[test]
    fn manual_conflict() {
        let mut list: ArrayElements<char> = ArrayElements::builder().build().unwrap();
        list.add_all("abc".chars()).unwrap();
        list.add_replacing(&'b', 'z').unwrap();
        assert_eq!(text(&list), "acz");
        assert!(matches!(
            unique().add_replacing(&'a', 'b'),
            Err(Error::ManualConflictWithBidi)
        ));
    }

    #[test]
    fn bulk_removal_and_retention() {
        let mut list: ArrayElements<i32> = ArrayElements::builder().build().unwrap();
        list.add_all(0..10).unwrap();
        assert!(list.remove_all(&vec![1, 3, 5]).unwrap());
        assert!(!list.remove_all(&vec![42]).unwrap());
        assert!(list.retain_all(&std::collections::HashSet::from([0, 2, 4, 9])).unwrap());
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 2, 4, 9]);
        assert!(list.contains_all(&vec![2, 9]));
        assert!(!list.contains_all(&vec![2, 3]));
    }

    #[test]
    fn clear_notifies_every_element() {
        let mut list = unique();
        list.add_all("abc".chars()).unwrap();
        let mut log = Log::default();
        list.clear_with(&mut log).unwrap();
        assert!(list.is_empty());
        assert!(!list.contains(&'a'));
        assert_eq!(log.events.len(), 6);
        assert_eq!(log.events[0], "removing a@0");
    }

    #[test]
    fn frozen_container_rejects_mutation() {
        let mut list = unique();
        list.freeze();
        assert!(matches!(list.add('a'), Err(Error::Frozen)));
        assert!(matches!(list.clear(), Err(Error::Frozen)));
        list.unfreeze().unwrap();
        list.add('a').unwrap();
    }

    #[test]
    fn validator_rejects_before_mutation() {
        let mut list: ArrayElements<i32> = ArrayElements::builder()
            .validator(Validator::new(|v: &i32| {
                if *v >= 0 { Ok(()) } else { Err("negative".into()) }
            }))
            .build()
            .unwrap();
        assert!(matches!(list.add_all([1, -1]), Err(Error::Validation(_))));
        assert!(list.is_empty());
    }

    #[test]
    fn non_null_elements_may_repeat() {
        let mut list: ArrayElements<Option<u8>> = ArrayElements::builder()
            .bidi(BidiType::NonNullValues)
            .null_value(Option::is_none)
            .build()
            .unwrap();
        list.add_all([None, Some(1), None, Some(1)]).unwrap();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [None, Some(1), None]);
    }

    #[test]
    fn inverse_follows_inserts_and_removals() {
        let mut list: LinkedElements<Option<u8>> = LinkedElements::builder()
            .bidi(BidiType::NonNullValues)
            .null_value(Option::is_none)
            .build()
            .unwrap();
        let indexed = |list: &LinkedElements<Option<u8>>, e: Option<u8>| {
            list.root.inverse.as_ref().is_some_and(|i| i.contains_key(&e))
        };
        list.add_all([None, Some(1), Some(2)]).unwrap();
        assert!(indexed(&list, Some(1)) && indexed(&list, Some(2)));
        assert!(!indexed(&list, None));

        assert!(list.remove(&Some(1)).unwrap());
        assert!(!indexed(&list, Some(1)));
        list.add(Some(1)).unwrap();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [None, Some(2), Some(1)]);

        list.add(Some(2)).unwrap();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [None, Some(1), Some(2)]);
        assert_eq!(list.remove_at(0).unwrap(), None);
        assert!(indexed(&list, Some(1)) && indexed(&list, Some(2)));

        list.clear().unwrap();
        assert!(!indexed(&list, Some(1)) && !indexed(&list, Some(2)));
    }

    #[test]
    fn cursor_edits_and_fail_fast() {
        let mut list = unique();
        list.add_all("abcde".chars()).unwrap();
        let mut cursor = list.cursor();
        assert_eq!(cursor.next(&list).unwrap(), Some(&'a'));
        assert_eq!(cursor.next(&list).unwrap(), Some(&'b'));
        // 'e' is a conflict behind the cursor; the cursor keeps its place.
        cursor.add(&mut list, 'e').unwrap();
        assert_eq!(text(&list), "abecd");
        assert_eq!(cursor.next(&list).unwrap(), Some(&'c'));
        // 'a' is a conflict in front of the cursor.
        assert_eq!(cursor.set(&mut list, 'a').unwrap(), 'c');
        assert_eq!(text(&list), "bead");
        assert_eq!(cursor.next(&list).unwrap(), Some(&'d'));
        assert_eq!(cursor.previous(&list).unwrap(), Some(&'d'));
        assert_eq!(cursor.remove(&mut list).unwrap(), 'd');
        assert!(!cursor.has_next(&list));

        let stale = list.cursor();
        list.add('z').unwrap();
        let mut stale = stale;
        assert!(matches!(stale.next(&list), Err(Error::ConcurrentModification)));
        assert!(matches!(cursor.remove(&mut list), Err(Error::ConcurrentModification)));
    }

    #[test]
    fn window_rebase() {
        let mut w = Window::new(3, 2);
        // 10 elements: hidden head 0..3, visible 3..8, hidden tail 8..10.
        w.rebase(10, &BTreeSet::from([1, 4, 9]));
        assert_eq!(w, Window::new(2, 1));
        assert!(matches!(Window::new(3, 3).size(5), Err(Error::InvalidWindow { .. })));
    }
}
