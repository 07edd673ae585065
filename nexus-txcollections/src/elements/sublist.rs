//! Live windows over a sequence.
//!
//! A [`SubList`] hides a number of leading and trailing elements of its
//! parent instead of copying a range. Indexes taken and returned by its
//! operations are relative to the window; indexes reported to handlers are
//! absolute.
//!
//! Conflict removals in a unique sequence may delete elements outside the
//! window. Every such operation shrinks the hides of the window it was made
//! through and of every enclosing window, so nested views stay aligned.
//!
//! ```
//! use nexus_txcollections::{ArrayElements, BidiType};
//!
//! let mut list = ArrayElements::<char>::builder()
//!     .bidi(BidiType::AllValues)
//!     .build()
//!     .unwrap();
//! list.add_all("abcdef".chars()).unwrap();
//!
//! let mut sub = list.sub_list(2, 5).unwrap(); // "cde"
//! sub.add('a').unwrap();                      // 'a' leaves the hidden head
//! assert_eq!(sub.iter().collect::<String>(), "cdea");
//! assert_eq!(sub.head_hide(), 1);
//!
//! drop(sub);
//! assert_eq!(list.iter().collect::<String>(), "bcdeaf");
//! ```

use core::fmt;

use super::{sealed, sub_window, ElementBackend, Elements, ElementsCursor, Window};
use crate::contains::ContainsSource;
use crate::handler::{ElementsConflictHandler, ElementsHandler, NoHandler};
use crate::Result;

/// A mutable window over an [`Elements`] container or another sub-list.
pub struct SubList<'a, E, B> {
    elements: &'a mut Elements<E, B>,
    window: Window,
    outers: Vec<&'a mut Window>,
}

impl<'a, E, B: ElementBackend<E>> SubList<'a, E, B> {
    pub(crate) fn new(elements: &'a mut Elements<E, B>, window: Window, outers: Vec<&'a mut Window>) -> Self {
        Self {
            elements,
            window,
            outers,
        }
    }

    /// Elements of the parent hidden before the window.
    #[inline]
    pub fn head_hide(&self) -> usize {
        self.window.head_hide
    }

    /// Elements of the parent hidden after the window.
    #[inline]
    pub fn tail_hide(&self) -> usize {
        self.window.tail_hide
    }

    /// Number of visible elements.
    ///
    /// A window left inconsistent by outside edits reports zero; every
    /// other operation reports [`Error::InvalidWindow`](crate::Error::InvalidWindow).
    pub fn len(&self) -> usize {
        self.window.size(self.elements.len()).unwrap_or(0)
    }

    /// Returns `true` if no element is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.elements.get_in(self.window, index)
    }

    /// First visible element.
    pub fn first(&self) -> Option<&E> {
        self.get(0)
    }

    /// Last visible element.
    pub fn last(&self) -> Option<&E> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterates the visible elements.
    pub fn iter(&self) -> B::Iter<'_> {
        let start = self.window.head_hide;
        self.elements.backend.iter_range(start, start + self.len())
    }

    /// Index of the first visible element equal to `element`.
    pub fn index_of(&self, element: &E) -> Option<usize> {
        self.elements.index_of_in(self.window, element)
    }

    /// Index of the last visible element equal to `element`.
    pub fn last_index_of(&self, element: &E) -> Option<usize> {
        self.elements.last_index_of_in(self.window, element)
    }

    /// Returns `true` if a visible element equals `element`.
    pub fn contains(&self, element: &E) -> bool {
        self.elements.contains_in(self.window, element)
    }

    /// Returns `true` if every item of `other` is visible.
    pub fn contains_all<C>(&self, other: &C) -> bool
    where
        C: ContainsSource<E> + ?Sized,
    {
        other.source_iter().all(|e| self.contains(e))
    }

    /// The container's modification counter.
    #[inline]
    pub fn mod_count(&self) -> u64 {
        self.elements.mod_count()
    }

    /// A fail-fast cursor positioned before the first visible element.
    pub fn cursor(&self) -> ElementsCursor {
        ElementsCursor::new(&*self.elements, self.window)
    }
}

impl<E, B> SubList<'_, E, B>
where
    E: Clone,
    B: ElementBackend<E>,
{
    /// Appends `element` after the last visible element.
    pub fn add(&mut self, element: E) -> Result<()> {
        let index = self.window.size(self.elements.len())?;
        self.insert(index, element)
    }

    /// [`add`](Self::add) observed by `handler`.
    pub fn add_with<H>(&mut self, element: E, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        let index = self.window.size(self.elements.len())?;
        self.insert_with(index, element, handler)
    }

    /// Inserts `element` before `index`.
    pub fn insert(&mut self, index: usize, element: E) -> Result<()> {
        self.elements.insert_in::<NoHandler, NoHandler>(
            &mut self.window,
            &mut self.outers,
            index,
            element,
            None,
            None,
            None,
        )
    }

    /// [`insert`](Self::insert) observed by `handler`.
    pub fn insert_with<H>(&mut self, index: usize, element: E, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.insert_in::<H, NoHandler>(
            &mut self.window,
            &mut self.outers,
            index,
            element,
            None,
            Some(handler),
            None,
        )
    }

    /// [`insert`](Self::insert) with a conflict handler.
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
        self.elements.insert_in(
            &mut self.window,
            &mut self.outers,
            index,
            element,
            None,
            handler,
            Some(resolver),
        )
    }

    /// Appends every item after the last visible element.
    pub fn add_all<I>(&mut self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
    {
        let index = self.window.size(self.elements.len())?;
        self.insert_all(index, items)
    }

    /// Inserts every item, in order, before `index`.
    pub fn insert_all<I>(&mut self, index: usize, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
    {
        let items = items.into_iter().collect();
        self.elements
            .insert_all_in::<NoHandler, NoHandler>(&mut self.window, &mut self.outers, index, items, None, None)
    }

    /// [`insert_all`](Self::insert_all) observed by `handler`.
    pub fn insert_all_with<I, H>(&mut self, index: usize, items: I, handler: &mut H) -> Result<bool>
    where
        I: IntoIterator<Item = E>,
        H: ElementsHandler<E> + ?Sized,
    {
        let items = items.into_iter().collect();
        self.elements.insert_all_in::<H, NoHandler>(
            &mut self.window,
            &mut self.outers,
            index,
            items,
            Some(handler),
            None,
        )
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, element: E) -> Result<E> {
        self.elements
            .set_in::<NoHandler, NoHandler>(&mut self.window, &mut self.outers, index, element, None, None)
    }

    /// [`set`](Self::set) observed by `handler`.
    pub fn set_with<H>(&mut self, index: usize, element: E, handler: &mut H) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.set_in::<H, NoHandler>(
            &mut self.window,
            &mut self.outers,
            index,
            element,
            Some(handler),
            None,
        )
    }

    /// Removes the element at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<E> {
        self.elements.remove_at_in::<NoHandler>(self.window, index, None)
    }

    /// [`remove_at`](Self::remove_at) observed by `handler`.
    pub fn remove_at_with<H>(&mut self, index: usize, handler: &mut H) -> Result<E>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.remove_at_in(self.window, index, Some(handler))
    }

    /// Removes the first visible element equal to `element`.
    pub fn remove(&mut self, element: &E) -> Result<bool> {
        self.elements.remove_in::<NoHandler>(self.window, element, None)
    }

    /// [`remove`](Self::remove) observed by `handler`.
    pub fn remove_with<H>(&mut self, element: &E, handler: &mut H) -> Result<bool>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.remove_in(self.window, element, Some(handler))
    }

    /// Removes every visible element contained in `other`.
    pub fn remove_all<C>(&mut self, other: &C) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
    {
        self.elements.filter_in::<C, NoHandler>(self.window, other, true, None)
    }

    /// [`remove_all`](Self::remove_all) observed by `handler`.
    pub fn remove_all_with<C, H>(&mut self, other: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.filter_in(self.window, other, true, Some(handler))
    }

    /// Keeps only the visible elements contained in `other`.
    pub fn retain_all<C>(&mut self, other: &C) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
    {
        self.elements.filter_in::<C, NoHandler>(self.window, other, false, None)
    }

    /// [`retain_all`](Self::retain_all) observed by `handler`.
    pub fn retain_all_with<C, H>(&mut self, other: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<E> + ?Sized,
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.filter_in(self.window, other, false, Some(handler))
    }

    /// Removes every visible element.
    pub fn clear(&mut self) -> Result<()> {
        self.elements.clear_in::<NoHandler>(self.window, None)
    }

    /// [`clear`](Self::clear) observed by `handler`.
    pub fn clear_with<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: ElementsHandler<E> + ?Sized,
    {
        self.elements.clear_in(self.window, Some(handler))
    }

    /// A nested window over `from..to` of this one.
    pub fn sub_list(&mut self, from: usize, to: usize) -> Result<SubList<'_, E, B>> {
        let window = sub_window(self.window, self.elements.len(), from, to)?;
        let mut outers: Vec<&mut Window> = self.outers.iter_mut().map(|w| &mut **w).collect();
        outers.push(&mut self.window);
        Ok(SubList::new(&mut *self.elements, window, outers))
    }
}

impl<E, B: ElementBackend<E>> sealed::Host for SubList<'_, E, B> {
    type Element = E;
    type Backend = B;

    #[inline]
    fn root(&self) -> &Elements<E, B> {
        &*self.elements
    }

    fn parts(&mut self) -> (&mut Elements<E, B>, Vec<&mut Window>) {
        let mut windows: Vec<&mut Window> = self.outers.iter_mut().map(|w| &mut **w).collect();
        windows.push(&mut self.window);
        (&mut *self.elements, windows)
    }
}

impl<E: fmt::Debug, B: ElementBackend<E>> fmt::Debug for SubList<'_, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<E, B: ElementBackend<E>> ContainsSource<E> for SubList<'_, E, B> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<crate::UnifiedComparator<E>> {
        None
    }

    fn source_contains(&self, item: &E) -> bool {
        self.contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &E> + '_> {
        Box::new(self.iter())
    }
}
