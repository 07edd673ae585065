//! Bounded and reversed views over a [`RedBlackTreeEntries`] container.
//!
//! A [`SubTree`] pairs a mutable borrow of the root container with a
//! [`NavigableRange`]. Keys, navigation and iteration are reported in the
//! view's *logical* order; a descending view's first entry is the root's
//! last entry within bounds.
//!
//! The lowest and highest entries inside the bounds and the entry count are
//! computed on demand and cached until the root's modification counter
//! moves. Counting uses the tree's subtree sizes, so `len` is `O(log n)`
//! after any mutation.
//!
//! ```
//! use nexus_txcollections::RedBlackTreeEntries;
//!
//! let mut tree = RedBlackTreeEntries::<i32, &str>::builder().build().unwrap();
//! tree.put_all((0..10).map(|k| (k, "v"))).unwrap();
//!
//! let mut view = tree.sub_map(2, true, 8, false).unwrap();
//! assert_eq!(view.len(), 6);
//! assert_eq!(view.floor(&100).map(|(k, _)| *k), Some(7));
//! assert!(view.put(8, "out").is_err());
//!
//! let desc = view.descending();
//! assert_eq!(desc.keys().copied().collect::<Vec<_>>(), [7, 6, 5, 4, 3, 2]);
//! ```

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

use tracing::{debug, trace};

use super::{EntryBackend, Iter, RedBlackTree, RedBlackTreeEntries};
use crate::contains::ContainsSource;
use crate::handler::{EntriesHandler, NoHandler};
use crate::{EntryId, NavigableRange, Result, UnifiedComparator};

/// Extremes and size of a view, valid for one modification count.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    mod_count: u64,
    /// Absolute lowest entry inside the range.
    lowest: Option<EntryId>,
    /// Absolute highest entry inside the range.
    highest: Option<EntryId>,
    size: usize,
}

/// A ranged and/or reversed view of a [`RedBlackTreeEntries`] container.
///
/// Created by [`Entries::descending`](super::Entries::descending),
/// [`sub_map`](super::Entries::sub_map),
/// [`head_map`](super::Entries::head_map) and
/// [`tail_map`](super::Entries::tail_map), or by narrowing another view.
/// Mutations go to the root container; puts outside the bounds fail with
/// [`Error::KeyOutOfRange`](crate::Error::KeyOutOfRange).
pub struct SubTree<'a, K, V> {
    entries: &'a mut RedBlackTreeEntries<K, V>,
    range: NavigableRange<K>,
    bounds: Cell<Option<Bounds>>,
}

impl<'a, K, V> SubTree<'a, K, V> {
    fn new(entries: &'a mut RedBlackTreeEntries<K, V>, range: NavigableRange<K>) -> Self {
        Self {
            entries,
            range,
            bounds: Cell::new(None),
        }
    }

    #[inline]
    fn tree(&self) -> &RedBlackTree<K, V> {
        &self.entries.backend
    }

    #[inline]
    fn pair(&self, id: EntryId) -> (&K, &V) {
        (self.tree().key(id), self.tree().value(id))
    }

    fn bounds(&self) -> Bounds {
        let mod_count = self.entries.mod_count();
        if let Some(bounds) = self.bounds.get() {
            if bounds.mod_count == mod_count {
                return bounds;
            }
        }
        let tree = self.tree();
        let range = &self.range;
        let lowest = match range.from(true) {
            Some(from) => tree.ceiling(&from.key, from.inclusive),
            None => tree.first(),
        }
        .filter(|id| !range.too_high(tree.key(*id), true));
        let highest = match range.to(true) {
            Some(to) => tree.floor(&to.key, to.inclusive),
            None => tree.last(),
        }
        .filter(|id| !range.too_low(tree.key(*id), true));
        let size = match (lowest, highest) {
            (Some(lo), Some(hi)) => {
                let (lo, hi) = (tree.rank(lo), tree.rank(hi));
                if lo <= hi { hi - lo + 1 } else { 0 }
            }
            _ => 0,
        };
        let bounds = Bounds {
            mod_count,
            lowest,
            highest,
            size,
        };
        trace!(mod_count, size, "sub-tree bounds recomputed");
        self.bounds.set(Some(bounds));
        bounds
    }

    /// Smallest absolute entry `>= key` inside the range.
    fn abs_ceiling(&self, key: &K, inclusive: bool) -> Option<EntryId> {
        if self.range.too_low(key, true) {
            return self.bounds().lowest;
        }
        let tree = self.tree();
        tree.ceiling(key, inclusive)
            .filter(|id| !self.range.too_high(tree.key(*id), true))
    }

    /// Largest absolute entry `<= key` inside the range.
    fn abs_floor(&self, key: &K, inclusive: bool) -> Option<EntryId> {
        if self.range.too_high(key, true) {
            return self.bounds().highest;
        }
        let tree = self.tree();
        tree.floor(key, inclusive)
            .filter(|id| !self.range.too_low(tree.key(*id), true))
    }

    fn navigate(&self, key: &K, below: bool, inclusive: bool) -> Option<(&K, &V)> {
        let id = if below != self.range.is_descending() {
            self.abs_floor(key, inclusive)
        } else {
            self.abs_ceiling(key, inclusive)
        };
        id.map(|id| self.pair(id))
    }

    fn first_id(&self) -> Option<EntryId> {
        let bounds = self.bounds();
        if self.range.is_descending() { bounds.highest } else { bounds.lowest }
    }

    fn last_id(&self) -> Option<EntryId> {
        let bounds = self.bounds();
        if self.range.is_descending() { bounds.lowest } else { bounds.highest }
    }

    fn find(&self, key: &K) -> Option<EntryId> {
        if !self.range.contains(key) {
            return None;
        }
        self.tree().find(key)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The view's bounds and direction.
    #[inline]
    pub fn range(&self) -> &NavigableRange<K> {
        &self.range
    }

    /// Returns `true` if the view iterates against the root's order.
    #[inline]
    pub fn is_descending(&self) -> bool {
        self.range.is_descending()
    }

    /// Number of entries inside the bounds.
    pub fn len(&self) -> usize {
        if self.range.is_unbounded() {
            return self.entries.len();
        }
        self.bounds().size
    }

    /// Returns `true` if no entry lies inside the bounds.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for `key`, if `key` is inside the bounds.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|id| self.tree().value(id))
    }

    /// Returns `true` if `key` is inside the bounds and present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// First entry in view order.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.first_id().map(|id| self.pair(id))
    }

    /// Last entry in view order.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.last_id().map(|id| self.pair(id))
    }

    /// Greatest entry at or before `key` in view order.
    pub fn floor(&self, key: &K) -> Option<(&K, &V)> {
        self.navigate(key, true, true)
    }

    /// Greatest entry strictly before `key` in view order.
    pub fn lower(&self, key: &K) -> Option<(&K, &V)> {
        self.navigate(key, true, false)
    }

    /// Least entry at or after `key` in view order.
    pub fn ceiling(&self, key: &K) -> Option<(&K, &V)> {
        self.navigate(key, false, true)
    }

    /// Least entry strictly after `key` in view order.
    pub fn higher(&self, key: &K) -> Option<(&K, &V)> {
        self.navigate(key, false, false)
    }

    /// Position of `key` in view order.
    pub fn rank(&self, key: &K) -> Option<usize> {
        let id = self.find(key)?;
        let bounds = self.bounds();
        let tree = self.tree();
        let offset = tree.rank(id) - tree.rank(bounds.lowest?);
        Some(if self.range.is_descending() {
            bounds.size - 1 - offset
        } else {
            offset
        })
    }

    /// Entry at position `rank` in view order.
    pub fn select(&self, rank: usize) -> Option<(&K, &V)> {
        let bounds = self.bounds();
        if rank >= bounds.size {
            return None;
        }
        let offset = if self.range.is_descending() {
            bounds.size - 1 - rank
        } else {
            rank
        };
        let tree = self.tree();
        tree.select(tree.rank(bounds.lowest?) + offset)
            .map(|id| self.pair(id))
    }

    /// Iterates entries in view order.
    pub fn iter(&self) -> SubTreeIter<'_, K, V> {
        let bounds = self.bounds();
        SubTreeIter {
            inner: Iter {
                backend: self.tree(),
                front: bounds.lowest,
                back: bounds.highest,
                remaining: bounds.size,
                _marker: PhantomData,
            },
            descending: self.range.is_descending(),
        }
    }

    /// Iterates keys in view order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterates values in view order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    fn ids(&self) -> Vec<EntryId> {
        let bounds = self.bounds();
        let tree = self.tree();
        let descending = self.range.is_descending();
        let start = if descending { bounds.highest } else { bounds.lowest };
        core::iter::successors(start, |id| if descending { tree.prev(*id) } else { tree.next(*id) })
            .take(bounds.size)
            .collect()
    }
}

impl<K: Clone, V> SubTree<'_, K, V> {
    // =========================================================================
    // Narrowing
    // =========================================================================

    /// The same bounds in the opposite direction.
    pub fn descending(&mut self) -> SubTree<'_, K, V> {
        let range = NavigableRange::descending_range(&self.range);
        SubTree::new(&mut *self.entries, range)
    }

    /// Entries between `from` and `to` in view order.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalRange`](crate::Error::IllegalRange) if `from` comes
    /// after `to`, [`Error::KeyOutOfRange`](crate::Error::KeyOutOfRange) if
    /// either bound lies outside this view.
    pub fn sub_map(&mut self, from: K, from_inclusive: bool, to: K, to_inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.range, Some((from, from_inclusive)), Some((to, to_inclusive)))?;
        Ok(SubTree::new(&mut *self.entries, range))
    }

    /// Entries before `to` in view order.
    pub fn head_map(&mut self, to: K, inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.range, None, Some((to, inclusive)))?;
        Ok(SubTree::new(&mut *self.entries, range))
    }

    /// Entries after `from` in view order.
    pub fn tail_map(&mut self, from: K, inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.range, Some((from, inclusive)), None)?;
        Ok(SubTree::new(&mut *self.entries, range))
    }
}

impl<K: Clone, V: Clone> SubTree<'_, K, V> {
    // =========================================================================
    // Mutation
    // =========================================================================

    /// Maps `key` to `value` in the root container.
    ///
    /// # Errors
    ///
    /// [`Error::KeyOutOfRange`](crate::Error::KeyOutOfRange) if `key` lies
    /// outside the bounds, plus everything
    /// [`Entries::put`](super::Entries::put) returns.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.put_impl::<NoHandler>(key, value, None, None)
    }

    /// [`put`](Self::put) observed by `handler`.
    pub fn put_with<H>(&mut self, key: K, value: V, handler: &mut H) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.put_impl(key, value, None, Some(handler))
    }

    /// See [`Entries::put_replacing`](super::Entries::put_replacing). Only
    /// `key` has to lie inside the bounds.
    pub fn put_replacing(&mut self, conflict: &K, key: K, value: V) -> Result<Option<V>> {
        self.put_impl::<NoHandler>(key, value, Some(conflict), None)
    }

    /// [`put_replacing`](Self::put_replacing) observed by `handler`.
    pub fn put_replacing_with<H>(&mut self, conflict: &K, key: K, value: V, handler: &mut H) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.put_impl(key, value, Some(conflict), Some(handler))
    }

    fn put_impl<H>(&mut self, key: K, value: V, conflict: Option<&K>, handler: Option<&mut H>) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        if !self.range.contains(&key) {
            return Err(self.range.out_of_range());
        }
        self.entries.put_impl(key, value, conflict, handler, None)
    }

    /// Removes the entry for `key`. Keys outside the bounds are never
    /// removed.
    pub fn remove_by_key(&mut self, key: &K) -> Result<Option<(K, V)>> {
        self.remove_by_key_impl::<NoHandler>(key, None)
    }

    /// [`remove_by_key`](Self::remove_by_key) observed by `handler`.
    pub fn remove_by_key_with<H>(&mut self, key: &K, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_by_key_impl(key, Some(handler))
    }

    fn remove_by_key_impl<H>(&mut self, key: &K, handler: Option<&mut H>) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.root.freeze.check()?;
        match self.find(key) {
            Some(id) => Ok(self.entries.remove_ids(vec![id], handler, true)?.pop()),
            None => Ok(None),
        }
    }

    /// Removes the first entry in view order.
    pub fn poll_first(&mut self) -> Result<Option<(K, V)>> {
        self.poll_impl::<NoHandler>(true, None)
    }

    /// [`poll_first`](Self::poll_first) observed by `handler`.
    pub fn poll_first_with<H>(&mut self, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.poll_impl(true, Some(handler))
    }

    /// Removes the last entry in view order.
    pub fn poll_last(&mut self) -> Result<Option<(K, V)>> {
        self.poll_impl::<NoHandler>(false, None)
    }

    /// [`poll_last`](Self::poll_last) observed by `handler`.
    pub fn poll_last_with<H>(&mut self, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.poll_impl(false, Some(handler))
    }

    fn poll_impl<H>(&mut self, first: bool, handler: Option<&mut H>) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.root.freeze.check()?;
        let id = if first { self.first_id() } else { self.last_id() };
        match id {
            Some(id) => Ok(self.entries.remove_ids(vec![id], handler, true)?.pop()),
            None => Ok(None),
        }
    }

    /// Removes every entry inside the bounds, in view order.
    pub fn clear(&mut self) -> Result<()> {
        self.clear_impl::<NoHandler>(None)
    }

    /// [`clear`](Self::clear) observed by `handler`.
    pub fn clear_with<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.clear_impl(Some(handler))
    }

    fn clear_impl<H>(&mut self, handler: Option<&mut H>) -> Result<()>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.root.freeze.check()?;
        let ids = self.ids();
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), descending = self.range.is_descending(), "clearing sub-tree");
        self.entries.remove_ids(ids, handler, true).map(drop)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SubTree<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> ContainsSource<K> for SubTree<'_, K, V> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<K>> {
        Some(self.tree().unified_key_comparator())
    }

    fn source_contains(&self, item: &K) -> bool {
        self.contains_key(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &K> + '_> {
        Box::new(self.keys())
    }
}

/// Iterator over a [`SubTree`] in view order.
pub struct SubTreeIter<'a, K, V> {
    inner: Iter<'a, K, V, RedBlackTree<K, V>>,
    descending: bool,
}

impl<'a, K: 'a, V: 'a> Iterator for SubTreeIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.descending {
            self.inner.next_back()
        } else {
            self.inner.next()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a> DoubleEndedIterator for SubTreeIter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.descending {
            self.inner.next()
        } else {
            self.inner.next_back()
        }
    }
}

impl<'a, K: 'a, V: 'a> ExactSizeIterator for SubTreeIter<'a, K, V> {}

impl<'a, 'b, K: 'a, V: 'a> IntoIterator for &'b SubTree<'a, K, V> {
    type Item = (&'b K, &'b V);
    type IntoIter = SubTreeIter<'b, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Root navigation
// =============================================================================

impl<K, V> RedBlackTreeEntries<K, V> {
    fn nav_pair(&self, id: Option<EntryId>) -> Option<(&K, &V)> {
        id.map(|id| (self.backend.key(id), self.backend.value(id)))
    }

    /// Greatest entry with a key `<= key`.
    pub fn floor(&self, key: &K) -> Option<(&K, &V)> {
        self.nav_pair(self.backend.floor(key, true))
    }

    /// Greatest entry with a key `< key`.
    pub fn lower(&self, key: &K) -> Option<(&K, &V)> {
        self.nav_pair(self.backend.floor(key, false))
    }

    /// Least entry with a key `>= key`.
    pub fn ceiling(&self, key: &K) -> Option<(&K, &V)> {
        self.nav_pair(self.backend.ceiling(key, true))
    }

    /// Least entry with a key `> key`.
    pub fn higher(&self, key: &K) -> Option<(&K, &V)> {
        self.nav_pair(self.backend.ceiling(key, false))
    }

    /// Position of `key` in key order.
    pub fn rank(&self, key: &K) -> Option<usize> {
        self.backend.find(key).map(|id| self.backend.rank(id))
    }

    /// Entry at position `rank` in key order.
    pub fn select(&self, rank: usize) -> Option<(&K, &V)> {
        self.nav_pair(self.backend.select(rank))
    }
}

impl<K: Clone, V> RedBlackTreeEntries<K, V> {
    fn full_range(&self) -> NavigableRange<K> {
        NavigableRange::full(self.backend.comparator().clone())
    }

    /// Every entry in descending key order.
    pub fn descending(&mut self) -> SubTree<'_, K, V> {
        let range = NavigableRange::descending_range(&self.full_range());
        SubTree::new(self, range)
    }

    /// Entries with keys between `from` and `to`.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalRange`](crate::Error::IllegalRange) if `from` is
    /// greater than `to`.
    pub fn sub_map(&mut self, from: K, from_inclusive: bool, to: K, to_inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.full_range(), Some((from, from_inclusive)), Some((to, to_inclusive)))?;
        Ok(SubTree::new(self, range))
    }

    /// Entries with keys below `to`.
    pub fn head_map(&mut self, to: K, inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.full_range(), None, Some((to, inclusive)))?;
        Ok(SubTree::new(self, range))
    }

    /// Entries with keys above `from`.
    pub fn tail_map(&mut self, from: K, inclusive: bool) -> Result<SubTree<'_, K, V>> {
        let range = NavigableRange::sub_range(&self.full_range(), Some((from, inclusive)), None)?;
        Ok(SubTree::new(self, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::error::BoxError;
    use pretty_assertions::assert_eq;

    fn tree() -> RedBlackTreeEntries<i32, i32> {
        let mut tree = RedBlackTreeEntries::builder().build().unwrap();
        tree.put_all((0..10).map(|k| (k, k * 10))).unwrap();
        tree
    }

    fn keys(view: &SubTree<'_, i32, i32>) -> Vec<i32> {
        view.keys().copied().collect()
    }

    #[derive(Default)]
    struct Removals(Vec<i32>);

    impl EntriesHandler<i32, i32> for Removals {
        type Argument = ();

        fn create_adding_argument(&mut self, _: &i32, _: &i32) -> Option<()> {
            None
        }

        fn create_changing_argument(&mut self, _: &i32, _: &i32, _: &i32, _: &i32) -> Option<()> {
            None
        }

        fn create_removing_argument(&mut self, _: &i32, _: &i32) -> Option<()> {
            Some(())
        }

        fn removed(&mut self, k: &i32, _: &i32, _: Option<&mut ()>) -> core::result::Result<(), BoxError> {
            self.0.push(*k);
            Ok(())
        }
    }

    #[test]
    fn bounded_view_counts_and_iterates() {
        let mut tree = tree();
        let view = tree.sub_map(2, true, 8, false).unwrap();
        assert_eq!(view.len(), 6);
        assert_eq!(keys(&view), [2, 3, 4, 5, 6, 7]);
        assert_eq!(view.first(), Some((&2, &20)));
        assert_eq!(view.last(), Some((&7, &70)));
        assert!(!view.contains_key(&8));
        assert_eq!(view.get(&1), None);
        assert_eq!(view.get(&3), Some(&30));
        assert_eq!(view.iter().rev().next(), Some((&7, &70)));
    }

    #[test]
    fn empty_window_between_keys() {
        let mut tree = tree();
        tree.put(20, 0).unwrap();
        let view = tree.sub_map(10, false, 20, false).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.first(), None);
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn navigation_clamps_to_bounds() {
        let mut tree = tree();
        let view = tree.sub_map(2, true, 8, false).unwrap();
        assert_eq!(view.floor(&100).map(|(k, _)| *k), Some(7));
        assert_eq!(view.ceiling(&-5).map(|(k, _)| *k), Some(2));
        assert_eq!(view.lower(&2), None);
        assert_eq!(view.higher(&7), None);
        assert_eq!(view.floor(&5).map(|(k, _)| *k), Some(5));
        assert_eq!(view.lower(&5).map(|(k, _)| *k), Some(4));
        assert_eq!(view.higher(&8), None);
    }

    #[test]
    fn descending_view_reverses_order_and_navigation() {
        let mut tree = tree();
        let mut desc = tree.descending();
        assert_eq!(keys(&desc), [9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(desc.first().map(|(k, _)| *k), Some(9));
        assert_eq!(desc.floor(&5).map(|(k, _)| *k), Some(5));
        assert_eq!(desc.lower(&5).map(|(k, _)| *k), Some(6));
        assert_eq!(desc.higher(&5).map(|(k, _)| *k), Some(4));
        assert_eq!(desc.rank(&9), Some(0));
        assert_eq!(desc.select(2).map(|(k, _)| *k), Some(7));

        // Logical bounds: "before 3" in a descending view is everything above it.
        let head = desc.head_map(3, false).unwrap();
        assert_eq!(keys(&head), [9, 8, 7, 6, 5, 4]);
        assert_eq!(head.range().to_string(), "desc(\u{221E}, 3)");
    }

    #[test]
    fn double_descending_is_ascending() {
        let mut tree = tree();
        let mut desc = tree.descending();
        let mut tail = desc.tail_map(6, true).unwrap();
        let asc = tail.descending();
        assert!(!asc.is_descending());
        assert_eq!(keys(&asc), [0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(asc.rank(&6), Some(6));
    }

    #[test]
    fn put_outside_range_is_rejected() {
        let mut tree = tree();
        let mut view = tree.sub_map(2, true, 8, false).unwrap();
        assert!(matches!(view.put(8, 0), Err(Error::KeyOutOfRange { .. })));
        assert_eq!(view.remove_by_key(&9).unwrap(), None);
        assert_eq!(view.put(4, 41).unwrap(), Some(40));
        assert_eq!(tree.get(&9), Some(&90));
        assert_eq!(tree.get(&4), Some(&41));
    }

    #[test]
    fn cached_bounds_follow_mutations() {
        let mut tree = tree();
        let mut view = tree.tail_map(5, true).unwrap();
        assert_eq!(view.len(), 5);
        view.put(12, 1).unwrap();
        assert_eq!(view.len(), 6);
        assert_eq!(view.remove_by_key(&5).unwrap(), Some((5, 50)));
        assert_eq!(view.first().map(|(k, _)| *k), Some(6));

        view.sub_map(6, true, 8, true).unwrap().clear().unwrap();
        assert_eq!(keys(&view), [9, 12]);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn clear_and_poll_notify_in_view_order() {
        let mut tree = tree();
        let mut log = Removals::default();
        {
            let mut range = tree.sub_map(2, true, 5, true).unwrap();
            let mut desc = range.descending();
            assert_eq!(desc.poll_first_with(&mut log).unwrap(), Some((5, 50)));
            desc.clear_with(&mut log).unwrap();
            assert!(desc.is_empty());
        }
        assert_eq!(log.0, [5, 4, 3, 2]);
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [0, 1, 6, 7, 8, 9]);
    }

    #[test]
    fn narrowing_outside_the_parent_is_rejected() {
        let mut tree = tree();
        let mut view = tree.sub_map(2, true, 8, false).unwrap();
        assert!(matches!(view.sub_map(0, true, 5, true), Err(Error::KeyOutOfRange { .. })));
        assert!(matches!(view.sub_map(5, true, 3, true), Err(Error::IllegalRange(_))));
        assert!(matches!(view.head_map(8, true), Err(Error::KeyOutOfRange { .. })));
        assert_eq!(view.head_map(8, false).unwrap().len(), 6);
    }

    #[test]
    fn frozen_root_rejects_view_mutation() {
        let mut tree = tree();
        tree.freeze();
        let mut view = tree.head_map(3, false).unwrap();
        assert!(matches!(view.clear(), Err(Error::Frozen)));
        assert!(matches!(view.poll_last(), Err(Error::Frozen)));
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn root_navigation() {
        let tree = tree();
        assert_eq!(tree.floor(&-1), None);
        assert_eq!(tree.ceiling(&4).map(|(k, _)| *k), Some(4));
        assert_eq!(tree.lower(&4).map(|(k, _)| *k), Some(3));
        assert_eq!(tree.higher(&4).map(|(k, _)| *k), Some(5));
        assert_eq!(tree.higher(&9), None);
        assert_eq!(tree.rank(&3), Some(3));
        assert_eq!(tree.rank(&30), None);
        assert_eq!(tree.select(9), Some((&9, &90)));
    }

    #[test]
    fn views_act_as_contains_sources() {
        let mut tree = tree();
        let mut other = RedBlackTreeEntries::<i32, i32>::builder().build().unwrap();
        other.put_all((0..10).map(|k| (k, k))).unwrap();
        let view = other.head_map(4, false).unwrap();
        tree.remove_all_by_keys(&view).unwrap();
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [4, 5, 6, 7, 8, 9]);
    }
}
