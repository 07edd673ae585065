//! Snapshots of temporarily removed entries.

use crate::UnifiedComparator;

/// A removed entry waiting to be put back.
///
/// Produced by
/// [`suspend_via_frozen_context`](crate::Entries::suspend_via_frozen_context)
/// before the key (or, through the inverse index, the value) changes in a way
/// that affects its hash or order. Resuming reinserts the pair and, for
/// insertion-ordered containers, moves it back in front of the entry that
/// followed it at suspension time.
///
/// The successor is remembered by key, not by handle, so a slot reused by an
/// unrelated insertion can never be mistaken for it. If the successor itself
/// is deleted as a conflict while the snapshot is held,
/// [`on_conflict_deleted`](Self::on_conflict_deleted) moves the anchor to
/// that entry's own successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenContextSuspending<K, V> {
    key: K,
    value: V,
    after: Option<K>,
}

impl<K, V> FrozenContextSuspending<K, V> {
    pub(crate) fn new(key: K, value: V, after: Option<K>) -> Self {
        Self { key, value, after }
    }

    /// Key of the suspended entry.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Value of the suspended entry.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Key of the entry the suspended one must be resumed in front of.
    #[inline]
    pub fn after(&self) -> Option<&K> {
        self.after.as_ref()
    }

    /// Replaces the key to resume with, for keys mutated while suspended.
    pub fn set_key(&mut self, key: K) {
        self.key = key;
    }

    /// Replaces the value to resume with.
    pub fn set_value(&mut self, value: V) {
        self.value = value;
    }

    /// Notifies the snapshot that a conflicting entry was deleted while it
    /// is held.
    ///
    /// `deleted_after` is the successor of the deleted entry at deletion
    /// time.
    pub fn on_conflict_deleted(
        &mut self,
        deleted_key: &K,
        deleted_after: Option<K>,
        comparator: &UnifiedComparator<K>,
    ) {
        let anchored = self
            .after
            .as_ref()
            .is_some_and(|after| comparator.equals(after, deleted_key));
        if anchored {
            self.after = deleted_after;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EqualityComparator;

    #[test]
    fn anchor_moves_past_deleted_conflict() {
        let eq: UnifiedComparator<i32> = EqualityComparator::natural().into();
        let mut s = FrozenContextSuspending::new(1, "one", Some(2));

        s.on_conflict_deleted(&3, Some(4), &eq);
        assert_eq!(s.after(), Some(&2));

        s.on_conflict_deleted(&2, Some(3), &eq);
        assert_eq!(s.after(), Some(&3));

        s.on_conflict_deleted(&3, None, &eq);
        assert_eq!(s.after(), None);
    }

    #[test]
    fn parts() {
        let mut s = FrozenContextSuspending::new("k", 1, None);
        s.set_value(2);
        assert_eq!((s.key, s.value, s.after), ("k", 2, None));
    }
}
