//! Membership tests against collections with a possibly different notion of
//! equality.
//!
//! Bulk operations (`remove_all_*`, `retain_all_*`) receive another
//! collection and need to ask "does it contain this item?". The other
//! collection's own `contains` is only meaningful if it compares items the
//! same way this container does; otherwise the answer must come from
//! scanning it with this container's strategy.

use core::hash::{BuildHasher, Hash};
use std::collections::{BTreeSet, HashSet};

use crate::{Comparator, EqualityComparator, UnifiedComparator};

/// A collection bulk operations can read items from.
pub trait ContainsSource<T> {
    /// Number of items.
    fn source_len(&self) -> usize;

    /// The strategy the collection's own membership test uses, if it is one
    /// of this crate's strategies.
    fn source_comparator(&self) -> Option<UnifiedComparator<T>>;

    /// The collection's own membership test.
    fn source_contains(&self, item: &T) -> bool;

    /// Iterates the items.
    fn source_iter(&self) -> Box<dyn Iterator<Item = &T> + '_>;
}

impl<T: PartialEq> ContainsSource<T> for [T] {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<T>> {
        None
    }

    fn source_contains(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

impl<T: PartialEq> ContainsSource<T> for Vec<T> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<T>> {
        None
    }

    fn source_contains(&self, item: &T) -> bool {
        self.as_slice().contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

impl<T, S> ContainsSource<T> for HashSet<T, S>
where
    T: Eq + Hash + 'static,
    S: BuildHasher,
{
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<T>> {
        Some(EqualityComparator::natural().into())
    }

    fn source_contains(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

impl<T: Ord + 'static> ContainsSource<T> for BTreeSet<T> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<T>> {
        Some(Comparator::natural().into())
    }

    fn source_contains(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

/// Membership test that trusts the other collection only when it shares
/// this container's strategy.
///
/// # Example
///
/// ```
/// use nexus_txcollections::{Comparator, OverriddenContainsBehavior, UnifiedComparator};
/// use std::collections::BTreeSet;
///
/// let natural: UnifiedComparator<i32> = Comparator::natural().into();
/// let other: BTreeSet<i32> = [1, 2, 3].into();
/// let behavior = OverriddenContainsBehavior::new(&other, &natural);
/// assert!(behavior.is_delegating());
/// assert!(behavior.contains(&2));
///
/// let by_parity: UnifiedComparator<i32> =
///     Comparator::new(|a: &i32, b: &i32| (a % 2).cmp(&(b % 2))).into();
/// let behavior = OverriddenContainsBehavior::new(&other, &by_parity);
/// assert!(!behavior.is_delegating());
/// // 5 is odd like 1 and 3.
/// assert!(behavior.contains(&5));
/// ```
pub struct OverriddenContainsBehavior<'a, T, C: ?Sized> {
    source: &'a C,
    comparator: &'a UnifiedComparator<T>,
    delegating: bool,
}

impl<'a, T, C> OverriddenContainsBehavior<'a, T, C>
where
    C: ContainsSource<T> + ?Sized,
{
    /// Decides once how membership in `source` is computed under
    /// `comparator`.
    pub fn new(source: &'a C, comparator: &'a UnifiedComparator<T>) -> Self {
        let delegating = source
            .source_comparator()
            .is_some_and(|theirs| theirs == *comparator);
        Self {
            source,
            comparator,
            delegating,
        }
    }

    /// Returns `true` if membership is answered by the source itself.
    #[inline]
    pub fn is_delegating(&self) -> bool {
        self.delegating
    }

    /// Returns `true` if the source holds an item equal to `item`.
    pub fn contains(&self, item: &T) -> bool {
        if self.delegating {
            return self.source.source_contains(item);
        }
        self.source
            .source_iter()
            .any(|candidate| self.comparator.equals(candidate, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_is_always_scanned() {
        let natural: UnifiedComparator<i32> = Comparator::natural().into();
        let v = vec![1, 2, 3];
        let b = OverriddenContainsBehavior::new(&v, &natural);
        assert!(!b.is_delegating());
        assert!(b.contains(&3));
        assert!(!b.contains(&4));
    }

    #[test]
    fn hash_set_delegates_only_for_natural_equality() {
        let set: HashSet<String> = ["Ab".to_string()].into();
        let natural: UnifiedComparator<String> = EqualityComparator::natural().into();
        assert!(OverriddenContainsBehavior::new(&set, &natural).is_delegating());

        let ignore_case: UnifiedComparator<String> = EqualityComparator::new(
            |a: &String, b: &String| a.eq_ignore_ascii_case(b),
            |v: &String| v.len() as u64,
        )
        .into();
        let b = OverriddenContainsBehavior::new(&set, &ignore_case);
        assert!(!b.is_delegating());
        assert!(b.contains(&"aB".to_string()));
    }

    #[test]
    fn ordering_and_equality_never_match() {
        let set: BTreeSet<u8> = [1].into();
        let eq: UnifiedComparator<u8> = EqualityComparator::natural().into();
        assert!(!OverriddenContainsBehavior::new(&set, &eq).is_delegating());
    }
}
