//! Ordering and equality strategies.
//!
//! Every container resolves one strategy per key (or element) type and one
//! per value type at construction. Ordered backends need a total order
//! ([`Comparator`]); hashed backends need equality plus a hash
//! ([`EqualityComparator`]). Places that accept either use
//! [`UnifiedComparator`].
//!
//! Two strategies are *the same* when both are natural or both wrap the same
//! closure instance. Bulk operations use this to decide whether another
//! container's membership test can be trusted (see
//! [`OverriddenContainsBehavior`](crate::OverriddenContainsBehavior)).

use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::sync::Arc;

use hashbrown::DefaultHashBuilder;

type CompareFn<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;
type EqualsFn<T> = dyn Fn(&T, &T) -> bool + Send + Sync;
type HashFn<T> = dyn Fn(&T) -> u64 + Send + Sync;

// =============================================================================
// Comparator
// =============================================================================

/// A total order over `T`.
///
/// # Example
///
/// ```
/// use nexus_txcollections::Comparator;
/// use std::cmp::Ordering;
///
/// let by_len = Comparator::new(|a: &String, b: &String| a.len().cmp(&b.len()));
/// assert_eq!(by_len.compare(&"ab".into(), &"c".into()), Ordering::Greater);
///
/// let desc = by_len.reversed();
/// assert_eq!(desc.compare(&"ab".into(), &"c".into()), Ordering::Less);
/// assert!(desc.reversed() == by_len);
/// ```
pub struct Comparator<T> {
    cmp: Arc<CompareFn<T>>,
    natural: bool,
    reversed: bool,
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self {
            cmp: Arc::clone(&self.cmp),
            natural: self.natural,
            reversed: self.reversed,
        }
    }
}

impl<T: Ord + 'static> Comparator<T> {
    /// The natural order of `T`.
    pub fn natural() -> Self {
        Self {
            cmp: Arc::new(|a: &T, b: &T| a.cmp(b)),
            natural: true,
            reversed: false,
        }
    }
}

impl<T: Ord + 'static> Default for Comparator<T> {
    fn default() -> Self {
        Self::natural()
    }
}

impl<T> Comparator<T> {
    /// Wraps a comparison closure.
    pub fn new<F>(cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            cmp: Arc::new(cmp),
            natural: false,
            reversed: false,
        }
    }

    /// Compares two values.
    #[inline]
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        let ord = (self.cmp)(a, b);
        if self.reversed { ord.reverse() } else { ord }
    }

    /// Returns the opposite order over the same closure.
    pub fn reversed(&self) -> Self {
        Self {
            cmp: Arc::clone(&self.cmp),
            natural: self.natural,
            reversed: !self.reversed,
        }
    }

    /// Returns `true` if this order is the reverse of the wrapped closure.
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Returns `true` if this is a (possibly reversed) natural order.
    #[inline]
    pub fn is_natural(&self) -> bool {
        self.natural
    }

    /// Returns `true` if `a` and `b` compare equal.
    #[inline]
    pub fn equals(&self, a: &T, b: &T) -> bool {
        (self.cmp)(a, b) == Ordering::Equal
    }
}

impl<T> PartialEq for Comparator<T> {
    fn eq(&self, other: &Self) -> bool {
        self.reversed == other.reversed
            && ((self.natural && other.natural) || Arc::ptr_eq(&self.cmp, &other.cmp))
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator")
            .field("natural", &self.natural)
            .field("reversed", &self.reversed)
            .finish()
    }
}

// =============================================================================
// EqualityComparator
// =============================================================================

/// Equality plus a consistent hash over `T`.
pub struct EqualityComparator<T> {
    equals: Arc<EqualsFn<T>>,
    hash: Arc<HashFn<T>>,
    natural: bool,
}

impl<T> Clone for EqualityComparator<T> {
    fn clone(&self) -> Self {
        Self {
            equals: Arc::clone(&self.equals),
            hash: Arc::clone(&self.hash),
            natural: self.natural,
        }
    }
}

impl<T: Eq + Hash + 'static> EqualityComparator<T> {
    /// `Eq` and `Hash` of `T`.
    pub fn natural() -> Self {
        let state = DefaultHashBuilder::default();
        Self {
            equals: Arc::new(|a: &T, b: &T| a == b),
            hash: Arc::new(move |v: &T| state.hash_one(v)),
            natural: true,
        }
    }
}

impl<T: Eq + Hash + 'static> Default for EqualityComparator<T> {
    fn default() -> Self {
        Self::natural()
    }
}

impl<T> EqualityComparator<T> {
    /// Wraps an equality closure and a hash closure.
    ///
    /// Values that are equal must hash equally.
    pub fn new<E, H>(equals: E, hash: H) -> Self
    where
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
        H: Fn(&T) -> u64 + Send + Sync + 'static,
    {
        Self {
            equals: Arc::new(equals),
            hash: Arc::new(hash),
            natural: false,
        }
    }

    /// Returns `true` if `a` equals `b`.
    #[inline]
    pub fn equals(&self, a: &T, b: &T) -> bool {
        (self.equals)(a, b)
    }

    /// Hashes `v`.
    #[inline]
    pub fn hash(&self, v: &T) -> u64 {
        (self.hash)(v)
    }

    /// Returns `true` if this wraps `Eq` and `Hash`.
    #[inline]
    pub fn is_natural(&self) -> bool {
        self.natural
    }
}

impl<T> PartialEq for EqualityComparator<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.natural && other.natural)
            || (Arc::ptr_eq(&self.equals, &other.equals) && Arc::ptr_eq(&self.hash, &other.hash))
    }
}

impl<T> fmt::Debug for EqualityComparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualityComparator")
            .field("natural", &self.natural)
            .finish()
    }
}

// =============================================================================
// UnifiedComparator
// =============================================================================

/// Either a total order or an equality-plus-hash strategy.
pub enum UnifiedComparator<T> {
    /// Total order; equality means `Ordering::Equal`.
    Ordering(Comparator<T>),
    /// Equality plus hash.
    Equality(EqualityComparator<T>),
}

impl<T> fmt::Debug for UnifiedComparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifiedComparator::Ordering(c) => f.debug_tuple("Ordering").field(c).finish(),
            UnifiedComparator::Equality(c) => f.debug_tuple("Equality").field(c).finish(),
        }
    }
}

impl<T> Clone for UnifiedComparator<T> {
    fn clone(&self) -> Self {
        match self {
            UnifiedComparator::Ordering(c) => UnifiedComparator::Ordering(c.clone()),
            UnifiedComparator::Equality(c) => UnifiedComparator::Equality(c.clone()),
        }
    }
}

impl<T> UnifiedComparator<T> {
    /// Returns `true` if `a` and `b` are equal under this strategy.
    #[inline]
    pub fn equals(&self, a: &T, b: &T) -> bool {
        match self {
            UnifiedComparator::Ordering(c) => c.equals(a, b),
            UnifiedComparator::Equality(c) => c.equals(a, b),
        }
    }

    /// Returns the total order, if this is one.
    #[inline]
    pub fn comparator(&self) -> Option<&Comparator<T>> {
        match self {
            UnifiedComparator::Ordering(c) => Some(c),
            UnifiedComparator::Equality(_) => None,
        }
    }

    /// Returns the equality strategy, if this is one.
    #[inline]
    pub fn equality_comparator(&self) -> Option<&EqualityComparator<T>> {
        match self {
            UnifiedComparator::Ordering(_) => None,
            UnifiedComparator::Equality(c) => Some(c),
        }
    }
}

impl<T> PartialEq for UnifiedComparator<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UnifiedComparator::Ordering(a), UnifiedComparator::Ordering(b)) => a == b,
            (UnifiedComparator::Equality(a), UnifiedComparator::Equality(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> From<Comparator<T>> for UnifiedComparator<T> {
    fn from(c: Comparator<T>) -> Self {
        UnifiedComparator::Ordering(c)
    }
}

impl<T> From<EqualityComparator<T>> for UnifiedComparator<T> {
    fn from(c: EqualityComparator<T>) -> Self {
        UnifiedComparator::Equality(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_comparators_are_the_same() {
        assert!(Comparator::<u32>::natural() == Comparator::natural());
        assert!(EqualityComparator::<u32>::natural() == EqualityComparator::natural());
        assert!(Comparator::<u32>::natural() != Comparator::natural().reversed());
    }

    #[test]
    fn custom_comparators_compare_by_identity() {
        let a = Comparator::new(|x: &u32, y: &u32| y.cmp(x));
        let b = Comparator::new(|x: &u32, y: &u32| y.cmp(x));
        assert!(a == a.clone());
        assert!(a != b);
        assert!(a != Comparator::natural());
    }

    #[test]
    fn reversed_flips_order() {
        let c = Comparator::<i32>::natural();
        assert_eq!(c.compare(&1, &2), Ordering::Less);
        assert_eq!(c.reversed().compare(&1, &2), Ordering::Greater);
        assert!(c.reversed().is_reversed());
        assert!(c.reversed().equals(&3, &3));
    }

    #[test]
    fn equality_hash_is_consistent() {
        let eq = EqualityComparator::<String>::natural();
        let a = String::from("key");
        let b = String::from("key");
        assert!(eq.equals(&a, &b));
        assert_eq!(eq.hash(&a), eq.hash(&b));
    }

    #[test]
    fn case_insensitive_equality() {
        let eq = EqualityComparator::new(
            |a: &String, b: &String| a.eq_ignore_ascii_case(b),
            |v: &String| {
                v.bytes()
                    .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b.to_ascii_lowercase() as u64))
            },
        );
        assert!(eq.equals(&"Key".into(), &"kEY".into()));
        assert_eq!(eq.hash(&"Key".into()), eq.hash(&"KEY".into()));
    }

    #[test]
    fn unified_equality() {
        let u: UnifiedComparator<i32> = Comparator::natural().into();
        assert!(u.equals(&4, &4));
        assert!(u.comparator().is_some());
        assert!(u.equality_comparator().is_none());

        let e: UnifiedComparator<i32> = EqualityComparator::natural().into();
        assert!(e != u);
        assert!(e == e.clone());
    }
}
