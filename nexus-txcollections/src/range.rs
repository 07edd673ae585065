//! Bounds of an ordered view.
//!
//! A [`NavigableRange`] describes which keys a descending or sub-range view
//! over a red-black tree can see. Bounds are stored in *logical*
//! coordinates, the order the view iterates in. Accessors taking an `abs`
//! flag translate to *absolute* coordinates, the order of the root tree:
//! for a descending view the logical `from` is the absolute `to`.
//!
//! ```
//! use nexus_txcollections::{Comparator, NavigableRange};
//!
//! let root = NavigableRange::full(Comparator::<i32>::natural());
//! let sub = NavigableRange::sub_range(&root, Some((1, true)), Some((9, false))).unwrap();
//! assert!(sub.contains(&1));
//! assert!(!sub.contains(&9));
//! assert_eq!(sub.to_string(), "asc[1, 9)");
//!
//! let desc = NavigableRange::descending_range(&sub);
//! assert_eq!(desc.to_string(), "desc(9, 1]");
//! assert!(desc.too_low(&10, false));
//! assert!(desc.too_high(&10, true));
//! ```

use core::cmp::Ordering;
use core::fmt;

use crate::{Comparator, Error, Result};

/// One end of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<K> {
    /// Boundary key.
    pub key: K,
    /// Whether the boundary key itself is inside the range.
    pub inclusive: bool,
}

impl<K> Endpoint<K> {
    /// Creates an endpoint.
    pub fn new(key: K, inclusive: bool) -> Self {
        Self { key, inclusive }
    }
}

/// Immutable bounds, direction and order of an ordered view.
///
/// `from <= to` under the logical comparator holds for every constructed
/// range.
pub struct NavigableRange<K> {
    descending: bool,
    comparator: Comparator<K>,
    from: Option<Endpoint<K>>,
    to: Option<Endpoint<K>>,
}

impl<K: Clone> Clone for NavigableRange<K> {
    fn clone(&self) -> Self {
        Self {
            descending: self.descending,
            comparator: self.comparator.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for NavigableRange<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigableRange")
            .field("descending", &self.descending)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl<K> NavigableRange<K> {
    /// The unbounded ascending range of a root tree.
    pub fn full(comparator: Comparator<K>) -> Self {
        Self {
            descending: false,
            comparator,
            from: None,
            to: None,
        }
    }

    /// Returns `true` if neither end is bounded.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Returns `true` if the view iterates against the root order.
    #[inline]
    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// The view's comparator, or the root's when `abs` is set.
    pub fn comparator(&self, abs: bool) -> Comparator<K> {
        if abs && self.descending {
            self.comparator.reversed()
        } else {
            self.comparator.clone()
        }
    }

    /// Lower bound, logical or absolute.
    #[inline]
    pub fn from(&self, abs: bool) -> Option<&Endpoint<K>> {
        if abs && self.descending {
            self.to.as_ref()
        } else {
            self.from.as_ref()
        }
    }

    /// Upper bound, logical or absolute.
    #[inline]
    pub fn to(&self, abs: bool) -> Option<&Endpoint<K>> {
        if abs && self.descending {
            self.from.as_ref()
        } else {
            self.to.as_ref()
        }
    }

    /// Returns `true` if `key` falls below the lower bound.
    pub fn too_low(&self, key: &K, abs: bool) -> bool {
        if abs && self.descending {
            return self.too_high(key, false);
        }
        match &self.from {
            Some(from) => {
                let cmp = self.comparator.compare(&from.key, key);
                if from.inclusive {
                    cmp == Ordering::Greater
                } else {
                    cmp != Ordering::Less
                }
            }
            None => false,
        }
    }

    /// Returns `true` if `key` falls above the upper bound.
    pub fn too_high(&self, key: &K, abs: bool) -> bool {
        if abs && self.descending {
            return self.too_low(key, false);
        }
        match &self.to {
            Some(to) => {
                let cmp = self.comparator.compare(&to.key, key);
                if to.inclusive {
                    cmp == Ordering::Less
                } else {
                    cmp != Ordering::Greater
                }
            }
            None => false,
        }
    }

    /// Returns `true` if `key` lies inside both bounds.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        !self.too_low(key, false) && !self.too_high(key, false)
    }

    /// Returns `true` if every key lies inside the range.
    pub fn contains_all<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().all(|k| self.contains(k))
    }
}

impl<K: Clone> NavigableRange<K> {
    /// The same bounds seen in the opposite direction.
    pub fn descending_range(parent: &NavigableRange<K>) -> Self {
        Self {
            descending: !parent.descending,
            comparator: parent.comparator.reversed(),
            from: parent.to.clone(),
            to: parent.from.clone(),
        }
    }

    /// Narrows `parent` by optional logical bounds.
    ///
    /// At least one bound is required, `from` must not exceed `to`, and
    /// each bound must lie inside the parent's bounds.
    pub fn sub_range(
        parent: &NavigableRange<K>,
        from: Option<(K, bool)>,
        to: Option<(K, bool)>,
    ) -> Result<Self> {
        if from.is_none() && to.is_none() {
            return Err(Error::IllegalRange("from and to cannot both be absent"));
        }
        if let (Some((f, _)), Some((t, _))) = (&from, &to) {
            if parent.comparator.compare(f, t) == Ordering::Greater {
                return Err(Error::IllegalRange("from is greater than to"));
            }
        }
        let mut range = parent.clone();
        if let Some((key, inclusive)) = from {
            range.accept_from(key, inclusive)?;
        }
        if let Some((key, inclusive)) = to {
            range.accept_to(key, inclusive)?;
        }
        Ok(range)
    }
}

impl<K> NavigableRange<K> {
    fn accept_from(&mut self, key: K, inclusive: bool) -> Result<()> {
        let Some(current) = &mut self.from else {
            self.from = Some(Endpoint::new(key, inclusive));
            return Ok(());
        };
        match self.comparator.compare(&current.key, &key) {
            Ordering::Greater => Err(self.out_of_range()),
            Ordering::Equal => {
                if !current.inclusive && inclusive {
                    return Err(self.out_of_range());
                }
                current.inclusive &= inclusive;
                Ok(())
            }
            Ordering::Less => {
                *current = Endpoint::new(key, inclusive);
                Ok(())
            }
        }
    }

    fn accept_to(&mut self, key: K, inclusive: bool) -> Result<()> {
        let Some(current) = &mut self.to else {
            self.to = Some(Endpoint::new(key, inclusive));
            return Ok(());
        };
        match self.comparator.compare(&current.key, &key) {
            Ordering::Less => Err(self.out_of_range()),
            Ordering::Equal => {
                if !current.inclusive && inclusive {
                    return Err(self.out_of_range());
                }
                current.inclusive &= inclusive;
                Ok(())
            }
            Ordering::Greater => {
                *current = Endpoint::new(key, inclusive);
                Ok(())
            }
        }
    }

    pub(crate) fn out_of_range(&self) -> Error {
        Error::KeyOutOfRange {
            range: self.describe(|_| "..".to_string()),
        }
    }

    fn describe(&self, show: impl Fn(&K) -> String) -> String {
        let open = match &self.from {
            Some(e) if e.inclusive => '[',
            _ => '(',
        };
        let close = match &self.to {
            Some(e) if e.inclusive => ']',
            _ => ')',
        };
        let from = self.from.as_ref().map_or_else(|| "\u{221E}".to_string(), |e| show(&e.key));
        let to = self.to.as_ref().map_or_else(|| "\u{221E}".to_string(), |e| show(&e.key));
        format!(
            "{}{open}{from}, {to}{close}",
            if self.descending { "desc" } else { "asc" }
        )
    }
}

impl<K: fmt::Display> fmt::Display for NavigableRange<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(|k| k.to_string()))
    }
}
