//! Contiguous backend with an explicit growth policy.
//!
//! The array tracks its own logical capacity rather than leaving growth to
//! `Vec`. When an insertion would overflow, capacity grows to
//! `max(capacity * expand_factor, required)`. With a collapse factor set,
//! a removal that leaves the array sparse enough shrinks it once to
//! `capacity * collapse_factor`.
//!
//! ```text
//! initial_capacity = 2, expand_factor = 2.0
//!
//! add a      [a _]
//! add b      [a b]
//! add c      [a b c _]          2 -> 4
//! add d e    [a b c d e _ _ _]  4 -> 8
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use super::{ElementBackend, ElementsBuilder};
use crate::{Error, Result, UnifiedComparator};

/// Settings for [`GrowableArray`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayConfig {
    /// Capacity reserved on creation.
    pub initial_capacity: usize,
    /// Growth multiplier, in `1.0..=4.0`.
    pub expand_factor: f32,
    /// Shrink multiplier, in `0.1..=0.9`. `None` never shrinks.
    pub collapse_factor: Option<f32>,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            expand_factor: 1.5,
            collapse_factor: None,
        }
    }
}

impl ArrayConfig {
    fn validate(&self) -> Result<()> {
        if !(1.0..=4.0).contains(&self.expand_factor) {
            return Err(Error::Config(format!(
                "expand factor {} is outside 1.0..=4.0",
                self.expand_factor
            )));
        }
        if let Some(collapse) = self.collapse_factor {
            if !(0.1..=0.9).contains(&collapse) {
                return Err(Error::Config(format!(
                    "collapse factor {collapse} is outside 0.1..=0.9"
                )));
            }
        }
        Ok(())
    }
}

/// Array storage.
pub struct GrowableArray<E> {
    data: Vec<E>,
    capacity: usize,
    config: ArrayConfig,
    comparator: UnifiedComparator<E>,
}

impl<E> GrowableArray<E> {
    /// Logical capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn grow_for(&mut self, new_len: usize) {
        if new_len <= self.capacity {
            return;
        }
        let scaled = (self.capacity as f64 * f64::from(self.config.expand_factor)) as usize;
        let new_capacity = scaled.max(new_len);
        debug!(from = self.capacity, to = new_capacity, "array expanded");
        self.data.reserve_exact(new_capacity - self.data.len());
        self.capacity = new_capacity;
    }

    fn shrink_for(&mut self, new_len: usize) {
        let Some(collapse) = self.config.collapse_factor else {
            return;
        };
        let new_capacity = (self.capacity as f64 * f64::from(collapse)) as usize;
        if new_capacity >= new_len && new_capacity < self.capacity {
            debug!(from = self.capacity, to = new_capacity, "array collapsed");
            self.data.shrink_to(new_capacity);
            self.capacity = new_capacity;
        }
    }
}

impl<E> ElementBackend<E> for GrowableArray<E> {
    type Config = ArrayConfig;
    type Iter<'a>
        = core::slice::Iter<'a, E>
    where
        E: 'a;

    fn create(comparator: &UnifiedComparator<E>, config: &ArrayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data: Vec::with_capacity(config.initial_capacity),
            capacity: config.initial_capacity,
            config: *config,
            comparator: comparator.clone(),
        })
    }

    fn config(&self) -> ArrayConfig {
        self.config
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn get(&self, index: usize) -> &E {
        &self.data[index]
    }

    fn replace(&mut self, index: usize, element: E) -> E {
        core::mem::replace(&mut self.data[index], element)
    }

    fn insert_all(&mut self, index: usize, elements: Vec<E>) {
        self.grow_for(self.data.len() + elements.len());
        if index == self.data.len() {
            self.data.extend(elements);
        } else {
            self.data.splice(index..index, elements);
        }
    }

    fn remove(&mut self, index: usize) -> E {
        let removed = self.data.remove(index);
        self.shrink_for(self.data.len());
        removed
    }

    fn remove_sorted(&mut self, indexes: &BTreeSet<usize>) -> Vec<E> {
        // One compaction pass instead of a shift per index.
        let mut removed = Vec::with_capacity(indexes.len());
        let mut kept = Vec::with_capacity(self.data.len() - indexes.len());
        for (i, e) in self.data.drain(..).enumerate() {
            if indexes.contains(&i) {
                removed.push(e);
            } else {
                kept.push(e);
            }
        }
        self.data = kept;
        self.data.reserve_exact(self.capacity - self.data.len());
        self.shrink_for(self.data.len());
        removed
    }

    fn drain(&mut self, start: usize, end: usize) -> Vec<E> {
        let removed: Vec<E> = self.data.drain(start..end).collect();
        self.shrink_for(self.data.len());
        removed
    }

    #[inline]
    fn iter_range(&self, start: usize, end: usize) -> Self::Iter<'_> {
        self.data[start..end].iter()
    }

    fn position(&self, start: usize, end: usize, element: &E) -> Option<usize> {
        self.data[start..end]
            .iter()
            .position(|e| self.comparator.equals(e, element))
            .map(|i| start + i)
    }

    fn rposition(&self, start: usize, end: usize, element: &E) -> Option<usize> {
        self.data[start..end]
            .iter()
            .rposition(|e| self.comparator.equals(e, element))
            .map(|i| start + i)
    }

    #[inline]
    fn random_access(&self) -> bool {
        true
    }
}

impl<E> ElementsBuilder<E, GrowableArray<E>> {
    /// Capacity reserved on creation.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Growth multiplier, validated at build time.
    pub fn expand_factor(mut self, factor: f32) -> Self {
        self.config.expand_factor = factor;
        self
    }

    /// Shrink multiplier, validated at build time.
    pub fn collapse_factor(mut self, factor: f32) -> Self {
        self.config.collapse_factor = Some(factor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EqualityComparator;

    fn array(config: ArrayConfig) -> GrowableArray<char> {
        GrowableArray::create(&EqualityComparator::natural().into(), &config).unwrap()
    }

    #[test]
    fn doubles_then_jumps_to_required() {
        let mut a = array(ArrayConfig {
            initial_capacity: 2,
            expand_factor: 2.0,
            collapse_factor: None,
        });
        a.insert_all(0, vec!['a', 'b']);
        assert_eq!(a.capacity(), 2);
        a.insert_all(2, vec!['c']);
        assert_eq!(a.capacity(), 4);
        a.insert_all(3, vec!['d', 'e']);
        assert_eq!(a.capacity(), 8);
        a.insert_all(0, vec!['x'; 20]);
        assert_eq!(a.capacity(), 25);
    }

    #[test]
    fn never_shrinks_without_collapse_factor() {
        let mut a = array(ArrayConfig {
            initial_capacity: 8,
            ..Default::default()
        });
        a.insert_all(0, vec!['a'; 8]);
        a.drain(0, 8);
        assert!(a.is_empty());
        assert_eq!(a.capacity(), 8);
    }

    #[test]
    fn collapses_once_per_removal() {
        let mut a = array(ArrayConfig {
            initial_capacity: 16,
            expand_factor: 2.0,
            collapse_factor: Some(0.5),
        });
        a.insert_all(0, "abcdefghij".chars().collect());
        a.drain(2, 10);
        assert_eq!(a.capacity(), 8);
        // One step per removal.
        a.remove(0);
        assert_eq!(a.capacity(), 4);
        assert_eq!(a.iter_range(0, 1).collect::<String>(), "b");
    }

    #[test]
    fn sorted_removal_keeps_order() {
        let mut a = array(ArrayConfig::default());
        a.insert_all(0, "abcdef".chars().collect());
        let removed = a.remove_sorted(&BTreeSet::from([0, 2, 5]));
        assert_eq!(removed, ['a', 'c', 'f']);
        assert_eq!(a.iter_range(0, a.len()).collect::<String>(), "bde");
        assert_eq!(a.position(0, 3, &'e'), Some(2));
        assert_eq!(a.position(0, 2, &'e'), None);
    }

    #[test]
    fn builder_settings_reach_the_backend() {
        let list = crate::ArrayElements::<u8>::builder()
            .initial_capacity(4)
            .expand_factor(2.0)
            .collapse_factor(0.5)
            .build()
            .unwrap();
        assert_eq!(list.backend().capacity(), 4);
        assert_eq!(list.backend().config().collapse_factor, Some(0.5));
        assert!(matches!(
            crate::ArrayElements::<u8>::builder().expand_factor(0.5).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_factors() {
        let bad = ArrayConfig {
            expand_factor: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            GrowableArray::<u8>::create(&EqualityComparator::natural().into(), &bad),
            Err(Error::Config(_))
        ));
        let bad = ArrayConfig {
            collapse_factor: Some(0.95),
            ..Default::default()
        };
        assert!(matches!(
            GrowableArray::<u8>::create(&EqualityComparator::natural().into(), &bad),
            Err(Error::Config(_))
        ));
    }
}
