//! Slab-backed node storage with stable `u32` indices.
//!
//! Every linked structure in this crate (hash chains, linked-hash order
//! lists, red-black trees, linked element lists) keeps its nodes in a
//! [`NodeStorage`] and links them by index. An index stays valid until its
//! node is removed, so relinking a node never invalidates the handle held by
//! a caller.

use core::ops::{Index as IndexOp, IndexMut};

use slab::Slab;

use crate::Index;

/// Growable node storage with stable indices.
///
/// Removed slots are reused by later inserts. Indexing with `storage[idx]`
/// is reserved for links the owning structure maintains itself: a dangling
/// internal link is a broken invariant, not a recoverable condition.
///
/// # Example
///
/// ```
/// use nexus_txcollections::NodeStorage;
///
/// let mut storage: NodeStorage<&str> = NodeStorage::with_capacity(4);
/// let a = storage.insert("a");
/// let b = storage.insert("b");
/// assert_eq!(storage.get(a), Some(&"a"));
/// assert_eq!(storage.remove(a), Some("a"));
/// assert_eq!(storage.len(), 1);
/// assert_eq!(storage[b], "b");
/// ```
#[derive(Debug, Clone)]
pub struct NodeStorage<T> {
    slab: Slab<T>,
}

impl<T> Default for NodeStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeStorage<T> {
    /// Creates empty storage.
    #[inline]
    pub fn new() -> Self {
        Self { slab: Slab::new() }
    }

    /// Creates empty storage with room for `capacity` nodes.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Returns `true` if no slots are occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    /// Inserts a node, returning its stable index.
    ///
    /// The index is never [`Index::NONE`]; the sentinel slot is unreachable
    /// because a slab that large could not be allocated.
    #[inline]
    pub fn insert(&mut self, value: T) -> u32 {
        let idx = self.slab.insert(value);
        debug_assert!(idx < u32::NONE.as_usize(), "node storage exhausted");
        idx as u32
    }

    /// Returns the index the next [`insert`](Self::insert) will use.
    #[inline]
    pub fn vacant_index(&self) -> u32 {
        self.slab.vacant_key() as u32
    }

    /// Removes and returns the node at `idx`, if present.
    #[inline]
    pub fn remove(&mut self, idx: u32) -> Option<T> {
        self.slab.try_remove(idx.as_usize())
    }

    /// Removes and returns the node at `idx`.
    ///
    /// For links maintained by the owning structure; panics if the slot is
    /// vacant.
    #[inline]
    pub fn take(&mut self, idx: u32) -> T {
        self.slab.remove(idx.as_usize())
    }

    /// Returns a reference to the node at `idx`, if present.
    #[inline]
    pub fn get(&self, idx: u32) -> Option<&T> {
        if idx.is_none() {
            return None;
        }
        self.slab.get(idx.as_usize())
    }

    /// Returns a mutable reference to the node at `idx`, if present.
    #[inline]
    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        if idx.is_none() {
            return None;
        }
        self.slab.get_mut(idx.as_usize())
    }

    /// Returns `true` if `idx` names an occupied slot.
    #[inline]
    pub fn contains(&self, idx: u32) -> bool {
        idx.is_some() && self.slab.contains(idx.as_usize())
    }

    /// Drops every node.
    ///
    /// Outstanding indices become dangling; callers clear their own links
    /// first.
    #[inline]
    pub fn clear(&mut self) {
        self.slab.clear();
    }

    /// Removes every node, yielding them in slot order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slab.drain()
    }

    /// Shrinks the backing allocation as much as slot layout allows.
    #[inline]
    pub fn shrink_to_fit(&mut self) {
        self.slab.shrink_to_fit();
    }
}

impl<T> IndexOp<u32> for NodeStorage<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: u32) -> &T {
        &self.slab[idx.as_usize()]
    }
}

impl<T> IndexMut<u32> for NodeStorage<T> {
    #[inline]
    fn index_mut(&mut self, idx: u32) -> &mut T {
        &mut self.slab[idx.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let storage: NodeStorage<u64> = NodeStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.len(), 0);
        assert_eq!(storage.get(0), None);
        assert_eq!(storage.get(u32::NONE), None);
    }

    #[test]
    fn insert_get_remove() {
        let mut storage: NodeStorage<u64> = NodeStorage::with_capacity(16);

        let idx = storage.insert(42);
        assert_eq!(storage.get(idx), Some(&42));
        assert_eq!(storage.len(), 1);
        assert!(storage.contains(idx));

        *storage.get_mut(idx).unwrap() = 7;
        assert_eq!(storage[idx], 7);

        assert_eq!(storage.remove(idx), Some(7));
        assert!(storage.is_empty());
        assert!(!storage.contains(idx));
        assert_eq!(storage.remove(idx), None);
    }

    #[test]
    fn slot_reuse() {
        let mut storage: NodeStorage<u64> = NodeStorage::with_capacity(4);
        let a = storage.insert(1);
        let _b = storage.insert(2);

        storage.remove(a);
        assert_eq!(storage.vacant_index(), a);
        let c = storage.insert(3);
        assert_eq!(a, c);
        assert_eq!(storage[c], 3);
    }

    #[test]
    fn other_indices_stable_across_removal() {
        let mut storage: NodeStorage<u64> = NodeStorage::new();
        let ids: Vec<u32> = (0..100).map(|i| storage.insert(i)).collect();
        for id in ids.iter().step_by(2) {
            storage.remove(*id);
        }
        for (i, id) in ids.iter().enumerate().skip(1).step_by(2) {
            assert_eq!(storage[*id], i as u64);
        }
    }

    #[test]
    fn drain_empties() {
        let mut storage: NodeStorage<u64> = NodeStorage::new();
        for i in 0..10 {
            storage.insert(i);
        }
        let mut drained: Vec<u64> = storage.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(storage.is_empty());
    }

    #[cfg(all(target_arch = "x86_64", target_os = "linux"))]
    #[test]
    #[ignore]
    fn bench_node_storage_tsc() {
        use hdrhistogram::Histogram;

        #[inline]
        fn rdtsc() -> u64 {
            unsafe { core::arch::x86_64::_rdtsc() }
        }

        const OPS: usize = 100_000;
        let mut storage: NodeStorage<u64> = NodeStorage::with_capacity(OPS);
        let mut insert_hist = Histogram::<u64>::new(3).unwrap();
        let mut remove_hist = Histogram::<u64>::new(3).unwrap();
        let mut ids = Vec::with_capacity(OPS);

        for i in 0..OPS {
            let start = rdtsc();
            let id = storage.insert(i as u64);
            let end = rdtsc();
            insert_hist.record(end - start).unwrap();
            ids.push(id);
        }
        for id in ids {
            let start = rdtsc();
            let v = storage.remove(id);
            let end = rdtsc();
            std::hint::black_box(v);
            remove_hist.record(end - start).unwrap();
        }

        for (name, hist) in [("insert", &insert_hist), ("remove", &remove_hist)] {
            println!(
                "{name:<8} p50={:>4} p99={:>4} p999={:>5} max={:>6} cycles",
                hist.value_at_quantile(0.50),
                hist.value_at_quantile(0.99),
                hist.value_at_quantile(0.999),
                hist.max()
            );
        }
    }
}
