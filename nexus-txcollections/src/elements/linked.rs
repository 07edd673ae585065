//! Doubly linked backend with a read-position cache.
//!
//! Nodes live in a [`NodeStorage`] and are linked by `u32` index, with
//! [`Index::NONE`] terminating both ends. Positional access walks the list,
//! so the backend remembers the last position it resolved:
//!
//! ```text
//!   head                    cached                         tail
//!    [0] <-> [1] <-> ... <-> [i] <-> ... <-> [n-2] <-> [n-1]
//!     ^----- i steps -------^ ^----- n-1-i steps -------^
//! ```
//!
//! `node_at(k)` starts from whichever of head, tail or the cached node is
//! closest to `k`, so sequential reads are `O(1)` each.
//!
//! The cache also remembers whether the cached node is known to be the
//! first (or last) element equal to its value. A repeated `index_of` for
//! the same element then answers without walking. Edits adjust the cache
//! precisely instead of dropping it: an insertion before the cached node
//! shifts its index, and an equal element inserted in front clears the
//! first-match flag.
//!
//! The cache is one packed atomic word, so concurrent readers behind a read
//! lock only ever see whole snapshots. Which of them wins does not matter:
//! while the structure is not changing every snapshot is valid.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::{ElementBackend, ElementsBuilder};
use crate::storage::NodeStorage;
use crate::{Index, Result, UnifiedComparator};

/// Removals of at least this many indexes walk the list once instead of
/// resolving every index separately.
const SWEEP_THRESHOLD: usize = 3;

/// How the list trades bookkeeping for read speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReaderOptimization {
    /// No read cache.
    None,
    /// Maintain the read-position cache.
    #[default]
    Reading,
    /// No read cache; readers are expected to share the list under a read
    /// lock instead.
    ReadLock,
}

/// Settings for [`NodeList`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkedConfig {
    /// Read cache policy.
    pub reader_optimization: ReaderOptimization,
}

#[derive(Debug)]
struct Node<E> {
    value: E,
    prev: u32,
    next: u32,
}

// =============================================================================
// Read-position cache
// =============================================================================

/// Unpacked cache word.
///
/// Layout: node in bits 0..32, index in bits 32..62, `match_first` in bit
/// 62, `match_last` in bit 63. A node of `u32::NONE` means empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastAccess {
    index: usize,
    node: u32,
    match_first: bool,
    match_last: bool,
}

const INDEX_BITS: u32 = 30;
const MAX_CACHED_INDEX: usize = (1 << INDEX_BITS) - 1;
const EMPTY: u64 = u32::NONE as u64;

impl LastAccess {
    #[inline]
    fn pack(self) -> u64 {
        u64::from(self.node)
            | ((self.index as u64) << 32)
            | (u64::from(self.match_first) << 62)
            | (u64::from(self.match_last) << 63)
    }

    #[inline]
    fn unpack(word: u64) -> Option<Self> {
        let node = word as u32;
        if node.is_none() {
            return None;
        }
        Some(Self {
            node,
            index: ((word >> 32) as usize) & MAX_CACHED_INDEX,
            match_first: word & (1 << 62) != 0,
            match_last: word & (1 << 63) != 0,
        })
    }
}

// =============================================================================
// NodeList
// =============================================================================

/// Linked list storage.
pub struct NodeList<E> {
    nodes: NodeStorage<Node<E>>,
    head: u32,
    tail: u32,
    comparator: UnifiedComparator<E>,
    config: LinkedConfig,
    last_access: AtomicU64,
}

impl<E> NodeList<E> {
    #[inline]
    fn caching(&self) -> bool {
        self.config.reader_optimization == ReaderOptimization::Reading
    }

    #[inline]
    fn cached(&self) -> Option<LastAccess> {
        LastAccess::unpack(self.last_access.load(Ordering::Relaxed))
    }

    fn remember(&self, access: LastAccess) {
        if self.caching() && access.index <= MAX_CACHED_INDEX {
            self.last_access.store(access.pack(), Ordering::Relaxed);
        }
    }

    #[inline]
    fn cached_mut(&mut self) -> Option<LastAccess> {
        LastAccess::unpack(*self.last_access.get_mut())
    }

    #[inline]
    fn set_cached(&mut self, access: Option<LastAccess>) {
        *self.last_access.get_mut() = access.map_or(EMPTY, LastAccess::pack);
    }

    #[inline]
    fn forget(&mut self) {
        *self.last_access.get_mut() = EMPTY;
    }

    /// Node at `index`, starting from the closest of head, tail and the
    /// cached node. The cache moves to `index`.
    #[inline]
    fn node_at(&self, index: usize) -> u32 {
        self.walk(index, true)
    }

    fn walk(&self, index: usize, remember: bool) -> u32 {
        let len = self.nodes.len();
        let from_tail = len - 1 - index;
        let (mut node, mut at, mut flags) = if index <= from_tail {
            (self.head, 0, (false, false))
        } else {
            (self.tail, len - 1, (false, false))
        };
        if let Some(cached) = self.cached() {
            if cached.index.abs_diff(index) < index.min(from_tail) {
                node = cached.node;
                at = cached.index;
                flags = (cached.match_first, cached.match_last);
            }
        }
        while at < index {
            node = self.nodes[node].next;
            at += 1;
        }
        while at > index {
            node = self.nodes[node].prev;
            at -= 1;
        }
        if !remember {
            return node;
        }
        let keep = self.cached().is_some_and(|c| c.node == node);
        self.remember(LastAccess {
            index,
            node,
            match_first: keep && flags.0,
            match_last: keep && flags.1,
        });
        node
    }

    fn unlink(&mut self, node: u32) -> E {
        let Node { value, prev, next } = self.nodes.take(node);
        if prev.is_some() {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next.is_some() {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
        value
    }

    /// Links `value` before `at`, or at the tail if `at` is none.
    fn link_before(&mut self, at: u32, value: E) -> u32 {
        let prev = if at.is_some() { self.nodes[at].prev } else { self.tail };
        let node = self.nodes.insert(Node { value, prev, next: at });
        if prev.is_some() {
            self.nodes[prev].next = node;
        } else {
            self.head = node;
        }
        if at.is_some() {
            self.nodes[at].prev = node;
        } else {
            self.tail = node;
        }
        node
    }

    /// Cache adjustment for the removal of the node at `index`.
    fn forget_removed(&mut self, index: usize, successor: u32) {
        let Some(mut cached) = self.cached_mut() else {
            return;
        };
        if index < cached.index {
            cached.index -= 1;
            self.set_cached(Some(cached));
        } else if index == cached.index {
            if successor.is_none() {
                self.forget();
                return;
            }
            let first = cached.match_first
                && self
                    .comparator
                    .equals(&self.nodes[successor].value, &self.nodes[cached.node].value);
            self.set_cached(Some(LastAccess {
                index,
                node: successor,
                match_first: first,
                match_last: false,
            }));
        }
    }
}

impl<E> ElementBackend<E> for NodeList<E> {
    type Config = LinkedConfig;
    type Iter<'a>
        = NodeIter<'a, E>
    where
        E: 'a;

    fn create(comparator: &UnifiedComparator<E>, config: &LinkedConfig) -> Result<Self> {
        Ok(Self {
            nodes: NodeStorage::new(),
            head: u32::NONE,
            tail: u32::NONE,
            comparator: comparator.clone(),
            config: *config,
            last_access: AtomicU64::new(EMPTY),
        })
    }

    fn config(&self) -> LinkedConfig {
        self.config
    }

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn get(&self, index: usize) -> &E {
        &self.nodes[self.node_at(index)].value
    }

    fn replace(&mut self, index: usize, element: E) -> E {
        let node = self.walk(index, false);
        if let Some(mut cached) = self.cached_mut() {
            if index == cached.index {
                cached.match_first = false;
                cached.match_last = false;
            } else if self.comparator.equals(&element, &self.nodes[cached.node].value) {
                if index < cached.index {
                    cached.match_first = false;
                } else {
                    cached.match_last = false;
                }
            }
            self.set_cached(Some(cached));
        }
        core::mem::replace(&mut self.nodes[node].value, element)
    }

    fn insert_all(&mut self, index: usize, elements: Vec<E>) {
        let count = elements.len();
        let at = if index < self.len() { self.walk(index, false) } else { u32::NONE };
        if let Some(mut cached) = self.cached_mut() {
            let value = &self.nodes[cached.node].value;
            let equal = elements.iter().any(|e| self.comparator.equals(e, value));
            if index <= cached.index {
                cached.index += count;
                cached.match_first &= !equal;
            } else {
                cached.match_last &= !equal;
            }
            if cached.index > MAX_CACHED_INDEX {
                self.forget();
            } else {
                self.set_cached(Some(cached));
            }
        }
        for element in elements {
            self.link_before(at, element);
        }
    }

    fn remove(&mut self, index: usize) -> E {
        let node = self.node_at(index);
        let successor = self.nodes[node].next;
        self.forget_removed(index, successor);
        self.unlink(node)
    }

    fn remove_sorted(&mut self, indexes: &BTreeSet<usize>) -> Vec<E> {
        let Some(&first) = indexes.first() else {
            return Vec::new();
        };
        if indexes.len() < SWEEP_THRESHOLD {
            let mut removed: Vec<E> = indexes.iter().rev().map(|&i| self.remove(i)).collect();
            removed.reverse();
            return removed;
        }
        trace!(count = indexes.len(), "sweeping linked removal");
        let mut node = self.walk(first, false);
        self.forget();
        let mut removed = Vec::with_capacity(indexes.len());
        let mut at = first;
        while node.is_some() && removed.len() < indexes.len() {
            let next = self.nodes[node].next;
            if indexes.contains(&at) {
                removed.push(self.unlink(node));
            }
            node = next;
            at += 1;
        }
        removed
    }

    fn drain(&mut self, start: usize, end: usize) -> Vec<E> {
        if start == end {
            return Vec::new();
        }
        if start == 0 && end == self.len() {
            let mut removed = Vec::with_capacity(end);
            let mut node = self.head;
            while node.is_some() {
                let Node { value, next, .. } = self.nodes.take(node);
                removed.push(value);
                node = next;
            }
            self.nodes.clear();
            self.head = u32::NONE;
            self.tail = u32::NONE;
            self.forget();
            return removed;
        }
        let mut node = self.walk(start, false);
        match self.cached_mut() {
            Some(c) if c.index < start => {}
            Some(mut c) if c.index >= end => {
                c.index -= end - start;
                self.set_cached(Some(c));
            }
            _ => self.forget(),
        }
        let mut removed = Vec::with_capacity(end - start);
        for _ in start..end {
            let next = self.nodes[node].next;
            removed.push(self.unlink(node));
            node = next;
        }
        removed
    }

    fn iter_range(&self, start: usize, end: usize) -> NodeIter<'_, E> {
        if start >= end {
            return NodeIter {
                nodes: &self.nodes,
                front: u32::NONE,
                back: u32::NONE,
                remaining: 0,
            };
        }
        let front = self.node_at(start);
        let back = if end == self.len() { self.tail } else { self.node_at(end - 1) };
        NodeIter {
            nodes: &self.nodes,
            front,
            back,
            remaining: end - start,
        }
    }

    fn position(&self, start: usize, end: usize, element: &E) -> Option<usize> {
        if start >= end {
            return None;
        }
        if let Some(c) = self.cached() {
            if c.match_first
                && (start..end).contains(&c.index)
                && self.comparator.equals(&self.nodes[c.node].value, element)
            {
                return Some(c.index);
            }
        }
        let mut node = if start == 0 { self.head } else { self.node_at(start) };
        for index in start..end {
            if self.comparator.equals(&self.nodes[node].value, element) {
                self.remember(LastAccess {
                    index,
                    node,
                    match_first: start == 0,
                    match_last: false,
                });
                return Some(index);
            }
            node = self.nodes[node].next;
        }
        None
    }

    fn rposition(&self, start: usize, end: usize, element: &E) -> Option<usize> {
        if start >= end {
            return None;
        }
        let len = self.len();
        if let Some(c) = self.cached() {
            if c.match_last
                && (start..end).contains(&c.index)
                && self.comparator.equals(&self.nodes[c.node].value, element)
            {
                return Some(c.index);
            }
        }
        let mut node = if end == len { self.tail } else { self.node_at(end - 1) };
        for index in (start..end).rev() {
            if self.comparator.equals(&self.nodes[node].value, element) {
                self.remember(LastAccess {
                    index,
                    node,
                    match_first: false,
                    match_last: end == len,
                });
                return Some(index);
            }
            node = self.nodes[node].prev;
        }
        None
    }

    #[inline]
    fn random_access(&self) -> bool {
        false
    }

    #[inline]
    fn is_read_write_lock_supported(&self) -> bool {
        self.config.reader_optimization == ReaderOptimization::ReadLock
    }
}

/// Iterator over a range of a [`NodeList`].
pub struct NodeIter<'a, E> {
    nodes: &'a NodeStorage<Node<E>>,
    front: u32,
    back: u32,
    remaining: usize,
}

impl<'a, E> Iterator for NodeIter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.front];
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> DoubleEndedIterator for NodeIter<'_, E> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.back];
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<E> ExactSizeIterator for NodeIter<'_, E> {}

impl<E> ElementsBuilder<E, NodeList<E>> {
    /// Read cache policy.
    pub fn reader_optimization(mut self, optimization: ReaderOptimization) -> Self {
        self.config.reader_optimization = optimization;
        self
    }
}
