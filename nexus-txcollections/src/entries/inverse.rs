//! Value-keyed index kept in sync with a bidirectional container.
//!
//! The index is a plain backend chosen from the value strategy: hashed for
//! an equality strategy, ordered for a total order. It is owned by the
//! primary container and only ever mutated through the primary's structural
//! helpers, so it cannot start a mutation of its own.
//!
//! The same type doubles as a scratch set when bulk operations need to
//! deduplicate their input under a container's key strategy.

use super::hash::HashTable;
use super::tree::RedBlackTree;
use super::EntryBackend;
use crate::UnifiedComparator;

pub(crate) enum KeyIndex<K, V> {
    Hash(HashTable<K, V>),
    Tree(RedBlackTree<K, V>),
}

macro_rules! dispatch {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            KeyIndex::Hash($t) => $body,
            KeyIndex::Tree($t) => $body,
        }
    };
}

impl<K, V> KeyIndex<K, V> {
    pub(crate) fn new(comparator: UnifiedComparator<K>) -> Self {
        match comparator {
            UnifiedComparator::Equality(eq) => KeyIndex::Hash(HashTable::with_defaults(eq)),
            UnifiedComparator::Ordering(cmp) => KeyIndex::Tree(RedBlackTree::new(cmp)),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        dispatch!(self, t => t.find(key).map(|id| t.value(id)))
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &K) -> bool {
        dispatch!(self, t => t.find(key).is_some())
    }

    /// Maps `key` to `value`. An equal stored key is replaced by `key`.
    pub(crate) fn put(&mut self, key: K, value: V) -> Option<V> {
        dispatch!(self, t => match t.find(&key) {
            Some(id) => {
                t.set_key(id, key);
                Some(core::mem::replace(t.value_mut(id), value))
            }
            None => {
                t.insert(key, value);
                None
            }
        })
    }

    /// Inserts only if absent; returns `false` if `key` was present.
    pub(crate) fn insert_new(&mut self, key: K, value: V) -> bool {
        dispatch!(self, t => {
            if t.find(&key).is_some() {
                false
            } else {
                t.insert(key, value);
                true
            }
        })
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        dispatch!(self, t => {
            let id = t.find(key)?;
            let (_, v) = t.remove(id);
            t.compact();
            Some(v)
        })
    }

    pub(crate) fn clear(&mut self) {
        dispatch!(self, t => t.clear())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        dispatch!(self, t => t.len())
    }
}
