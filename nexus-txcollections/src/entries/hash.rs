//! Open hashing with singly linked bucket chains.
//!
//! Nodes live in a [`NodeStorage`]; buckets hold the index of the first node
//! of their chain. The bucket count is a power of two between the initial
//! capacity and `2^30`. With a load factor configured the table doubles on
//! insert once `len > threshold` and halves after removals once twice the
//! length falls below the threshold.
//!
//! The node carries an `extra` payload so the insertion-ordered table can
//! reuse the chains and keep its own links next to them.

use tracing::debug;

use super::{EntriesBuilder, EntryBackend};
use crate::{EntryId, EqualityComparator, Error, Index, NodeStorage, Result, UnifiedComparator};

pub(crate) const MIN_CAPACITY: usize = 2;
pub(crate) const MAX_CAPACITY: usize = 1 << 30;

/// Bucket table settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashConfig {
    /// Initial bucket count, rounded up to a power of two (minimum 2).
    pub initial_capacity: usize,
    /// Target load. `None` disables rescaling.
    pub load_factor: Option<f32>,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            load_factor: Some(0.75),
        }
    }
}

impl HashConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.initial_capacity > MAX_CAPACITY {
            return Err(Error::Config(format!(
                "initial capacity {} exceeds {MAX_CAPACITY}",
                self.initial_capacity
            )));
        }
        if let Some(lf) = self.load_factor {
            if !(lf.is_finite() && lf > 0.0) {
                return Err(Error::Config(format!("load factor {lf} must be positive")));
            }
        }
        Ok(())
    }
}

pub(crate) struct HashNode<K, V, X> {
    pub(crate) key: K,
    pub(crate) value: V,
    hash: u32,
    next: u32,
    pub(crate) extra: X,
}

/// Unordered hash table backend.
pub struct HashTable<K, V, X = ()> {
    nodes: NodeStorage<HashNode<K, V, X>>,
    buckets: Vec<u32>,
    comparator: EqualityComparator<K>,
    init_capacity: usize,
    load_factor: Option<f32>,
    threshold: usize,
}

/// Mixes high bits into the low bits used for bucket selection.
#[inline]
fn spread(h: u64) -> u32 {
    let mut h = (h ^ (h >> 32)) as u32;
    h ^= (h >> 20) ^ (h >> 12);
    h ^ (h >> 7) ^ (h >> 4)
}

impl<K, V, X> HashTable<K, V, X> {
    pub(crate) fn with_config(comparator: EqualityComparator<K>, config: &HashConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(comparator, config))
    }

    /// A table with the default configuration.
    pub(crate) fn with_defaults(comparator: EqualityComparator<K>) -> Self {
        Self::with_valid_config(comparator, &HashConfig::default())
    }

    fn with_valid_config(comparator: EqualityComparator<K>, config: &HashConfig) -> Self {
        let init_capacity = config
            .initial_capacity
            .max(MIN_CAPACITY)
            .next_power_of_two();
        let threshold = config
            .load_factor
            .map_or(usize::MAX, |lf| (init_capacity as f32 * lf) as usize);
        Self {
            nodes: NodeStorage::new(),
            buckets: vec![u32::NONE; init_capacity],
            comparator,
            init_capacity,
            load_factor: config.load_factor,
            threshold,
        }
    }

    /// Number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn comparator(&self) -> &EqualityComparator<K> {
        &self.comparator
    }

    #[inline]
    pub(crate) fn hash_config(&self) -> HashConfig {
        HashConfig {
            initial_capacity: self.init_capacity,
            load_factor: self.load_factor,
        }
    }

    #[inline]
    pub(crate) fn node(&self, id: u32) -> &HashNode<K, V, X> {
        &self.nodes[id]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: u32) -> &mut HashNode<K, V, X> {
        &mut self.nodes[id]
    }

    #[inline]
    pub(crate) fn contains(&self, id: u32) -> bool {
        self.nodes.contains(id)
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    pub(crate) fn find_node(&self, key: &K) -> Option<u32> {
        let hash = spread(self.comparator.hash(key));
        let mut cur = self.buckets[self.bucket_of(hash)];
        while cur.is_some() {
            let node = &self.nodes[cur];
            if node.hash == hash && self.comparator.equals(&node.key, key) {
                return Some(cur);
            }
            cur = node.next;
        }
        None
    }

    /// Links a new node at the head of its chain. The key must be absent.
    pub(crate) fn insert_node(&mut self, key: K, value: V, extra: X) -> u32 {
        let hash = spread(self.comparator.hash(&key));
        let bucket = self.bucket_of(hash);
        let id = self.nodes.insert(HashNode {
            key,
            value,
            hash,
            next: self.buckets[bucket],
            extra,
        });
        self.buckets[bucket] = id;
        self.scale(true);
        id
    }

    /// Unlinks `id` from its chain and frees the slot.
    pub(crate) fn remove_node(&mut self, id: u32) -> HashNode<K, V, X> {
        let bucket = self.bucket_of(self.nodes[id].hash);
        let next = self.nodes[id].next;
        if self.buckets[bucket] == id {
            self.buckets[bucket] = next;
        } else {
            let mut cur = self.buckets[bucket];
            while cur.is_some() {
                if self.nodes[cur].next == id {
                    self.nodes[cur].next = next;
                    break;
                }
                cur = self.nodes[cur].next;
            }
        }
        self.nodes.take(id)
    }

    /// Rekeys `id` in place. The new key must be equal to the old one.
    pub(crate) fn set_node_key(&mut self, id: u32, key: K) {
        debug_assert!(self.comparator.equals(&self.nodes[id].key, &key));
        self.nodes[id].key = key;
    }

    pub(crate) fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.buckets.iter_mut().for_each(|b| *b = u32::NONE);
        self.scale(false);
    }

    fn first_from(&self, bucket: usize) -> Option<u32> {
        self.buckets[bucket..]
            .iter()
            .copied()
            .find(|b| b.is_some())
    }

    fn tail_of_chain(&self, mut cur: u32) -> u32 {
        while self.nodes[cur].next.is_some() {
            cur = self.nodes[cur].next;
        }
        cur
    }

    fn last_before(&self, bucket: usize) -> Option<u32> {
        self.buckets[..bucket]
            .iter()
            .rev()
            .copied()
            .find(|b| b.is_some())
            .map(|head| self.tail_of_chain(head))
    }

    pub(crate) fn first_id(&self) -> Option<u32> {
        self.first_from(0)
    }

    pub(crate) fn last_id(&self) -> Option<u32> {
        self.last_before(self.buckets.len())
    }

    pub(crate) fn next_id(&self, id: u32) -> Option<u32> {
        let node = &self.nodes[id];
        if node.next.is_some() {
            return Some(node.next);
        }
        let bucket = self.bucket_of(node.hash) + 1;
        if bucket >= self.buckets.len() {
            return None;
        }
        self.first_from(bucket)
    }

    pub(crate) fn prev_id(&self, id: u32) -> Option<u32> {
        let bucket = self.bucket_of(self.nodes[id].hash);
        let mut cur = self.buckets[bucket];
        if cur == id {
            return self.last_before(bucket);
        }
        while cur.is_some() {
            let next = self.nodes[cur].next;
            if next == id {
                return Some(cur);
            }
            cur = next;
        }
        None
    }

    /// Resizes the bucket array when the load requires it.
    pub(crate) fn scale(&mut self, up: bool) {
        let Some(lf) = self.load_factor else {
            return;
        };
        let len = self.nodes.len();
        let twice = len << 1;
        let mut capacity = self.buckets.len();
        if up {
            if len > self.threshold {
                loop {
                    capacity <<= 1;
                    if (capacity as f32 * lf) as usize >= len || capacity >= MAX_CAPACITY {
                        break;
                    }
                }
            }
        } else if twice < self.threshold {
            loop {
                capacity >>= 1;
                if capacity as f32 * lf <= twice as f32 || capacity <= MIN_CAPACITY {
                    break;
                }
            }
        }
        let capacity = capacity.clamp(self.init_capacity, MAX_CAPACITY);
        if capacity == self.buckets.len() {
            return;
        }
        debug!(
            from = self.buckets.len(),
            to = capacity,
            len,
            "rescaling hash buckets"
        );
        let old = core::mem::replace(&mut self.buckets, vec![u32::NONE; capacity]);
        for head in old {
            let mut cur = head;
            while cur.is_some() {
                let next = self.nodes[cur].next;
                let bucket = self.bucket_of(self.nodes[cur].hash);
                self.nodes[cur].next = self.buckets[bucket];
                self.buckets[bucket] = cur;
                cur = next;
            }
        }
        self.threshold = (capacity as f32 * lf) as usize;
    }
}

impl<K, V> EntryBackend<K, V> for HashTable<K, V> {
    type KeyComparator = EqualityComparator<K>;
    type Config = HashConfig;

    fn create(comparator: EqualityComparator<K>, config: &HashConfig) -> Result<Self> {
        Self::with_config(comparator, config)
    }

    fn config(&self) -> HashConfig {
        self.hash_config()
    }

    fn key_comparator(&self) -> &EqualityComparator<K> {
        &self.comparator
    }

    fn unified_key_comparator(&self) -> UnifiedComparator<K> {
        UnifiedComparator::Equality(self.comparator.clone())
    }

    #[inline]
    fn len(&self) -> usize {
        self.node_count()
    }

    #[inline]
    fn find(&self, key: &K) -> Option<EntryId> {
        self.find_node(key).map(EntryId)
    }

    #[inline]
    fn contains_id(&self, id: EntryId) -> bool {
        self.nodes.contains(id.0)
    }

    #[inline]
    fn key(&self, id: EntryId) -> &K {
        &self.nodes[id.0].key
    }

    #[inline]
    fn value(&self, id: EntryId) -> &V {
        &self.nodes[id.0].value
    }

    #[inline]
    fn value_mut(&mut self, id: EntryId) -> &mut V {
        &mut self.nodes[id.0].value
    }

    fn set_key(&mut self, id: EntryId, key: K) {
        self.set_node_key(id.0, key);
    }

    fn insert(&mut self, key: K, value: V) -> EntryId {
        EntryId(self.insert_node(key, value, ()))
    }

    fn remove(&mut self, id: EntryId) -> (K, V) {
        let node = self.remove_node(id.0);
        (node.key, node.value)
    }

    fn clear(&mut self) {
        self.clear_nodes();
    }

    fn first(&self) -> Option<EntryId> {
        self.first_id().map(EntryId)
    }

    fn last(&self) -> Option<EntryId> {
        self.last_id().map(EntryId)
    }

    fn next(&self, id: EntryId) -> Option<EntryId> {
        self.next_id(id.0).map(EntryId)
    }

    fn prev(&self, id: EntryId) -> Option<EntryId> {
        self.prev_id(id.0).map(EntryId)
    }

    fn compact(&mut self) {
        self.scale(false);
    }

    #[inline]
    fn key_equals(&self, a: &K, b: &K) -> bool {
        self.comparator.equals(a, b)
    }
}

impl<K, V> EntriesBuilder<K, V, HashTable<K, V>> {
    /// Initial bucket count, rounded up to a power of two.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Load factor in `(0, 1]`, or `None` for a fixed bucket array.
    pub fn load_factor(mut self, load_factor: Option<f32>) -> Self {
        self.config.load_factor = load_factor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(config: HashConfig) -> HashTable<u32, u32> {
        HashTable::create(EqualityComparator::natural(), &config).unwrap()
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let t = table(HashConfig {
            initial_capacity: 5,
            load_factor: None,
        });
        assert_eq!(t.bucket_count(), 8);
        let t = table(HashConfig {
            initial_capacity: 0,
            load_factor: None,
        });
        assert_eq!(t.bucket_count(), MIN_CAPACITY);
    }

    #[test]
    fn rejects_bad_config() {
        let cmp = EqualityComparator::<u32>::natural();
        assert!(matches!(
            HashTable::<u32, u32>::create(
                cmp.clone(),
                &HashConfig {
                    initial_capacity: MAX_CAPACITY + 1,
                    load_factor: None
                }
            ),
            Err(Error::Config(_))
        ));
        assert!(HashTable::<u32, u32>::create(
            cmp,
            &HashConfig {
                initial_capacity: 4,
                load_factor: Some(0.0)
            }
        )
        .is_err());
    }

    #[test]
    fn scales_up_and_down() {
        let mut t = table(HashConfig {
            initial_capacity: 2,
            load_factor: Some(0.75),
        });
        let ids: Vec<EntryId> = (0..100).map(|i| t.insert(i, i * 10)).collect();
        assert!(t.bucket_count() >= 128);
        for i in 0..100 {
            let id = EntryBackend::find(&t, &i).unwrap();
            assert_eq!(*t.value(id), i * 10);
        }
        for id in &ids[..96] {
            t.remove(*id);
        }
        t.compact();
        assert!(t.bucket_count() <= 16, "buckets = {}", t.bucket_count());
        for i in 96..100 {
            assert!(EntryBackend::find(&t, &i).is_some());
        }
    }

    #[test]
    fn no_load_factor_never_rescales() {
        let mut t = table(HashConfig {
            initial_capacity: 4,
            load_factor: None,
        });
        for i in 0..64 {
            t.insert(i, i);
        }
        assert_eq!(t.bucket_count(), 4);
        assert_eq!(EntryBackend::len(&t), 64);
    }

    #[test]
    fn iteration_visits_everything_in_both_directions() {
        let mut t = table(HashConfig::default());
        for i in 0..50 {
            t.insert(i, i);
        }
        let mut forward = Vec::new();
        let mut cur = t.first();
        while let Some(id) = cur {
            forward.push(*t.key(id));
            cur = t.next(id);
        }
        let mut backward = Vec::new();
        let mut cur = t.last();
        while let Some(id) = cur {
            backward.push(*t.key(id));
            cur = t.prev(id);
        }
        backward.reverse();
        assert_eq!(forward, backward);
        forward.sort_unstable();
        assert_eq!(forward, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn removal_in_chain_middle() {
        // One bucket forces every key into the same chain.
        let mut t: HashTable<u32, u32> = HashTable::create(
            EqualityComparator::new(|a: &u32, b: &u32| a == b, |_| 0),
            &HashConfig {
                initial_capacity: 2,
                load_factor: None,
            },
        )
        .unwrap();
        let a = t.insert(1, 1);
        let b = t.insert(2, 2);
        let c = t.insert(3, 3);
        assert_eq!(t.remove(b), (2, 2));
        assert_eq!(EntryBackend::find(&t, &1), Some(a));
        assert_eq!(EntryBackend::find(&t, &3), Some(c));
        assert_eq!(EntryBackend::find(&t, &2), None);
    }
}
