//! Key/value containers.
//!
//! [`Entries`] is one container type parameterized by its storage backend:
//!
//! | Alias | Backend | Order |
//! |-------|---------|-------|
//! | [`HashEntries`] | [`HashTable`] | bucket order |
//! | [`LinkedHashEntries`] | [`LinkedHashTable`] | insertion, adjustable on access/replace |
//! | [`RedBlackTreeEntries`] | [`RedBlackTree`] | key order, with [`SubTree`] views |
//!
//! The container owns the shared configuration (value strategy, validators,
//! bidirectional index, freeze counter, modification counter). Backends only
//! store nodes; every structural edit goes through the container so the
//! inverse index and the counters stay consistent.
//!
//! Mutating operations come in pairs: a plain form (`put`) and a form taking
//! a handler (`put_with`) that observes every change of the operation
//! through a [`Trigger`](crate::Trigger).
//!
//! # Example
//!
//! ```
//! use nexus_txcollections::{BidiType, HashEntries};
//!
//! let mut m = HashEntries::<&str, u32>::builder()
//!     .bidi(BidiType::AllValues)
//!     .build()
//!     .unwrap();
//!
//! m.put("k1", 1).unwrap();
//! m.put("k2", 1).unwrap();
//!
//! // "k1" held the value 1 and was removed as a conflict.
//! assert!(!m.contains_key(&"k1"));
//! assert_eq!(m.get_by_value(&1), Some(&"k2"));
//! ```

pub mod hash;
mod inverse;
pub mod linked_hash;
mod subtree;
pub mod tree;

use core::fmt;
use core::hash::Hash;
use core::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::attach::EntriesAttachProcessor;
use crate::contains::{ContainsSource, OverriddenContainsBehavior};
use crate::handler::{EntriesHandler, NoHandler};
use crate::suspend::FrozenContextSuspending;
use crate::trigger::{Freeze, Trigger};
use crate::{EntryId, EqualityComparator, Error, Result, UnifiedComparator, Validator};

pub use hash::{HashConfig, HashTable};
pub(crate) use inverse::KeyIndex;
pub use linked_hash::{DescendingEntries, LinkedHashConfig, LinkedHashTable, OrderAdjustMode};
pub use subtree::{SubTree, SubTreeIter};
pub use tree::RedBlackTree;

/// Unordered hash container.
pub type HashEntries<K, V> = Entries<K, V, HashTable<K, V>>;

/// Insertion-ordered hash container.
pub type LinkedHashEntries<K, V> = Entries<K, V, LinkedHashTable<K, V>>;

/// Key-ordered container.
pub type RedBlackTreeEntries<K, V> = Entries<K, V, RedBlackTree<K, V>>;

/// Above this ratio of own size to the other collection's size, bulk
/// removals look up the other collection's items instead of scanning this
/// container.
const REMOVE_ALL_SCAN_RATIO: usize = 10;

// =============================================================================
// Configuration
// =============================================================================

/// Whether a value-keyed inverse index is maintained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BidiType {
    /// No inverse index; values may repeat.
    #[default]
    None,
    /// Values for which the null-value predicate holds are exempt.
    NonNullValues,
    /// Every value is unique.
    AllValues,
}

/// Which key reference survives when a put meets an equal key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReplacementRule {
    /// The stored key is kept.
    #[default]
    OldReferenceWin,
    /// The incoming key replaces the stored one.
    NewReferenceWin,
}

/// Predicate marking "null" values for [`BidiType::NonNullValues`].
pub type NullValuePredicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

// =============================================================================
// Backend
// =============================================================================

/// Node storage and navigation for one ordering policy.
///
/// Backends never look at values and never touch the inverse index or the
/// counters; [`Entries`] does. Handles passed to the accessors are always
/// live: a stale handle is a broken invariant and may panic.
#[allow(unused_variables)]
pub trait EntryBackend<K, V>: Sized {
    /// Key strategy.
    type KeyComparator: Clone;
    /// Backend settings.
    type Config: Clone + Default;

    /// Creates an empty backend.
    fn create(comparator: Self::KeyComparator, config: &Self::Config) -> Result<Self>;

    /// Current settings.
    fn config(&self) -> Self::Config;

    /// Key strategy.
    fn key_comparator(&self) -> &Self::KeyComparator;

    /// Key strategy as a unified comparator.
    fn unified_key_comparator(&self) -> UnifiedComparator<K>;

    /// Returns `true` if `a` and `b` are the same key.
    fn key_equals(&self, a: &K, b: &K) -> bool {
        self.unified_key_comparator().equals(a, b)
    }

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns `true` if there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the entry for `key`.
    fn find(&self, key: &K) -> Option<EntryId>;

    /// Returns `true` if `id` names a live entry.
    fn contains_id(&self, id: EntryId) -> bool;

    /// Key of a live entry.
    fn key(&self, id: EntryId) -> &K;

    /// Value of a live entry.
    fn value(&self, id: EntryId) -> &V;

    /// Mutable value of a live entry.
    fn value_mut(&mut self, id: EntryId) -> &mut V;

    /// Replaces the key of a live entry with an equal key.
    fn set_key(&mut self, id: EntryId, key: K);

    /// Inserts a key known to be absent.
    fn insert(&mut self, key: K, value: V) -> EntryId;

    /// Removes a live entry.
    fn remove(&mut self, id: EntryId) -> (K, V);

    /// Removes every entry.
    fn clear(&mut self);

    /// First entry in iteration order.
    fn first(&self) -> Option<EntryId>;

    /// Last entry in iteration order.
    fn last(&self) -> Option<EntryId>;

    /// Entry after `id`.
    fn next(&self, id: EntryId) -> Option<EntryId>;

    /// Entry before `id`.
    fn prev(&self, id: EntryId) -> Option<EntryId>;

    /// Shrinks internal tables after removals.
    ///
    /// Never called while a cursor may be walking the backend.
    fn compact(&mut self) {}

    /// Returns `true` if accessing `id` reorders the backend.
    fn access_moves(&self, id: EntryId) -> bool {
        false
    }

    /// Applies the access policy to `id`.
    fn on_accessed(&mut self, id: EntryId) {}

    /// Applies the replace policy to `id` after its value changed.
    fn on_replaced(&mut self, id: EntryId) {}

    /// Key of the entry following `id`, for backends whose order survives
    /// a remove/reinsert only with help.
    fn successor_key(&self, id: EntryId) -> Option<K>
    where
        K: Clone,
    {
        None
    }

    /// Restores the position of a resumed entry in front of `after`.
    fn on_resumed(&mut self, id: EntryId, after: Option<&K>) {}

    /// Builds an empty backend from strictly ascending input in one pass.
    ///
    /// Hands the input back when the backend is not empty, the input is not
    /// sorted, or the backend has no such fast path.
    fn load_sorted(&mut self, items: Vec<(K, V)>) -> core::result::Result<(), Vec<(K, V)>> {
        Err(items)
    }

    /// Whether readers can share the backend under a read lock.
    fn is_read_write_lock_supported(&self) -> bool {
        true
    }

    /// Whether new entries are linked in front of existing ones.
    fn inserts_at_head(&self) -> bool {
        false
    }
}

// =============================================================================
// Root data
// =============================================================================

pub(crate) struct RootData<K, V> {
    pub(crate) value_comparator: UnifiedComparator<V>,
    pub(crate) key_validator: Option<Validator<K>>,
    pub(crate) value_validator: Option<Validator<V>>,
    pub(crate) bidi: BidiType,
    pub(crate) null_value: Option<NullValuePredicate<V>>,
    pub(crate) replacement: ReplacementRule,
    pub(crate) freeze: Freeze,
    pub(crate) mod_count: u64,
    pub(crate) inverse: Option<KeyIndex<V, K>>,
    pub(crate) inverse_suspending: Option<FrozenContextSuspending<K, V>>,
}

impl<K, V> RootData<K, V> {
    /// Returns `true` if `value` takes part in the inverse index.
    #[inline]
    pub(crate) fn is_indexed(&self, value: &V) -> bool {
        match self.bidi {
            BidiType::None => false,
            BidiType::AllValues => true,
            BidiType::NonNullValues => !self.null_value.as_ref().is_some_and(|is_null| is_null(value)),
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures an [`Entries`] container.
pub struct EntriesBuilder<K, V, B: EntryBackend<K, V>> {
    pub(crate) key_comparator: B::KeyComparator,
    pub(crate) value_comparator: UnifiedComparator<V>,
    pub(crate) key_validator: Option<Validator<K>>,
    pub(crate) value_validator: Option<Validator<V>>,
    pub(crate) bidi: BidiType,
    pub(crate) null_value: Option<NullValuePredicate<V>>,
    pub(crate) replacement: ReplacementRule,
    pub(crate) config: B::Config,
}

impl<K, V, B: EntryBackend<K, V>> Clone for EntriesBuilder<K, V, B> {
    fn clone(&self) -> Self {
        Self {
            key_comparator: self.key_comparator.clone(),
            value_comparator: self.value_comparator.clone(),
            key_validator: self.key_validator.clone(),
            value_validator: self.value_validator.clone(),
            bidi: self.bidi,
            null_value: self.null_value.clone(),
            replacement: self.replacement,
            config: self.config.clone(),
        }
    }
}

impl<K, V, B: EntryBackend<K, V>> EntriesBuilder<K, V, B> {
    /// Starts from explicit key and value strategies.
    pub fn new(key_comparator: B::KeyComparator, value_comparator: impl Into<UnifiedComparator<V>>) -> Self {
        Self {
            key_comparator,
            value_comparator: value_comparator.into(),
            key_validator: None,
            value_validator: None,
            bidi: BidiType::None,
            null_value: None,
            replacement: ReplacementRule::OldReferenceWin,
            config: B::Config::default(),
        }
    }

    /// Key strategy.
    pub fn key_comparator(mut self, comparator: B::KeyComparator) -> Self {
        self.key_comparator = comparator;
        self
    }

    /// Value strategy. Decides the inverse index backend: hashed for an
    /// equality strategy, ordered for a total order.
    pub fn value_comparator(mut self, comparator: impl Into<UnifiedComparator<V>>) -> Self {
        self.value_comparator = comparator.into();
        self
    }

    /// Rejects keys before any mutation starts.
    pub fn key_validator(mut self, validator: Validator<K>) -> Self {
        self.key_validator = Some(validator);
        self
    }

    /// Rejects values before any mutation starts.
    pub fn value_validator(mut self, validator: Validator<V>) -> Self {
        self.value_validator = Some(validator);
        self
    }

    /// Bidirectional mode.
    pub fn bidi(mut self, bidi: BidiType) -> Self {
        self.bidi = bidi;
        self
    }

    /// Marks the values exempt from [`BidiType::NonNullValues`] indexing.
    pub fn null_value<F>(mut self, is_null: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.null_value = Some(Arc::new(is_null));
        self
    }

    /// Key replacement rule.
    pub fn replacement_rule(mut self, rule: ReplacementRule) -> Self {
        self.replacement = rule;
        self
    }

    /// Backend settings.
    pub fn config(mut self, config: B::Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the container.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid backend settings, or for
    /// [`BidiType::NonNullValues`] without a null-value predicate.
    pub fn build(self) -> Result<Entries<K, V, B>> {
        if self.bidi == BidiType::NonNullValues && self.null_value.is_none() {
            return Err(Error::Config(
                "NonNullValues requires a null-value predicate".into(),
            ));
        }
        let backend = B::create(self.key_comparator, &self.config)?;
        let inverse = (self.bidi != BidiType::None).then(|| KeyIndex::new(self.value_comparator.clone()));
        Ok(Entries {
            backend,
            root: RootData {
                value_comparator: self.value_comparator,
                key_validator: self.key_validator,
                value_validator: self.value_validator,
                bidi: self.bidi,
                null_value: self.null_value,
                replacement: self.replacement,
                freeze: Freeze::default(),
                mod_count: 0,
                inverse,
                inverse_suspending: None,
            },
        })
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A key/value container with trigger-aware mutation.
pub struct Entries<K, V, B> {
    pub(crate) backend: B,
    pub(crate) root: RootData<K, V>,
}

impl<K, V, B> Entries<K, V, B>
where
    B: EntryBackend<K, V>,
    B::KeyComparator: Default,
    V: Eq + Hash + 'static,
{
    /// A builder with natural key and value strategies.
    pub fn builder() -> EntriesBuilder<K, V, B> {
        EntriesBuilder::new(B::KeyComparator::default(), EqualityComparator::<V>::natural())
    }
}

impl<K, V, B: EntryBackend<K, V>> Entries<K, V, B> {
    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns `true` if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Structural modification counter.
    #[inline]
    pub fn mod_count(&self) -> u64 {
        self.root.mod_count
    }

    /// Returns `true` while a handler callback is running.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.root.freeze.is_frozen()
    }

    /// Blocks new mutations until [`unfreeze`](Self::unfreeze).
    pub fn freeze(&mut self) {
        self.root.freeze.freeze();
    }

    /// Releases one [`freeze`](Self::freeze).
    pub fn unfreeze(&mut self) -> Result<()> {
        self.root.freeze.unfreeze()
    }

    /// Bidirectional mode.
    #[inline]
    pub fn bidi_type(&self) -> BidiType {
        self.root.bidi
    }

    /// Key replacement rule.
    #[inline]
    pub fn replacement_rule(&self) -> ReplacementRule {
        self.root.replacement
    }

    /// Key strategy.
    #[inline]
    pub fn key_comparator(&self) -> &B::KeyComparator {
        self.backend.key_comparator()
    }

    /// Value strategy.
    #[inline]
    pub fn value_comparator(&self) -> &UnifiedComparator<V> {
        &self.root.value_comparator
    }

    /// Whether readers can share this container under a read lock.
    #[inline]
    pub fn is_read_write_lock_supported(&self) -> bool {
        self.backend.is_read_write_lock_supported()
    }

    /// The storage backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Finds the entry for `key`.
    #[inline]
    pub fn find(&self, key: &K) -> Option<EntryId> {
        self.backend.find(key)
    }

    /// Key and value of a live entry.
    pub fn entry(&self, id: EntryId) -> Option<(&K, &V)> {
        if !self.backend.contains_id(id) {
            return None;
        }
        Some((self.backend.key(id), self.backend.value(id)))
    }

    /// Value for `key`, without applying the access policy.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.backend.find(key).map(|id| self.backend.value(id))
    }

    /// Stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.backend
            .find(key)
            .map(|id| (self.backend.key(id), self.backend.value(id)))
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.backend.find(key).is_some()
    }

    /// Returns `true` if some entry holds `value`.
    pub fn contains_value(&self, value: &V) -> bool {
        self.find_by_value(value).is_some()
    }

    /// Key of the entry holding `value`.
    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.find_by_value(value).map(|id| self.backend.key(id))
    }

    /// Entry holding `value`; `O(1)`/`O(log n)` through the inverse index
    /// when the value is indexed, a scan otherwise.
    pub fn find_by_value(&self, value: &V) -> Option<EntryId> {
        if let Some(inverse) = &self.root.inverse {
            if self.root.is_indexed(value) {
                return inverse.get(value).and_then(|key| self.backend.find(key));
            }
        }
        self.scan().find(|id| self.root.value_comparator.equals(self.backend.value(*id), value))
    }

    /// First entry in iteration order.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.backend.first().and_then(|id| self.entry(id))
    }

    /// Last entry in iteration order.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.backend.last().and_then(|id| self.entry(id))
    }

    /// Iterates entries in backend order.
    pub fn iter(&self) -> Iter<'_, K, V, B> {
        Iter {
            backend: &self.backend,
            front: self.backend.first(),
            back: self.backend.last(),
            remaining: self.backend.len(),
            _marker: PhantomData,
        }
    }

    /// Iterates keys in backend order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterates values in backend order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// A fail-fast cursor positioned before the first entry.
    pub fn cursor(&self) -> EntriesCursor {
        EntriesCursor {
            next: self.backend.first(),
            last: None,
            expected_mod_count: self.root.mod_count,
        }
    }

    pub(crate) fn scan(&self) -> impl Iterator<Item = EntryId> + '_ {
        core::iter::successors(self.backend.first(), |id| self.backend.next(*id))
    }
}

impl<K, V, B> Entries<K, V, B>
where
    K: Clone,
    V: Clone,
    B: EntryBackend<K, V>,
{
    // =========================================================================
    // Structural helpers
    // =========================================================================

    /// Cloned key and value of a live entry.
    #[inline]
    pub(crate) fn pair(&self, id: EntryId) -> (K, V) {
        (self.backend.key(id).clone(), self.backend.value(id).clone())
    }

    /// Inserts an absent key, mirroring into the inverse index.
    pub(crate) fn add_entry(&mut self, key: K, value: V) -> EntryId {
        if self.root.is_indexed(&value) {
            if let Some(inverse) = &mut self.root.inverse {
                inverse.put(value.clone(), key.clone());
            }
        }
        self.root.mod_count += 1;
        self.backend.insert(key, value)
    }

    /// Replaces the value (and with `new_key`, the key reference) of a live
    /// entry, mirroring into the inverse index.
    pub(crate) fn change_entry(&mut self, id: EntryId, new_key: Option<K>, value: V) -> V {
        let indexed_new = self.root.is_indexed(&value);
        let mirrored = indexed_new.then(|| value.clone());
        let old = core::mem::replace(self.backend.value_mut(id), value);
        if let Some(key) = new_key {
            self.backend.set_key(id, key);
        }
        let indexed_old = self.root.is_indexed(&old);
        if let Some(inverse) = &mut self.root.inverse {
            if indexed_old {
                inverse.remove(&old);
            }
            if let Some(value) = mirrored {
                inverse.put(value, self.backend.key(id).clone());
            }
        }
        self.backend.on_replaced(id);
        old
    }

    /// Removes a live entry, mirroring into the inverse index.
    pub(crate) fn delete_entry(&mut self, id: EntryId) -> (K, V) {
        let (key, value) = self.backend.remove(id);
        if self.root.is_indexed(&value) {
            if let Some(inverse) = &mut self.root.inverse {
                inverse.remove(&value);
            }
        }
        self.root.mod_count += 1;
        (key, value)
    }

    /// Applies already resolved puts. Conflicts must have been deleted.
    pub(crate) fn put_pending(&mut self, pending: Vec<(K, V)>) -> Vec<Option<V>> {
        let strict = self.root.replacement == ReplacementRule::NewReferenceWin;
        let mut old_values = Vec::with_capacity(pending.len());
        let pending = if self.backend.is_empty() && pending.len() > 1 {
            match self.load_sorted(pending) {
                Ok(count) => {
                    old_values.resize_with(count, || None);
                    return old_values;
                }
                Err(pending) => pending,
            }
        } else {
            pending
        };
        for (key, value) in pending {
            match self.backend.find(&key) {
                Some(id) => {
                    let new_key = strict.then_some(key);
                    old_values.push(Some(self.change_entry(id, new_key, value)));
                }
                None => {
                    self.add_entry(key, value);
                    old_values.push(None);
                }
            }
        }
        old_values
    }

    fn load_sorted(&mut self, items: Vec<(K, V)>) -> core::result::Result<usize, Vec<(K, V)>> {
        let count = items.len();
        self.backend.load_sorted(items)?;
        if self.root.inverse.is_some() {
            let mirror: Vec<(K, V)> = self
                .scan()
                .filter(|id| self.root.is_indexed(self.backend.value(*id)))
                .map(|id| self.pair(id))
                .collect();
            if let Some(inverse) = &mut self.root.inverse {
                for (k, v) in mirror {
                    inverse.put(v, k);
                }
            }
        }
        self.root.mod_count += 1;
        Ok(count)
    }

    /// Keeps the last occurrence of every key, and with an inverse index of
    /// every indexed value.
    pub(crate) fn distinct(&self, items: Vec<(K, V)>) -> Vec<(K, V)> {
        let mut keys: KeyIndex<K, ()> = KeyIndex::new(self.backend.unified_key_comparator());
        let mut values: Option<KeyIndex<V, ()>> = self
            .root
            .inverse
            .as_ref()
            .map(|_| KeyIndex::new(self.root.value_comparator.clone()));
        let mut kept: Vec<(K, V)> = Vec::with_capacity(items.len());
        for (key, value) in items.into_iter().rev() {
            if !keys.insert_new(key.clone(), ()) {
                continue;
            }
            if let Some(values) = &mut values {
                if self.root.is_indexed(&value) && !values.insert_new(value.clone(), ()) {
                    continue;
                }
            }
            kept.push((key, value));
        }
        kept.reverse();
        kept
    }

    // =========================================================================
    // Put
    // =========================================================================

    /// Maps `key` to `value`, returning the previous value.
    ///
    /// With an inverse index, an entry already holding `value` under another
    /// key is removed first.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.put_impl::<NoHandler>(key, value, None, None, None)
    }

    /// [`put`](Self::put) observed by `handler`.
    pub fn put_with<H>(&mut self, key: K, value: V, handler: &mut H) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.put_impl(key, value, None, Some(handler), None)
    }

    /// Removes the entry for `conflict` (if any) and maps `key` to `value`
    /// in one operation.
    ///
    /// # Errors
    ///
    /// [`Error::ManualConflictWithBidi`] on bidirectional containers, whose
    /// conflicts are derived from the inverse index.
    pub fn put_replacing(&mut self, conflict: &K, key: K, value: V) -> Result<Option<V>> {
        self.put_impl::<NoHandler>(key, value, Some(conflict), None, None)
    }

    /// [`put_replacing`](Self::put_replacing) observed by `handler`.
    pub fn put_replacing_with<H>(&mut self, conflict: &K, key: K, value: V, handler: &mut H) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.put_impl(key, value, Some(conflict), Some(handler), None)
    }

    pub(crate) fn put_impl<H>(
        &mut self,
        key: K,
        value: V,
        manual_conflict: Option<&K>,
        handler: Option<&mut H>,
        mut suspending: Option<&mut FrozenContextSuspending<K, V>>,
    ) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        let mut processor = EntriesAttachProcessor::new(self, handler)?;
        processor.initialize(self, key, value, manual_conflict)?;
        let mut old = None;
        if processor.begin_execute(self, suspending.as_deref_mut())? {
            let pending = processor.take_pending();
            old = self.put_pending(pending).pop().flatten();
            processor.end_execute(None)?;
        }
        if let Some(suspending) = suspending {
            self.on_resumed(suspending);
        }
        processor.flush(self)?;
        Ok(old)
    }

    /// Puts every pair. Later pairs win over earlier ones with the same key
    /// (and, with an inverse index, the same value).
    ///
    /// A tree receiving strictly ascending input while empty is built in one
    /// linear pass.
    pub fn put_all<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all_impl::<NoHandler>(items.into_iter().collect(), None)
    }

    /// [`put_all`](Self::put_all) observed by `handler`.
    pub fn put_all_with<I, H>(&mut self, items: I, handler: &mut H) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.put_all_impl(items.into_iter().collect(), Some(handler))
    }

    fn put_all_impl<H>(&mut self, items: Vec<(K, V)>, handler: Option<&mut H>) -> Result<()>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        if items.is_empty() {
            return Ok(());
        }
        let mut processor = EntriesAttachProcessor::new(self, handler)?;
        processor.initialize_all(self, items)?;
        if processor.begin_execute(self, None)? {
            let pending = processor.take_pending();
            self.put_pending(pending);
            processor.end_execute(None)?;
        }
        processor.flush(self)
    }

    /// Inserts `V::default()` for every absent key; present keys are left
    /// untouched. Returns `true` if anything was inserted.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] on bidirectional containers, where default
    /// values would collide.
    pub fn add_all<I>(&mut self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = K>,
        V: Default,
    {
        self.add_all_impl::<_, NoHandler>(keys, None)
    }

    /// [`add_all`](Self::add_all) observed by `handler`.
    pub fn add_all_with<I, H>(&mut self, keys: I, handler: &mut H) -> Result<bool>
    where
        I: IntoIterator<Item = K>,
        V: Default,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.add_all_impl(keys, Some(handler))
    }

    fn add_all_impl<I, H>(&mut self, keys: I, handler: Option<&mut H>) -> Result<bool>
    where
        I: IntoIterator<Item = K>,
        V: Default,
        H: EntriesHandler<K, V> + ?Sized,
    {
        if self.root.inverse.is_some() {
            return Err(Error::Unsupported("add_all on a bidirectional container"));
        }
        self.root.freeze.check()?;
        let absent: Vec<(K, V)> = keys
            .into_iter()
            .filter(|k| !self.contains_key(k))
            .map(|k| (k, V::default()))
            .collect();
        let changed = !absent.is_empty();
        self.put_all_impl(absent, handler)?;
        Ok(changed)
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Value for `key`, applying the backend's access policy (for example
    /// moving the entry to the head of an access-ordered table).
    pub fn access(&mut self, key: &K) -> Result<Option<&V>> {
        self.access_impl::<NoHandler>(key, None)
    }

    /// [`access`](Self::access) observed by `handler`; a reordering access
    /// is reported as a change of the entry onto itself.
    pub fn access_with<H>(&mut self, key: &K, handler: &mut H) -> Result<Option<&V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.access_impl(key, Some(handler))
    }

    fn access_impl<H>(&mut self, key: &K, handler: Option<&mut H>) -> Result<Option<&V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        let Some(id) = self.backend.find(key) else {
            return Ok(None);
        };
        if !self.backend.access_moves(id) {
            return Ok(Some(self.backend.value(id)));
        }
        self.root.freeze.check()?;
        match handler {
            None => self.backend.on_accessed(id),
            Some(handler) => {
                let mut trigger = Trigger::new(handler, &self.root.freeze)?;
                let pair = self.pair(id);
                trigger.pre_change(&mut self.root.freeze, id, pair.clone(), pair)?;
                if trigger.begin_execute()? {
                    self.backend.on_accessed(id);
                    trigger.end_execute(None)?;
                }
                trigger.flush(&mut self.root.freeze)?;
            }
        }
        Ok(Some(self.backend.value(id)))
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes the entry for `key`, returning its key and value.
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
        self.root.freeze.check()?;
        match self.backend.find(key) {
            Some(id) => Ok(self.remove_ids(vec![id], handler, true)?.pop()),
            None => Ok(None),
        }
    }

    /// Removes the entry `id`. Returns `None` for a stale handle.
    pub fn remove_entry(&mut self, id: EntryId) -> Result<Option<(K, V)>> {
        self.remove_entry_impl::<NoHandler>(id, None)
    }

    /// [`remove_entry`](Self::remove_entry) observed by `handler`.
    pub fn remove_entry_with<H>(&mut self, id: EntryId, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_entry_impl(id, Some(handler))
    }

    fn remove_entry_impl<H>(&mut self, id: EntryId, handler: Option<&mut H>) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        if !self.backend.contains_id(id) {
            return Ok(None);
        }
        Ok(self.remove_ids(vec![id], handler, true)?.pop())
    }

    /// Removes the first entry holding `value`.
    pub fn remove_by_value(&mut self, value: &V) -> Result<Option<(K, V)>> {
        self.remove_by_value_impl::<NoHandler>(value, None)
    }

    /// [`remove_by_value`](Self::remove_by_value) observed by `handler`.
    pub fn remove_by_value_with<H>(&mut self, value: &V, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_by_value_impl(value, Some(handler))
    }

    fn remove_by_value_impl<H>(&mut self, value: &V, handler: Option<&mut H>) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        match self.find_by_value(value) {
            Some(id) => Ok(self.remove_ids(vec![id], handler, true)?.pop()),
            None => Ok(None),
        }
    }

    /// Removes the first entry in iteration order.
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

    /// Removes the last entry in iteration order.
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
        self.root.freeze.check()?;
        let id = if first { self.backend.first() } else { self.backend.last() };
        match id {
            Some(id) => Ok(self.remove_ids(vec![id], handler, true)?.pop()),
            None => Ok(None),
        }
    }

    /// Removes every entry whose key is in `keys`. Returns `true` if
    /// anything was removed.
    pub fn remove_all_by_keys<C>(&mut self, keys: &C) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
    {
        self.remove_all_by_keys_impl::<C, NoHandler>(keys, None)
    }

    /// [`remove_all_by_keys`](Self::remove_all_by_keys) observed by `handler`.
    pub fn remove_all_by_keys_with<C, H>(&mut self, keys: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_all_by_keys_impl(keys, Some(handler))
    }

    fn remove_all_by_keys_impl<C, H>(&mut self, keys: &C, handler: Option<&mut H>) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        let ids = if keys.source_len() * REMOVE_ALL_SCAN_RATIO < self.len() {
            let mut seen = hashbrown::HashSet::new();
            keys.source_iter()
                .filter_map(|k| self.backend.find(k))
                .filter(|id| seen.insert(*id))
                .collect()
        } else {
            let cmp = self.backend.unified_key_comparator();
            let behavior = OverriddenContainsBehavior::new(keys, &cmp);
            self.scan()
                .filter(|id| behavior.contains(self.backend.key(*id)))
                .collect::<Vec<_>>()
        };
        self.remove_matching(ids, handler)
    }

    /// Removes every entry whose value is in `values`.
    pub fn remove_all_by_values<C>(&mut self, values: &C) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
    {
        self.remove_all_by_values_impl::<C, NoHandler>(values, None)
    }

    /// [`remove_all_by_values`](Self::remove_all_by_values) observed by
    /// `handler`.
    pub fn remove_all_by_values_with<C, H>(&mut self, values: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_all_by_values_impl(values, Some(handler))
    }

    fn remove_all_by_values_impl<C, H>(&mut self, values: &C, handler: Option<&mut H>) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        let indexed_lookup = self.root.bidi == BidiType::AllValues
            && values.source_len() * REMOVE_ALL_SCAN_RATIO < self.len();
        let ids = if indexed_lookup {
            let mut seen = hashbrown::HashSet::new();
            values
                .source_iter()
                .filter_map(|v| self.find_by_value(v))
                .filter(|id| seen.insert(*id))
                .collect()
        } else {
            let behavior = OverriddenContainsBehavior::new(values, &self.root.value_comparator);
            self.scan()
                .filter(|id| behavior.contains(self.backend.value(*id)))
                .collect::<Vec<_>>()
        };
        self.remove_matching(ids, handler)
    }

    /// Keeps only entries whose key is in `keys`.
    pub fn retain_all_by_keys<C>(&mut self, keys: &C) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
    {
        self.retain_all_by_keys_impl::<C, NoHandler>(keys, None)
    }

    /// [`retain_all_by_keys`](Self::retain_all_by_keys) observed by `handler`.
    pub fn retain_all_by_keys_with<C, H>(&mut self, keys: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.retain_all_by_keys_impl(keys, Some(handler))
    }

    fn retain_all_by_keys_impl<C, H>(&mut self, keys: &C, handler: Option<&mut H>) -> Result<bool>
    where
        C: ContainsSource<K> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        let cmp = self.backend.unified_key_comparator();
        let behavior = OverriddenContainsBehavior::new(keys, &cmp);
        let ids: Vec<EntryId> = self
            .scan()
            .filter(|id| !behavior.contains(self.backend.key(*id)))
            .collect();
        self.remove_matching(ids, handler)
    }

    /// Keeps only entries whose value is in `values`.
    pub fn retain_all_by_values<C>(&mut self, values: &C) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
    {
        self.retain_all_by_values_impl::<C, NoHandler>(values, None)
    }

    /// [`retain_all_by_values`](Self::retain_all_by_values) observed by
    /// `handler`.
    pub fn retain_all_by_values_with<C, H>(&mut self, values: &C, handler: &mut H) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.retain_all_by_values_impl(values, Some(handler))
    }

    fn retain_all_by_values_impl<C, H>(&mut self, values: &C, handler: Option<&mut H>) -> Result<bool>
    where
        C: ContainsSource<V> + ?Sized,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.root.freeze.check()?;
        let behavior = OverriddenContainsBehavior::new(values, &self.root.value_comparator);
        let ids: Vec<EntryId> = self
            .scan()
            .filter(|id| !behavior.contains(self.backend.value(*id)))
            .collect();
        self.remove_matching(ids, handler)
    }

    fn remove_matching<H>(&mut self, ids: Vec<EntryId>, handler: Option<&mut H>) -> Result<bool>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        if ids.is_empty() {
            return Ok(false);
        }
        trace!(count = ids.len(), "bulk removal");
        self.remove_ids(ids, handler, true)?;
        Ok(true)
    }

    /// Removes every entry.
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
        self.root.freeze.check()?;
        if self.is_empty() {
            return Ok(());
        }
        let Some(handler) = handler else {
            self.clear_structure();
            return Ok(());
        };
        let mut trigger = Trigger::with_capacity(handler, &self.root.freeze, self.len())?;
        let ids: Vec<EntryId> = self.scan().collect();
        for id in ids {
            let pair = self.pair(id);
            trigger.pre_remove(&mut self.root.freeze, id, pair)?;
        }
        if trigger.begin_execute()? {
            self.clear_structure();
            trigger.end_execute(None)?;
        }
        trigger.flush(&mut self.root.freeze).map(drop)
    }

    fn clear_structure(&mut self) {
        self.backend.clear();
        if let Some(inverse) = &mut self.root.inverse {
            inverse.clear();
        }
        self.root.mod_count += 1;
    }

    /// Deletes live entries in order under one trigger.
    pub(crate) fn remove_ids<H>(
        &mut self,
        ids: Vec<EntryId>,
        handler: Option<&mut H>,
        compact: bool,
    ) -> Result<Vec<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        let mut removed = Vec::with_capacity(ids.len());
        let Some(handler) = handler else {
            for id in ids {
                removed.push(self.delete_entry(id));
            }
            if compact {
                self.backend.compact();
            }
            return Ok(removed);
        };
        let mut trigger = Trigger::with_capacity(handler, &self.root.freeze, ids.len())?;
        for &id in &ids {
            let pair = self.pair(id);
            trigger.pre_remove(&mut self.root.freeze, id, pair)?;
        }
        if trigger.begin_execute()? {
            for id in ids {
                removed.push(self.delete_entry(id));
            }
            if compact {
                self.backend.compact();
            }
            trigger.end_execute(None)?;
        }
        trigger.flush(&mut self.root.freeze)?;
        Ok(removed)
    }

    // =========================================================================
    // Suspend / resume
    // =========================================================================

    /// Removes the entry for `key` so its key can be mutated, returning a
    /// snapshot to resume it with.
    ///
    /// Resuming restores the entry's position in insertion-ordered
    /// containers.
    pub fn suspend_via_frozen_context(&mut self, key: &K) -> Result<Option<FrozenContextSuspending<K, V>>> {
        self.root.freeze.check()?;
        let Some(id) = self.backend.find(key) else {
            return Ok(None);
        };
        let after = self.backend.successor_key(id);
        let Some((key, value)) = self.remove_ids::<NoHandler>(vec![id], None, false)?.pop() else {
            return Ok(None);
        };
        debug!("suspended entry via frozen context");
        Ok(Some(FrozenContextSuspending::new(key, value, after)))
    }

    /// Reinserts a suspended entry.
    ///
    /// Conflicts deleted while resuming keep the snapshot's position anchor
    /// valid (see [`FrozenContextSuspending::on_conflict_deleted`]).
    pub fn resume_via_frozen_context(&mut self, mut suspending: FrozenContextSuspending<K, V>) -> Result<()> {
        let key = suspending.key().clone();
        let value = suspending.value().clone();
        self.put_impl::<NoHandler>(key, value, None, None, Some(&mut suspending))?;
        debug!("resumed entry via frozen context");
        Ok(())
    }

    /// Removes the entry holding `value` so the value can be mutated.
    /// Returns `false` if no entry holds it.
    ///
    /// Only one value can be suspended at a time; a pending suspension is
    /// replaced.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] without an inverse index.
    pub fn suspend_value(&mut self, value: &V) -> Result<bool> {
        if self.root.inverse.is_none() {
            return Err(Error::Unsupported("value suspension without an inverse index"));
        }
        let Some(key) = self.get_by_value(value).cloned() else {
            return Ok(false);
        };
        let suspending = self.suspend_via_frozen_context(&key)?;
        let suspended = suspending.is_some();
        self.root.inverse_suspending = suspending;
        Ok(suspended)
    }

    /// Reinserts the suspended entry with `value`.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchElement`] if no value is suspended.
    pub fn resume_value(&mut self, value: V) -> Result<()> {
        let Some(mut suspending) = self.root.inverse_suspending.take() else {
            return Err(Error::NoSuchElement);
        };
        suspending.set_value(value);
        self.resume_via_frozen_context(suspending)
    }

    fn on_resumed(&mut self, suspending: &FrozenContextSuspending<K, V>) {
        if let Some(id) = self.backend.find(suspending.key()) {
            self.backend.on_resumed(id, suspending.after());
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, B: EntryBackend<K, V>> fmt::Debug for Entries<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, B: EntryBackend<K, V>> ContainsSource<K> for Entries<K, V, B> {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn source_comparator(&self) -> Option<UnifiedComparator<K>> {
        Some(self.backend.unified_key_comparator())
    }

    fn source_contains(&self, item: &K) -> bool {
        self.contains_key(item)
    }

    fn source_iter(&self) -> Box<dyn Iterator<Item = &K> + '_> {
        Box::new(self.keys())
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// Borrowing iterator over entries in backend order.
pub struct Iter<'a, K, V, B> {
    backend: &'a B,
    front: Option<EntryId>,
    back: Option<EntryId>,
    remaining: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K: 'a, V: 'a, B: EntryBackend<K, V>> Iterator for Iter<'a, K, V, B> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        self.front = self.backend.next(id);
        self.remaining -= 1;
        Some((self.backend.key(id), self.backend.value(id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K: 'a, V: 'a, B: EntryBackend<K, V>> DoubleEndedIterator for Iter<'a, K, V, B> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        self.back = self.backend.prev(id);
        self.remaining -= 1;
        Some((self.backend.key(id), self.backend.value(id)))
    }
}

impl<'a, K: 'a, V: 'a, B: EntryBackend<K, V>> ExactSizeIterator for Iter<'a, K, V, B> {}

impl<'a, K: 'a, V: 'a, B: EntryBackend<K, V>> IntoIterator for &'a Entries<K, V, B> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, B>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Detached, fail-fast cursor over an [`Entries`] container.
///
/// The cursor does not borrow the container, so entries can be removed
/// through it between steps. Any structural change not made through this
/// cursor makes the next step fail with [`Error::ConcurrentModification`].
///
/// ```
/// use nexus_txcollections::HashEntries;
///
/// let mut m = HashEntries::<u32, u32>::builder().build().unwrap();
/// m.put_all((0..10).map(|i| (i, i))).unwrap();
///
/// let mut cursor = m.cursor();
/// while let Some((_, k, _)) = cursor.next(&m).unwrap() {
///     if k % 2 == 0 {
///         cursor.remove(&mut m).unwrap();
///     }
/// }
/// assert_eq!(m.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct EntriesCursor {
    next: Option<EntryId>,
    last: Option<EntryId>,
    expected_mod_count: u64,
}

impl EntriesCursor {
    fn check<K, V, B>(&self, entries: &Entries<K, V, B>) -> Result<()> {
        if entries.root.mod_count != self.expected_mod_count {
            return Err(Error::ConcurrentModification);
        }
        Ok(())
    }

    /// Advances to the next entry.
    #[allow(clippy::should_implement_trait)]
    pub fn next<'a, K, V, B>(&mut self, entries: &'a Entries<K, V, B>) -> Result<Option<(EntryId, &'a K, &'a V)>>
    where
        B: EntryBackend<K, V>,
    {
        self.check(entries)?;
        let Some(id) = self.next else {
            self.last = None;
            return Ok(None);
        };
        self.next = entries.backend.next(id);
        self.last = Some(id);
        Ok(Some((id, entries.backend.key(id), entries.backend.value(id))))
    }

    /// Removes the entry last returned by [`next`](Self::next).
    pub fn remove<K, V, B>(&mut self, entries: &mut Entries<K, V, B>) -> Result<(K, V)>
    where
        K: Clone,
        V: Clone,
        B: EntryBackend<K, V>,
    {
        self.remove_impl::<K, V, B, NoHandler>(entries, None)
    }

    /// [`remove`](Self::remove) observed by `handler`.
    pub fn remove_with<K, V, B, H>(&mut self, entries: &mut Entries<K, V, B>, handler: &mut H) -> Result<(K, V)>
    where
        K: Clone,
        V: Clone,
        B: EntryBackend<K, V>,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.remove_impl(entries, Some(handler))
    }

    fn remove_impl<K, V, B, H>(&mut self, entries: &mut Entries<K, V, B>, handler: Option<&mut H>) -> Result<(K, V)>
    where
        K: Clone,
        V: Clone,
        B: EntryBackend<K, V>,
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.check(entries)?;
        entries.root.freeze.check()?;
        let id = self.last.take().ok_or(Error::NoSuchElement)?;
        let result = entries.remove_ids(vec![id], handler, false);
        self.expected_mod_count = entries.root.mod_count;
        result?.pop().ok_or(Error::NoSuchElement)
    }
}
