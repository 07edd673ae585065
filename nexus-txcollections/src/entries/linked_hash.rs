//! Insertion-ordered hash table.
//!
//! The bucket chains of [`HashTable`] carry an extra pair of `before`/`after`
//! links forming a doubly linked list through all entries. New entries are
//! linked at the tail (or the head with `head_append`). Access and
//! replacement may reorder an entry according to [`OrderAdjustMode`].

use tracing::trace;

use super::hash::{HashConfig, HashTable};
use super::{EntriesBuilder, EntryBackend, LinkedHashEntries};
use crate::handler::EntriesHandler;
use crate::{EntryId, EqualityComparator, Index, Result, UnifiedComparator};

/// Where an entry moves when it is accessed or replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderAdjustMode {
    /// Stays in place.
    #[default]
    None,
    /// Moves to the head.
    Head,
    /// Moves to the tail.
    Tail,
    /// Swaps with its predecessor.
    Prev,
    /// Swaps with its successor.
    Next,
}

impl OrderAdjustMode {
    /// The same movement seen through a reversed view.
    pub const fn descending(self) -> Self {
        match self {
            OrderAdjustMode::None => OrderAdjustMode::None,
            OrderAdjustMode::Head => OrderAdjustMode::Tail,
            OrderAdjustMode::Tail => OrderAdjustMode::Head,
            OrderAdjustMode::Prev => OrderAdjustMode::Next,
            OrderAdjustMode::Next => OrderAdjustMode::Prev,
        }
    }
}

/// Settings of a [`LinkedHashTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkedHashConfig {
    /// Bucket table settings.
    pub hash: HashConfig,
    /// Link new entries at the head instead of the tail.
    pub head_append: bool,
    /// Movement applied by `access`.
    pub access_mode: OrderAdjustMode,
    /// Movement applied when a put replaces a value.
    pub replace_mode: OrderAdjustMode,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Links {
    before: u32,
    after: u32,
}

impl Links {
    const UNLINKED: Links = Links {
        before: u32::NONE,
        after: u32::NONE,
    };
}

/// Hash backend iterating in link order.
pub struct LinkedHashTable<K, V> {
    table: HashTable<K, V, Links>,
    head: u32,
    tail: u32,
    head_append: bool,
    access_mode: OrderAdjustMode,
    replace_mode: OrderAdjustMode,
}

impl<K, V> LinkedHashTable<K, V> {
    /// Links new entries at the head.
    #[inline]
    pub fn head_append(&self) -> bool {
        self.head_append
    }

    /// Movement applied by `access`.
    #[inline]
    pub fn access_mode(&self) -> OrderAdjustMode {
        self.access_mode
    }

    /// Movement applied on replacement.
    #[inline]
    pub fn replace_mode(&self) -> OrderAdjustMode {
        self.replace_mode
    }

    #[inline]
    fn links(&self, id: u32) -> Links {
        self.table.node(id).extra
    }

    fn unlink(&mut self, id: u32) {
        let Links { before, after } = self.links(id);
        if before.is_some() {
            self.table.node_mut(before).extra.after = after;
        } else {
            self.head = after;
        }
        if after.is_some() {
            self.table.node_mut(after).extra.before = before;
        } else {
            self.tail = before;
        }
    }

    fn link_between(&mut self, id: u32, before: u32, after: u32) {
        self.table.node_mut(id).extra = Links { before, after };
        if before.is_some() {
            self.table.node_mut(before).extra.after = id;
        } else {
            self.head = id;
        }
        if after.is_some() {
            self.table.node_mut(after).extra.before = id;
        } else {
            self.tail = id;
        }
    }

    fn move_to_head(&mut self, id: u32) {
        if self.head == id {
            return;
        }
        self.unlink(id);
        self.link_between(id, u32::NONE, self.head);
    }

    fn move_to_tail(&mut self, id: u32) {
        if self.tail == id {
            return;
        }
        self.unlink(id);
        self.link_between(id, self.tail, u32::NONE);
    }

    fn move_to_prev(&mut self, id: u32) {
        let target = self.links(id).before;
        if target.is_none() {
            return;
        }
        self.unlink(id);
        let before = self.links(target).before;
        self.link_between(id, before, target);
    }

    fn move_to_next(&mut self, id: u32) {
        let target = self.links(id).after;
        if target.is_none() {
            return;
        }
        self.unlink(id);
        let after = self.links(target).after;
        self.link_between(id, target, after);
    }

    fn move_before(&mut self, id: u32, target: u32) {
        if id == target {
            return;
        }
        self.unlink(id);
        let before = self.links(target).before;
        self.link_between(id, before, target);
    }

    fn adjust(&mut self, id: u32, mode: OrderAdjustMode) {
        match mode {
            OrderAdjustMode::None => {}
            OrderAdjustMode::Head => self.move_to_head(id),
            OrderAdjustMode::Tail => self.move_to_tail(id),
            OrderAdjustMode::Prev => self.move_to_prev(id),
            OrderAdjustMode::Next => self.move_to_next(id),
        }
    }
}

impl<K, V> EntryBackend<K, V> for LinkedHashTable<K, V> {
    type KeyComparator = EqualityComparator<K>;
    type Config = LinkedHashConfig;

    fn create(comparator: EqualityComparator<K>, config: &LinkedHashConfig) -> Result<Self> {
        Ok(Self {
            table: HashTable::with_config(comparator, &config.hash)?,
            head: u32::NONE,
            tail: u32::NONE,
            head_append: config.head_append,
            access_mode: config.access_mode,
            replace_mode: config.replace_mode,
        })
    }

    fn config(&self) -> LinkedHashConfig {
        LinkedHashConfig {
            hash: self.table.hash_config(),
            head_append: self.head_append,
            access_mode: self.access_mode,
            replace_mode: self.replace_mode,
        }
    }

    fn key_comparator(&self) -> &EqualityComparator<K> {
        self.table.comparator()
    }

    fn inserts_at_head(&self) -> bool {
        self.head_append
    }

    fn unified_key_comparator(&self) -> UnifiedComparator<K> {
        UnifiedComparator::Equality(self.table.comparator().clone())
    }

    #[inline]
    fn key_equals(&self, a: &K, b: &K) -> bool {
        self.table.comparator().equals(a, b)
    }

    #[inline]
    fn len(&self) -> usize {
        self.table.node_count()
    }

    #[inline]
    fn find(&self, key: &K) -> Option<EntryId> {
        self.table.find_node(key).map(EntryId)
    }

    #[inline]
    fn contains_id(&self, id: EntryId) -> bool {
        self.table.contains(id.0)
    }

    #[inline]
    fn key(&self, id: EntryId) -> &K {
        &self.table.node(id.0).key
    }

    #[inline]
    fn value(&self, id: EntryId) -> &V {
        &self.table.node(id.0).value
    }

    #[inline]
    fn value_mut(&mut self, id: EntryId) -> &mut V {
        &mut self.table.node_mut(id.0).value
    }

    fn set_key(&mut self, id: EntryId, key: K) {
        self.table.set_node_key(id.0, key);
    }

    fn insert(&mut self, key: K, value: V) -> EntryId {
        let id = self.table.insert_node(key, value, Links::UNLINKED);
        if self.head_append {
            self.link_between(id, u32::NONE, self.head);
        } else {
            self.link_between(id, self.tail, u32::NONE);
        }
        EntryId(id)
    }

    fn remove(&mut self, id: EntryId) -> (K, V) {
        self.unlink(id.0);
        let node = self.table.remove_node(id.0);
        (node.key, node.value)
    }

    fn clear(&mut self) {
        self.table.clear_nodes();
        self.head = u32::NONE;
        self.tail = u32::NONE;
    }

    #[inline]
    fn first(&self) -> Option<EntryId> {
        self.head.to_option().map(EntryId)
    }

    #[inline]
    fn last(&self) -> Option<EntryId> {
        self.tail.to_option().map(EntryId)
    }

    #[inline]
    fn next(&self, id: EntryId) -> Option<EntryId> {
        self.links(id.0).after.to_option().map(EntryId)
    }

    #[inline]
    fn prev(&self, id: EntryId) -> Option<EntryId> {
        self.links(id.0).before.to_option().map(EntryId)
    }

    fn compact(&mut self) {
        self.table.scale(false);
    }

    fn access_moves(&self, id: EntryId) -> bool {
        match self.access_mode {
            OrderAdjustMode::None => false,
            OrderAdjustMode::Head | OrderAdjustMode::Prev => self.head != id.0,
            OrderAdjustMode::Tail | OrderAdjustMode::Next => self.tail != id.0,
        }
    }

    fn on_accessed(&mut self, id: EntryId) {
        self.adjust(id.0, self.access_mode);
    }

    fn on_replaced(&mut self, id: EntryId) {
        self.adjust(id.0, self.replace_mode);
    }

    fn successor_key(&self, id: EntryId) -> Option<K>
    where
        K: Clone,
    {
        let after = self.links(id.0).after;
        after.to_option().map(|a| self.table.node(a).key.clone())
    }

    fn on_resumed(&mut self, id: EntryId, after: Option<&K>) {
        match after.and_then(|key| self.table.find_node(key)) {
            Some(target) => self.move_before(id.0, target),
            None if after.is_none() => self.move_to_tail(id.0),
            None => trace!("resume anchor no longer present"),
        }
    }

    fn is_read_write_lock_supported(&self) -> bool {
        self.access_mode == OrderAdjustMode::None
    }
}

impl<K, V> EntriesBuilder<K, V, LinkedHashTable<K, V>> {
    /// Initial bucket count, rounded up to a power of two.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.hash.initial_capacity = capacity;
        self
    }

    /// Load factor in `(0, 1]`, or `None` for a fixed bucket array.
    pub fn load_factor(mut self, load_factor: Option<f32>) -> Self {
        self.config.hash.load_factor = load_factor;
        self
    }

    /// Links new entries at the head instead of the tail.
    pub fn head_append(mut self, head_append: bool) -> Self {
        self.config.head_append = head_append;
        self
    }

    /// Movement applied by `access`.
    pub fn access_mode(mut self, mode: OrderAdjustMode) -> Self {
        self.config.access_mode = mode;
        self
    }

    /// Movement applied when a put replaces a value.
    pub fn replace_mode(mut self, mode: OrderAdjustMode) -> Self {
        self.config.replace_mode = mode;
        self
    }
}

impl<K, V> LinkedHashEntries<K, V> {
    /// Links new entries at the head.
    #[inline]
    pub fn head_append(&self) -> bool {
        self.backend.head_append()
    }

    /// Movement applied by `access`.
    #[inline]
    pub fn access_mode(&self) -> OrderAdjustMode {
        self.backend.access_mode()
    }

    /// Movement applied on replacement.
    #[inline]
    pub fn replace_mode(&self) -> OrderAdjustMode {
        self.backend.replace_mode()
    }

    /// A view iterating from tail to head.
    pub fn descending(&mut self) -> DescendingEntries<'_, K, V> {
        DescendingEntries { entries: self }
    }
}

/// Reversed view of a [`LinkedHashEntries`] container.
///
/// Entries are still linked where the container links them; the view only
/// reverses which end counts as the head, so its `head_append` and modes
/// report the mirrored settings.
pub struct DescendingEntries<'a, K, V> {
    entries: &'a mut LinkedHashEntries<K, V>,
}

impl<'a, K, V> DescendingEntries<'a, K, V> {
    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether new entries appear at this view's head.
    #[inline]
    pub fn head_append(&self) -> bool {
        !self.entries.head_append()
    }

    /// Access movement in this view's direction.
    #[inline]
    pub fn access_mode(&self) -> OrderAdjustMode {
        self.entries.access_mode().descending()
    }

    /// Replace movement in this view's direction.
    #[inline]
    pub fn replace_mode(&self) -> OrderAdjustMode {
        self.entries.replace_mode().descending()
    }

    /// Value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// First entry of the view (the container's last).
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entries.last()
    }

    /// Last entry of the view (the container's first).
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entries.first()
    }

    /// Iterates from the container's tail to its head.
    pub fn iter(&self) -> core::iter::Rev<super::Iter<'_, K, V, LinkedHashTable<K, V>>> {
        self.entries.iter().rev()
    }

    /// The ascending container again.
    pub fn descending(self) -> &'a mut LinkedHashEntries<K, V> {
        self.entries
    }
}

impl<K: Clone, V: Clone> DescendingEntries<'_, K, V> {
    /// See [`Entries::put`](super::Entries::put).
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.entries.put(key, value)
    }

    /// See [`Entries::put_with`](super::Entries::put_with).
    pub fn put_with<H>(&mut self, key: K, value: V, handler: &mut H) -> Result<Option<V>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.put_with(key, value, handler)
    }

    /// See [`Entries::access`](super::Entries::access).
    pub fn access(&mut self, key: &K) -> Result<Option<&V>> {
        self.entries.access(key)
    }

    /// See [`Entries::remove_by_key`](super::Entries::remove_by_key).
    pub fn remove_by_key(&mut self, key: &K) -> Result<Option<(K, V)>> {
        self.entries.remove_by_key(key)
    }

    /// Removes this view's first entry (the container's last).
    pub fn poll_first(&mut self) -> Result<Option<(K, V)>> {
        self.entries.poll_last()
    }

    /// [`poll_first`](Self::poll_first) observed by `handler`.
    pub fn poll_first_with<H>(&mut self, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.poll_last_with(handler)
    }

    /// Removes this view's last entry (the container's first).
    pub fn poll_last(&mut self) -> Result<Option<(K, V)>> {
        self.entries.poll_first()
    }

    /// [`poll_last`](Self::poll_last) observed by `handler`.
    pub fn poll_last_with<H>(&mut self, handler: &mut H) -> Result<Option<(K, V)>>
    where
        H: EntriesHandler<K, V> + ?Sized,
    {
        self.entries.poll_first_with(handler)
    }
}
