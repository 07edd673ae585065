//! Size-augmented red-black tree.
//!
//! Every node stores the size of its subtree, which gives `O(log n)` rank
//! queries and range counts for [`SubTree`](super::SubTree) views.
//!
//! Deleting a node with two children moves its in-order successor *node*
//! into the vacated position (links, color and size), never the successor's
//! key/value. An [`EntryId`] therefore names the same key/value for its whole
//! lifetime.

use core::cmp::Ordering;

use tracing::debug;

use super::EntryBackend;
use crate::{Comparator, EntryId, Index, NodeStorage, Result, UnifiedComparator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

struct TreeNode<K, V> {
    key: K,
    value: V,
    parent: u32,
    left: u32,
    right: u32,
    color: Color,
    size: u32,
}

/// Ordered backend.
pub struct RedBlackTree<K, V> {
    nodes: NodeStorage<TreeNode<K, V>>,
    root: u32,
    comparator: Comparator<K>,
}

/// Level at which nodes are colored red by [`RedBlackTree::build_from_sorted`]
/// so that every path has the same black height.
fn compute_red_level(size: usize) -> usize {
    let mut level = 0;
    let mut m = size as i64 - 1;
    while m >= 0 {
        level += 1;
        m = m / 2 - 1;
    }
    level
}

impl<K, V> RedBlackTree<K, V> {
    /// Creates an empty tree.
    pub fn new(comparator: Comparator<K>) -> Self {
        Self {
            nodes: NodeStorage::new(),
            root: u32::NONE,
            comparator,
        }
    }

    /// The key order.
    #[inline]
    pub fn comparator(&self) -> &Comparator<K> {
        &self.comparator
    }

    // =========================================================================
    // Node accessors
    // =========================================================================

    #[inline]
    fn parent(&self, n: u32) -> u32 {
        if n.is_none() { u32::NONE } else { self.nodes[n].parent }
    }

    #[inline]
    fn left(&self, n: u32) -> u32 {
        if n.is_none() { u32::NONE } else { self.nodes[n].left }
    }

    #[inline]
    fn right(&self, n: u32) -> u32 {
        if n.is_none() { u32::NONE } else { self.nodes[n].right }
    }

    #[inline]
    fn is_red(&self, n: u32) -> bool {
        n.is_some() && self.nodes[n].color == Color::Red
    }

    #[inline]
    fn set_color(&mut self, n: u32, color: Color) {
        if n.is_some() {
            self.nodes[n].color = color;
        }
    }

    #[inline]
    fn size_of(&self, n: u32) -> u32 {
        if n.is_none() { 0 } else { self.nodes[n].size }
    }

    #[inline]
    fn update_size(&mut self, n: u32) {
        let size = 1 + self.size_of(self.nodes[n].left) + self.size_of(self.nodes[n].right);
        self.nodes[n].size = size;
    }

    fn minimum(&self, mut n: u32) -> u32 {
        while self.nodes[n].left.is_some() {
            n = self.nodes[n].left;
        }
        n
    }

    fn maximum(&self, mut n: u32) -> u32 {
        while self.nodes[n].right.is_some() {
            n = self.nodes[n].right;
        }
        n
    }

    fn successor(&self, n: u32) -> u32 {
        if self.nodes[n].right.is_some() {
            return self.minimum(self.nodes[n].right);
        }
        let mut child = n;
        let mut p = self.nodes[n].parent;
        while p.is_some() && self.nodes[p].right == child {
            child = p;
            p = self.nodes[p].parent;
        }
        p
    }

    fn predecessor(&self, n: u32) -> u32 {
        if self.nodes[n].left.is_some() {
            return self.maximum(self.nodes[n].left);
        }
        let mut child = n;
        let mut p = self.nodes[n].parent;
        while p.is_some() && self.nodes[p].left == child {
            child = p;
            p = self.nodes[p].parent;
        }
        p
    }

    // =========================================================================
    // Rotations
    // =========================================================================

    fn rotate_left(&mut self, x: u32) {
        let y = self.nodes[x].right;
        let y_left = self.nodes[y].left;
        self.nodes[x].right = y_left;
        if y_left.is_some() {
            self.nodes[y_left].parent = x;
        }
        let xp = self.nodes[x].parent;
        self.nodes[y].parent = xp;
        if xp.is_none() {
            self.root = y;
        } else if self.nodes[xp].left == x {
            self.nodes[xp].left = y;
        } else {
            self.nodes[xp].right = y;
        }
        self.nodes[y].left = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.update_size(x);
    }

    fn rotate_right(&mut self, x: u32) {
        let y = self.nodes[x].left;
        let y_right = self.nodes[y].right;
        self.nodes[x].left = y_right;
        if y_right.is_some() {
            self.nodes[y_right].parent = x;
        }
        let xp = self.nodes[x].parent;
        self.nodes[y].parent = xp;
        if xp.is_none() {
            self.root = y;
        } else if self.nodes[xp].right == x {
            self.nodes[xp].right = y;
        } else {
            self.nodes[xp].left = y;
        }
        self.nodes[y].right = x;
        self.nodes[x].parent = y;
        self.nodes[y].size = self.nodes[x].size;
        self.update_size(x);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub(crate) fn find_node(&self, key: &K) -> u32 {
        let mut n = self.root;
        while n.is_some() {
            match self.comparator.compare(key, &self.nodes[n].key) {
                Ordering::Less => n = self.nodes[n].left,
                Ordering::Greater => n = self.nodes[n].right,
                Ordering::Equal => return n,
            }
        }
        u32::NONE
    }

    /// Smallest entry `>= key` (`> key` when not inclusive).
    pub fn ceiling(&self, key: &K, inclusive: bool) -> Option<EntryId> {
        let mut n = self.root;
        let mut best = u32::NONE;
        while n.is_some() {
            let ord = self.comparator.compare(key, &self.nodes[n].key);
            if ord == Ordering::Less || (inclusive && ord == Ordering::Equal) {
                best = n;
                if ord == Ordering::Equal {
                    break;
                }
                n = self.nodes[n].left;
            } else {
                n = self.nodes[n].right;
            }
        }
        best.to_option().map(EntryId)
    }

    /// Largest entry `<= key` (`< key` when not inclusive).
    pub fn floor(&self, key: &K, inclusive: bool) -> Option<EntryId> {
        let mut n = self.root;
        let mut best = u32::NONE;
        while n.is_some() {
            let ord = self.comparator.compare(key, &self.nodes[n].key);
            if ord == Ordering::Greater || (inclusive && ord == Ordering::Equal) {
                best = n;
                if ord == Ordering::Equal {
                    break;
                }
                n = self.nodes[n].right;
            } else {
                n = self.nodes[n].left;
            }
        }
        best.to_option().map(EntryId)
    }

    /// Number of entries before `id` in key order.
    pub fn rank(&self, id: EntryId) -> usize {
        let mut n = id.0;
        let mut rank = self.size_of(self.nodes[n].left) as usize;
        while self.nodes[n].parent.is_some() {
            let p = self.nodes[n].parent;
            if self.nodes[p].right == n {
                rank += self.size_of(self.nodes[p].left) as usize + 1;
            }
            n = p;
        }
        rank
    }

    /// Entry at position `rank` in key order.
    pub fn select(&self, mut rank: usize) -> Option<EntryId> {
        let mut n = self.root;
        while n.is_some() {
            let left = self.size_of(self.nodes[n].left) as usize;
            match rank.cmp(&left) {
                Ordering::Less => n = self.nodes[n].left,
                Ordering::Equal => return Some(EntryId(n)),
                Ordering::Greater => {
                    rank -= left + 1;
                    n = self.nodes[n].right;
                }
            }
        }
        None
    }

    /// Number of entries `< key` (`<= key` when inclusive).
    pub fn count_below(&self, key: &K, inclusive: bool) -> usize {
        let mut n = self.root;
        let mut count = 0usize;
        while n.is_some() {
            let ord = self.comparator.compare(key, &self.nodes[n].key);
            if ord == Ordering::Greater || (inclusive && ord == Ordering::Equal) {
                count += self.size_of(self.nodes[n].left) as usize + 1;
                n = self.nodes[n].right;
            } else {
                n = self.nodes[n].left;
            }
        }
        count
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts a key that is known to be absent.
    fn insert_node(&mut self, key: K, value: V) -> u32 {
        let mut parent = u32::NONE;
        let mut n = self.root;
        let mut go_left = false;
        while n.is_some() {
            parent = n;
            go_left = self.comparator.compare(&key, &self.nodes[n].key) == Ordering::Less;
            n = if go_left { self.nodes[n].left } else { self.nodes[n].right };
        }
        let id = self.nodes.insert(TreeNode {
            key,
            value,
            parent,
            left: u32::NONE,
            right: u32::NONE,
            color: Color::Red,
            size: 1,
        });
        if parent.is_none() {
            self.root = id;
        } else {
            if go_left {
                self.nodes[parent].left = id;
            } else {
                self.nodes[parent].right = id;
            }
            let mut p = parent;
            while p.is_some() {
                self.nodes[p].size += 1;
                p = self.nodes[p].parent;
            }
        }
        self.fix_after_insertion(id);
        id
    }

    fn fix_after_insertion(&mut self, mut x: u32) {
        while x != self.root && self.is_red(self.parent(x)) {
            let p = self.parent(x);
            let g = self.parent(p);
            if p == self.left(g) {
                let uncle = self.right(g);
                if self.is_red(uncle) {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    x = g;
                } else {
                    if x == self.right(p) {
                        x = p;
                        self.rotate_left(x);
                    }
                    let p = self.parent(x);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.left(g);
                if self.is_red(uncle) {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    x = g;
                } else {
                    if x == self.left(p) {
                        x = p;
                        self.rotate_right(x);
                    }
                    let p = self.parent(x);
                    let g = self.parent(p);
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_left(g);
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Replaces the subtree rooted at `u` with the one rooted at `v`.
    fn transplant(&mut self, u: u32, v: u32) {
        let up = self.nodes[u].parent;
        if up.is_none() {
            self.root = v;
        } else if self.nodes[up].left == u {
            self.nodes[up].left = v;
        } else {
            self.nodes[up].right = v;
        }
        if v.is_some() {
            self.nodes[v].parent = up;
        }
    }

    fn remove_node(&mut self, z: u32) -> (K, V) {
        let z_left = self.nodes[z].left;
        let z_right = self.nodes[z].right;
        let x;
        let x_parent;
        let removed_color;
        if z_left.is_none() {
            removed_color = self.nodes[z].color;
            x = z_right;
            x_parent = self.nodes[z].parent;
            self.transplant(z, z_right);
        } else if z_right.is_none() {
            removed_color = self.nodes[z].color;
            x = z_left;
            x_parent = self.nodes[z].parent;
            self.transplant(z, z_left);
        } else {
            // The successor node takes over z's position and color.
            let y = self.minimum(z_right);
            removed_color = self.nodes[y].color;
            x = self.nodes[y].right;
            if self.nodes[y].parent == z {
                x_parent = y;
            } else {
                x_parent = self.nodes[y].parent;
                self.transplant(y, x);
                self.nodes[y].right = z_right;
                self.nodes[z_right].parent = y;
            }
            self.transplant(z, y);
            self.nodes[y].left = z_left;
            self.nodes[z_left].parent = y;
            self.nodes[y].color = self.nodes[z].color;
        }
        let mut p = x_parent;
        while p.is_some() {
            self.update_size(p);
            p = self.nodes[p].parent;
        }
        if removed_color == Color::Black {
            self.fix_after_deletion(x, x_parent);
        }
        let node = self.nodes.take(z);
        (node.key, node.value)
    }

    fn fix_after_deletion(&mut self, mut x: u32, mut parent: u32) {
        while x != self.root && !self.is_red(x) {
            if x == self.left(parent) {
                let mut w = self.right(parent);
                if self.is_red(w) {
                    self.set_color(w, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    w = self.right(parent);
                }
                if !self.is_red(self.left(w)) && !self.is_red(self.right(w)) {
                    self.set_color(w, Color::Red);
                    x = parent;
                    parent = self.parent(x);
                } else {
                    if !self.is_red(self.right(w)) {
                        let wl = self.left(w);
                        self.set_color(wl, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.right(parent);
                    }
                    let pc = self.nodes[parent].color;
                    self.set_color(w, pc);
                    self.set_color(parent, Color::Black);
                    let wr = self.right(w);
                    self.set_color(wr, Color::Black);
                    self.rotate_left(parent);
                    x = self.root;
                    parent = u32::NONE;
                }
            } else {
                let mut w = self.left(parent);
                if self.is_red(w) {
                    self.set_color(w, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    w = self.left(parent);
                }
                if !self.is_red(self.right(w)) && !self.is_red(self.left(w)) {
                    self.set_color(w, Color::Red);
                    x = parent;
                    parent = self.parent(x);
                } else {
                    if !self.is_red(self.left(w)) {
                        let wr = self.right(w);
                        self.set_color(wr, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(parent);
                    }
                    let pc = self.nodes[parent].color;
                    self.set_color(w, pc);
                    self.set_color(parent, Color::Black);
                    let wl = self.left(w);
                    self.set_color(wl, Color::Black);
                    self.rotate_right(parent);
                    x = self.root;
                    parent = u32::NONE;
                }
            }
        }
        self.set_color(x, Color::Black);
    }

    // =========================================================================
    // Bulk construction
    // =========================================================================

    /// Replaces the (empty) tree with a balanced tree built from `sorted`,
    /// which must yield exactly `len` strictly ascending entries.
    ///
    /// Runs in `O(n)`; no rebalancing pass is needed because the nodes on the
    /// deepest incomplete level are colored red.
    pub(crate) fn build_from_sorted<I>(&mut self, len: usize, sorted: &mut I)
    where
        I: Iterator<Item = (K, V)>,
    {
        debug_assert!(self.nodes.is_empty());
        if len == 0 {
            return;
        }
        debug!(len, "building tree from sorted input");
        let red_level = compute_red_level(len);
        self.root = self.build(0, 0, len - 1, red_level, sorted);
        if self.root.is_some() {
            self.nodes[self.root].parent = u32::NONE;
        }
    }

    fn build<I>(&mut self, level: usize, lo: usize, hi: usize, red_level: usize, it: &mut I) -> u32
    where
        I: Iterator<Item = (K, V)>,
    {
        let mid = (lo + hi) / 2;
        let left = if lo < mid {
            self.build(level + 1, lo, mid - 1, red_level, it)
        } else {
            u32::NONE
        };
        let Some((key, value)) = it.next() else {
            return left;
        };
        let node = self.nodes.insert(TreeNode {
            key,
            value,
            parent: u32::NONE,
            left,
            right: u32::NONE,
            color: if level == red_level { Color::Red } else { Color::Black },
            size: 1,
        });
        if left.is_some() {
            self.nodes[left].parent = node;
        }
        if mid < hi {
            let right = self.build(level + 1, mid + 1, hi, red_level, it);
            self.nodes[node].right = right;
            if right.is_some() {
                self.nodes[right].parent = node;
            }
        }
        self.update_size(node);
        node
    }

    /// Verifies the red-black and size invariants, returning the black
    /// height. Linear time; meant for tests and debugging.
    pub fn check_invariants(&self) -> core::result::Result<usize, String> {
        if self.is_red(self.root) {
            return Err("root is red".into());
        }
        if self.root.is_some() && self.nodes[self.root].parent.is_some() {
            return Err("root has a parent".into());
        }
        let (black_height, size) = self.check_node(self.root)?;
        if size != self.nodes.len() {
            return Err(format!("reachable {size} != stored {}", self.nodes.len()));
        }
        Ok(black_height)
    }

    fn check_node(&self, n: u32) -> core::result::Result<(usize, usize), String> {
        if n.is_none() {
            return Ok((1, 0));
        }
        let node = &self.nodes[n];
        for child in [node.left, node.right] {
            if child.is_some() && self.nodes[child].parent != n {
                return Err(format!("node {n} has a child with a stale parent link"));
            }
        }
        if node.color == Color::Red && (self.is_red(node.left) || self.is_red(node.right)) {
            return Err(format!("red node {n} has a red child"));
        }
        if node.left.is_some()
            && self.comparator.compare(&self.nodes[node.left].key, &node.key) != Ordering::Less
        {
            return Err(format!("left child of {n} is out of order"));
        }
        if node.right.is_some()
            && self.comparator.compare(&self.nodes[node.right].key, &node.key) != Ordering::Greater
        {
            return Err(format!("right child of {n} is out of order"));
        }
        let (lh, ls) = self.check_node(node.left)?;
        let (rh, rs) = self.check_node(node.right)?;
        if lh != rh {
            return Err(format!("black height differs under {n}: {lh} vs {rh}"));
        }
        if node.size as usize != 1 + ls + rs {
            return Err(format!("size of {n} is {} but subtree holds {}", node.size, 1 + ls + rs));
        }
        let own = if node.color == Color::Black { 1 } else { 0 };
        Ok((lh + own, 1 + ls + rs))
    }
}

impl<K, V> EntryBackend<K, V> for RedBlackTree<K, V> {
    type KeyComparator = Comparator<K>;
    type Config = ();

    fn create(comparator: Comparator<K>, _: &()) -> Result<Self> {
        Ok(Self::new(comparator))
    }

    fn config(&self) {}

    fn key_comparator(&self) -> &Comparator<K> {
        &self.comparator
    }

    fn unified_key_comparator(&self) -> UnifiedComparator<K> {
        UnifiedComparator::Ordering(self.comparator.clone())
    }

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn find(&self, key: &K) -> Option<EntryId> {
        self.find_node(key).to_option().map(EntryId)
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
        debug_assert!(self.comparator.equals(&self.nodes[id.0].key, &key));
        self.nodes[id.0].key = key;
    }

    fn insert(&mut self, key: K, value: V) -> EntryId {
        EntryId(self.insert_node(key, value))
    }

    fn remove(&mut self, id: EntryId) -> (K, V) {
        self.remove_node(id.0)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = u32::NONE;
    }

    fn first(&self) -> Option<EntryId> {
        if self.root.is_none() {
            return None;
        }
        Some(EntryId(self.minimum(self.root)))
    }

    fn last(&self) -> Option<EntryId> {
        if self.root.is_none() {
            return None;
        }
        Some(EntryId(self.maximum(self.root)))
    }

    fn next(&self, id: EntryId) -> Option<EntryId> {
        self.successor(id.0).to_option().map(EntryId)
    }

    fn prev(&self, id: EntryId) -> Option<EntryId> {
        self.predecessor(id.0).to_option().map(EntryId)
    }

    #[inline]
    fn key_equals(&self, a: &K, b: &K) -> bool {
        self.comparator.equals(a, b)
    }

    fn load_sorted(&mut self, items: Vec<(K, V)>) -> core::result::Result<(), Vec<(K, V)>> {
        let ascending = items
            .windows(2)
            .all(|w| self.comparator.compare(&w[0].0, &w[1].0) == Ordering::Less);
        if !self.nodes.is_empty() || !ascending {
            return Err(items);
        }
        let len = items.len();
        self.build_from_sorted(len, &mut items.into_iter());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn tree() -> RedBlackTree<i32, i32> {
        RedBlackTree::new(Comparator::natural())
    }

    fn keys(t: &RedBlackTree<i32, i32>) -> Vec<i32> {
        let mut out = Vec::new();
        let mut cur = t.first();
        while let Some(id) = cur {
            out.push(*t.key(id));
            cur = t.next(id);
        }
        out
    }

    #[test]
    fn inserts_iterate_in_order() {
        let mut t = tree();
        for k in [5, 3, 8, 1, 4] {
            t.insert(k, k * 10);
        }
        assert_eq!(keys(&t), [1, 3, 4, 5, 8]);
        assert_eq!(EntryBackend::len(&t), 5);
        t.check_invariants().unwrap();
    }

    #[test]
    fn red_level() {
        assert_eq!(compute_red_level(1), 1);
        assert_eq!(compute_red_level(2), 1);
        assert_eq!(compute_red_level(3), 2);
        assert_eq!(compute_red_level(7), 3);
        assert_eq!(compute_red_level(8), 3);
    }

    #[test]
    fn build_from_sorted_is_balanced() {
        for len in 0..70 {
            let mut t = tree();
            let mut it = (0..len).map(|k| (k, k));
            t.build_from_sorted(len as usize, &mut it);
            assert_eq!(EntryBackend::len(&t), len as usize);
            t.check_invariants().unwrap_or_else(|e| panic!("len {len}: {e}"));
            assert_eq!(keys(&t), (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn random_insert_remove_keeps_invariants() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut t = tree();
        let mut ks: Vec<i32> = (0..500).collect();
        ks.shuffle(&mut rng);
        for &k in &ks {
            t.insert(k, -k);
        }
        t.check_invariants().unwrap();
        ks.shuffle(&mut rng);
        for (i, &k) in ks.iter().enumerate() {
            let id = EntryBackend::find(&t, &k).unwrap();
            assert_eq!(t.remove(id), (k, -k));
            if i % 25 == 0 {
                t.check_invariants().unwrap();
            }
        }
        assert!(t.first().is_none());
    }

    #[test]
    fn deletion_never_moves_payloads() {
        let mut t = tree();
        let ids: Vec<(i32, EntryId)> = (0..64).map(|k| (k, t.insert(k, k))).collect();
        // Removing inner nodes with two children.
        for k in [31, 15, 47, 7] {
            let id = EntryBackend::find(&t, &k).unwrap();
            t.remove(id);
        }
        for (k, id) in ids {
            if [31, 15, 47, 7].contains(&k) {
                continue;
            }
            assert_eq!(*t.key(id), k);
            assert_eq!(*t.value(id), k);
        }
        t.check_invariants().unwrap();
    }

    #[test]
    fn navigation() {
        let mut t = tree();
        for k in [10, 20, 30, 40] {
            t.insert(k, k);
        }
        let key = |id: Option<EntryId>| id.map(|id| *t.key(id));
        assert_eq!(key(t.ceiling(&20, true)), Some(20));
        assert_eq!(key(t.ceiling(&20, false)), Some(30));
        assert_eq!(key(t.ceiling(&41, true)), None);
        assert_eq!(key(t.floor(&20, true)), Some(20));
        assert_eq!(key(t.floor(&20, false)), Some(10));
        assert_eq!(key(t.floor(&5, true)), None);
        assert_eq!(key(t.floor(&35, false)), Some(30));
    }

    #[test]
    fn rank_select_and_counts() {
        let mut t = tree();
        for k in (0..100).rev() {
            t.insert(k * 2, k);
        }
        for r in 0..100 {
            let id = t.select(r).unwrap();
            assert_eq!(*t.key(id), r as i32 * 2);
            assert_eq!(t.rank(id), r);
        }
        assert!(t.select(100).is_none());
        assert_eq!(t.count_below(&10, false), 5);
        assert_eq!(t.count_below(&10, true), 6);
        assert_eq!(t.count_below(&11, true), 6);
        assert_eq!(t.count_below(&-1, true), 0);
    }

    #[test]
    fn prev_walks_backwards() {
        let mut t = tree();
        for k in [3, 1, 2] {
            t.insert(k, k);
        }
        let mut out = Vec::new();
        let mut cur = t.last();
        while let Some(id) = cur {
            out.push(*t.key(id));
            cur = t.prev(id);
        }
        assert_eq!(out, [3, 2, 1]);
    }
}
