//! Model-based property tests.
//!
//! Each container is driven with random operations next to a std model and
//! compared after every step.

use std::collections::BTreeMap;
use std::ops::Bound;

use nexus_txcollections::{
    ArrayElements, BidiType, BoxError, ElementBackend, Elements, EntriesHandler, HashEntries, LinkedElements,
    LinkedHashEntries, RedBlackTreeEntries,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum MapOp {
    Put(u8, u8),
    Remove(u8),
    PollFirst,
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (0u8..32, 0u8..16).prop_map(|(k, v)| MapOp::Put(k, v)),
        2 => (0u8..32).prop_map(MapOp::Remove),
        1 => Just(MapOp::PollFirst),
    ]
}

#[derive(Debug, Clone)]
enum ListOp {
    Insert(usize, u8),
    Set(usize, u8),
    RemoveAt(usize),
    Remove(u8),
    Get(usize),
    IndexOf(u8),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        3 => (any::<usize>(), 0u8..8).prop_map(|(i, e)| ListOp::Insert(i, e)),
        2 => (any::<usize>(), 0u8..8).prop_map(|(i, e)| ListOp::Set(i, e)),
        2 => any::<usize>().prop_map(ListOp::RemoveAt),
        1 => (0u8..8).prop_map(ListOp::Remove),
        3 => any::<usize>().prop_map(ListOp::Get),
        2 => (0u8..8).prop_map(ListOp::IndexOf),
    ]
}

/// Applies a bidirectional put to the model: the previous holder of `v`
/// under another key is evicted.
fn model_bidi_put(model: &mut BTreeMap<u8, u8>, k: u8, v: u8) {
    let holder = model.iter().find(|(mk, mv)| **mv == v && **mk != k).map(|(mk, _)| *mk);
    if let Some(holder) = holder {
        model.remove(&holder);
    }
    model.insert(k, v);
}

#[derive(Default)]
struct Transcript(Vec<(bool, String)>);

impl EntriesHandler<u8, u8> for Transcript {
    type Argument = ();

    fn create_adding_argument(&mut self, _: &u8, _: &u8) -> Option<()> {
        Some(())
    }

    fn create_changing_argument(&mut self, _: &u8, _: &u8, _: &u8, _: &u8) -> Option<()> {
        Some(())
    }

    fn create_removing_argument(&mut self, _: &u8, _: &u8) -> Option<()> {
        Some(())
    }

    fn adding(&mut self, k: &u8, v: &u8, _: &mut ()) -> Result<(), BoxError> {
        self.0.push((true, format!("add {k}={v}")));
        Ok(())
    }

    fn added(&mut self, k: &u8, v: &u8, _: Option<&mut ()>) -> Result<(), BoxError> {
        self.0.push((false, format!("add {k}={v}")));
        Ok(())
    }

    fn changing(&mut self, k: &u8, ov: &u8, _: &u8, nv: &u8, _: &mut ()) -> Result<(), BoxError> {
        self.0.push((true, format!("change {k}={ov}->{nv}")));
        Ok(())
    }

    fn changed(&mut self, k: &u8, ov: &u8, _: &u8, nv: &u8, _: Option<&mut ()>) -> Result<(), BoxError> {
        self.0.push((false, format!("change {k}={ov}->{nv}")));
        Ok(())
    }

    fn removing(&mut self, k: &u8, v: &u8, _: &mut ()) -> Result<(), BoxError> {
        self.0.push((true, format!("remove {k}={v}")));
        Ok(())
    }

    fn removed(&mut self, k: &u8, v: &u8, _: Option<&mut ()>) -> Result<(), BoxError> {
        self.0.push((false, format!("remove {k}={v}")));
        Ok(())
    }
}

fn check_list<B: ElementBackend<u8>>(list: &mut Elements<u8, B>, ops: &[ListOp]) -> Result<(), TestCaseError> {
    let mut model: Vec<u8> = Vec::new();
    for op in ops {
        match *op {
            ListOp::Insert(i, e) => {
                let i = i % (model.len() + 1);
                list.insert(i, e).unwrap();
                model.insert(i, e);
            }
            ListOp::Set(i, e) if !model.is_empty() => {
                let i = i % model.len();
                prop_assert_eq!(list.set(i, e).unwrap(), model[i]);
                model[i] = e;
            }
            ListOp::RemoveAt(i) if !model.is_empty() => {
                let i = i % model.len();
                prop_assert_eq!(list.remove_at(i).unwrap(), model.remove(i));
            }
            ListOp::Remove(e) => {
                let removed = list.remove(&e).unwrap();
                let pos = model.iter().position(|m| *m == e);
                prop_assert_eq!(removed, pos.is_some());
                if let Some(pos) = pos {
                    model.remove(pos);
                }
            }
            ListOp::Get(i) => {
                let i = i % (model.len() + 1);
                prop_assert_eq!(list.get(i), model.get(i));
            }
            ListOp::IndexOf(e) => {
                prop_assert_eq!(list.index_of(&e), model.iter().position(|m| *m == e));
                prop_assert_eq!(list.last_index_of(&e), model.iter().rposition(|m| *m == e));
            }
            _ => {}
        }
        prop_assert_eq!(list.len(), model.len());
    }
    prop_assert_eq!(list.iter().copied().collect::<Vec<_>>(), model);
    Ok(())
}

proptest! {
    #[test]
    fn tree_matches_btreemap(ops in prop::collection::vec(map_op(), 0..200)) {
        let mut tree = RedBlackTreeEntries::<u8, u8>::builder().build().unwrap();
        let mut model = BTreeMap::new();
        for op in ops {
            match op {
                MapOp::Put(k, v) => {
                    prop_assert_eq!(tree.put(k, v).unwrap(), model.insert(k, v));
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(tree.remove_by_key(&k).unwrap(), model.remove_entry(&k));
                }
                MapOp::PollFirst => {
                    prop_assert_eq!(tree.poll_first().unwrap(), model.pop_first());
                }
            }
            prop_assert!(tree.backend().check_invariants().is_ok());
        }
        let pairs: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(pairs, expected);
        for (rank, k) in model.keys().enumerate() {
            prop_assert_eq!(tree.rank(k), Some(rank));
            prop_assert_eq!(tree.select(rank).map(|(k, _)| *k), Some(*k));
        }
    }

    #[test]
    fn bidi_entries_keep_values_unique(ops in prop::collection::vec(map_op(), 0..200)) {
        let mut hash = HashEntries::<u8, u8>::builder().bidi(BidiType::AllValues).build().unwrap();
        let mut linked = LinkedHashEntries::<u8, u8>::builder().bidi(BidiType::AllValues).build().unwrap();
        let mut model = BTreeMap::new();
        for op in ops {
            match op {
                MapOp::Put(k, v) => {
                    hash.put(k, v).unwrap();
                    linked.put(k, v).unwrap();
                    model_bidi_put(&mut model, k, v);
                }
                MapOp::Remove(k) => {
                    hash.remove_by_key(&k).unwrap();
                    linked.remove_by_key(&k).unwrap();
                    model.remove(&k);
                }
                MapOp::PollFirst => {
                    if let Some((k, _)) = linked.poll_first().unwrap() {
                        hash.remove_by_key(&k).unwrap();
                        model.remove(&k);
                    }
                }
            }
            prop_assert_eq!(hash.len(), model.len());
            prop_assert_eq!(linked.len(), model.len());
        }
        for (k, v) in &model {
            prop_assert_eq!(hash.get(k), Some(v));
            prop_assert_eq!(hash.get_by_value(v), Some(k));
            prop_assert_eq!(linked.get_by_value(v), Some(k));
        }
    }

    #[test]
    fn pre_callbacks_precede_posts_in_the_same_order(
        puts in prop::collection::vec((0u8..8, 0u8..4), 1..40),
    ) {
        let mut m = HashEntries::<u8, u8>::builder().bidi(BidiType::AllValues).build().unwrap();
        for (k, v) in puts {
            let mut transcript = Transcript::default();
            m.put_with(k, v, &mut transcript).unwrap();
            let split = transcript.0.iter().position(|(pre, _)| !pre).unwrap_or(transcript.0.len());
            let (pre, post) = transcript.0.split_at(split);
            prop_assert!(post.iter().all(|(pre, _)| !pre));
            let pre: Vec<_> = pre.iter().map(|(_, e)| e).collect();
            let post: Vec<_> = post.iter().map(|(_, e)| e).collect();
            prop_assert_eq!(pre, post);
        }
    }

    #[test]
    fn sub_tree_counts_match_range(
        keys in prop::collection::btree_set(0u16..500, 0..120),
        a in 0u16..500,
        b in 0u16..500,
        from_inclusive in any::<bool>(),
        to_inclusive in any::<bool>(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut tree = RedBlackTreeEntries::<u16, ()>::builder().build().unwrap();
        tree.put_all(keys.iter().map(|k| (*k, ()))).unwrap();
        let lower = if from_inclusive { Bound::Included(lo) } else { Bound::Excluded(lo) };
        let upper = if to_inclusive { Bound::Included(hi) } else { Bound::Excluded(hi) };
        // std rejects an empty exclusive range on a single key.
        prop_assume!(lo != hi || (from_inclusive && to_inclusive));
        let expected: Vec<u16> = keys.range((lower, upper)).copied().collect();

        let mut view = tree.sub_map(lo, from_inclusive, hi, to_inclusive).unwrap();
        prop_assert_eq!(view.len(), expected.len());
        prop_assert_eq!(view.keys().copied().collect::<Vec<_>>(), expected.clone());
        let desc = view.descending();
        let mut reversed = expected;
        reversed.reverse();
        prop_assert_eq!(desc.keys().copied().collect::<Vec<_>>(), reversed);
    }

    #[test]
    fn array_follows_vec(ops in prop::collection::vec(list_op(), 0..150)) {
        let mut list = ArrayElements::<u8>::builder()
            .initial_capacity(2)
            .collapse_factor(0.5)
            .build()
            .unwrap();
        check_list(&mut list, &ops)?;
    }

    #[test]
    fn linked_list_follows_vec(ops in prop::collection::vec(list_op(), 0..150)) {
        let mut list = LinkedElements::<u8>::builder().build().unwrap();
        check_list(&mut list, &ops)?;
    }

    #[test]
    fn containers_round_trip(pairs in prop::collection::vec((any::<u16>(), any::<u16>()), 0..80)) {
        let mut tree = RedBlackTreeEntries::<u16, u16>::builder().build().unwrap();
        let mut linked = LinkedHashEntries::<u16, u16>::builder().build().unwrap();
        let mut hash = HashEntries::<u16, u16>::builder().build().unwrap();
        for (k, v) in &pairs {
            tree.put(*k, *v).unwrap();
            linked.put(*k, *v).unwrap();
            hash.put(*k, *v).unwrap();
        }

        let back: RedBlackTreeEntries<u16, u16> =
            serde_json::from_str(&serde_json::to_string(&tree).unwrap()).unwrap();
        prop_assert_eq!(back.iter().collect::<Vec<_>>(), tree.iter().collect::<Vec<_>>());
        prop_assert!(back.backend().check_invariants().is_ok());

        let back: LinkedHashEntries<u16, u16> =
            serde_json::from_str(&serde_json::to_string(&linked).unwrap()).unwrap();
        prop_assert_eq!(back.iter().collect::<Vec<_>>(), linked.iter().collect::<Vec<_>>());

        let back: HashEntries<u16, u16> =
            serde_json::from_str(&serde_json::to_string(&hash).unwrap()).unwrap();
        let mut restored: Vec<_> = back.iter().map(|(k, v)| (*k, *v)).collect();
        let mut original: Vec<_> = hash.iter().map(|(k, v)| (*k, *v)).collect();
        restored.sort_unstable();
        original.sort_unstable();
        prop_assert_eq!(restored, original);

        let elements: Vec<u16> = pairs.iter().map(|(k, _)| *k).collect();
        let mut array = ArrayElements::<u16>::builder().build().unwrap();
        array.add_all(elements.clone()).unwrap();
        let back: LinkedElements<u16> = serde_json::from_str(&serde_json::to_string(&array).unwrap()).unwrap();
        prop_assert_eq!(back.iter().copied().collect::<Vec<_>>(), elements);
    }
}

#[test_log::test]
fn unique_elements_never_repeat() {
    let mut list = LinkedElements::<u8>::builder().bidi(BidiType::AllValues).build().unwrap();
    for (i, e) in [3u8, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5].into_iter().enumerate() {
        let at = i % (list.len() + 1);
        list.insert(at, e).unwrap();
        let mut seen: Vec<u8> = list.iter().copied().collect();
        let len = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), len);
        assert!(list.contains(&e));
    }
    assert_eq!(list.len(), 7);
}
