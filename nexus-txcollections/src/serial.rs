//! Linear persisted form for every container.
//!
//! Containers serialize as a sequence in iteration order: `(key, value)`
//! pairs for [`Entries`], bare elements for [`Elements`]. Comparators,
//! validators and backend settings are runtime objects and are not part of
//! the data, so deserialization goes through a builder used as a
//! [`DeserializeSeed`]:
//!
//! ```
//! use serde::de::DeserializeSeed;
//! use nexus_txcollections::{BidiType, RedBlackTreeEntries};
//!
//! let mut tree = RedBlackTreeEntries::<u32, String>::builder().build().unwrap();
//! tree.put(2, "b".into()).unwrap();
//! tree.put(1, "a".into()).unwrap();
//! let json = serde_json::to_string(&tree).unwrap();
//! assert_eq!(json, r#"[[1,"a"],[2,"b"]]"#);
//!
//! let seed = RedBlackTreeEntries::<u32, String>::builder().bidi(BidiType::AllValues);
//! let restored = seed.deserialize(&mut serde_json::Deserializer::from_str(&json)).unwrap();
//! assert_eq!(restored.get_by_value(&"b".to_string()), Some(&2));
//! ```
//!
//! A tree rebuilt from ascending input takes the linear sorted build; any
//! other input is replayed through a bulk put. Containers with natural
//! strategies also implement [`Deserialize`] directly.

use core::fmt;
use core::hash::Hash;
use core::marker::PhantomData;

use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::elements::{ElementBackend, Elements, ElementsBuilder};
use crate::entries::{Entries, EntriesBuilder, EntryBackend};

/// Upper bound on what a size hint may preallocate.
const MAX_PREALLOCATION: usize = 4096;

// =============================================================================
// Entries
// =============================================================================

impl<K, V, B> Serialize for Entries<K, V, B>
where
    K: Serialize,
    V: Serialize,
    B: EntryBackend<K, V>,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for pair in self.iter() {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }
}

struct EntriesVisitor<K, V, B: EntryBackend<K, V>> {
    builder: EntriesBuilder<K, V, B>,
}

impl<'de, K, V, B> Visitor<'de> for EntriesVisitor<K, V, B>
where
    K: Deserialize<'de> + Clone,
    V: Deserialize<'de> + Clone,
    B: EntryBackend<K, V>,
{
    type Value = Entries<K, V, B>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of key/value pairs")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATION));
        while let Some(pair) = seq.next_element::<(K, V)>()? {
            items.push(pair);
        }
        let mut entries = self.builder.build().map_err(de::Error::custom)?;
        if entries.backend().inserts_at_head() {
            items.reverse();
        }
        debug!(count = items.len(), "restoring entries");
        entries.put_all(items).map_err(de::Error::custom)?;
        Ok(entries)
    }
}

impl<'de, K, V, B> DeserializeSeed<'de> for EntriesBuilder<K, V, B>
where
    K: Deserialize<'de> + Clone,
    V: Deserialize<'de> + Clone,
    B: EntryBackend<K, V>,
{
    type Value = Entries<K, V, B>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(EntriesVisitor { builder: self })
    }
}

impl<'de, K, V, B> Deserialize<'de> for Entries<K, V, B>
where
    K: Deserialize<'de> + Clone,
    V: Deserialize<'de> + Clone + Eq + Hash + 'static,
    B: EntryBackend<K, V>,
    B::KeyComparator: Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Entries::builder().deserialize(deserializer)
    }
}

// =============================================================================
// Elements
// =============================================================================

impl<E, B> Serialize for Elements<E, B>
where
    E: Serialize,
    B: ElementBackend<E>,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

struct ElementsVisitor<E, B: ElementBackend<E>> {
    builder: ElementsBuilder<E, B>,
    _marker: PhantomData<fn() -> E>,
}

impl<'de, E, B> Visitor<'de> for ElementsVisitor<E, B>
where
    E: Deserialize<'de> + Clone,
    B: ElementBackend<E>,
{
    type Value = Elements<E, B>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of elements")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATION));
        while let Some(element) = seq.next_element::<E>()? {
            items.push(element);
        }
        let mut elements = self.builder.build().map_err(de::Error::custom)?;
        debug!(count = items.len(), "restoring elements");
        elements.add_all(items).map_err(de::Error::custom)?;
        Ok(elements)
    }
}

impl<'de, E, B> DeserializeSeed<'de> for ElementsBuilder<E, B>
where
    E: Deserialize<'de> + Clone,
    B: ElementBackend<E>,
{
    type Value = Elements<E, B>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(ElementsVisitor {
            builder: self,
            _marker: PhantomData,
        })
    }
}

impl<'de, E, B> Deserialize<'de> for Elements<E, B>
where
    E: Deserialize<'de> + Clone + Eq + Hash + 'static,
    B: ElementBackend<E>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Elements::builder().deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{HashEntries, LinkedHashEntries, OrderAdjustMode, RedBlackTreeEntries};
    use crate::{ArrayElements, BidiType, LinkedElements, Validator};
    use pretty_assertions::assert_eq;

    fn from_json<'a, T: DeserializeSeed<'a>>(seed: T, json: &'a str) -> serde_json::Result<T::Value> {
        seed.deserialize(&mut serde_json::Deserializer::from_str(json))
    }

    #[test]
    fn linked_hash_keeps_insertion_order() {
        let mut m = LinkedHashEntries::<String, i32>::builder().build().unwrap();
        for (k, v) in [("z", 1), ("a", 2), ("m", 3)] {
            m.put(k.to_string(), v).unwrap();
        }
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"[["z",1],["a",2],["m",3]]"#);
        let back: LinkedHashEntries<String, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.iter().collect::<Vec<_>>(), m.iter().collect::<Vec<_>>());
    }

    #[test]
    fn head_append_order_survives() {
        let builder = || {
            LinkedHashEntries::<u8, u8>::builder()
                .head_append(true)
                .access_mode(OrderAdjustMode::Head)
        };
        let mut m = builder().build().unwrap();
        m.put_all([(1, 1), (2, 2), (3, 3)]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back = from_json(builder(), &json).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), m.keys().collect::<Vec<_>>());
    }

    #[test]
    fn tree_accepts_unsorted_input() {
        let back: RedBlackTreeEntries<i32, i32> = serde_json::from_str("[[3,0],[1,0],[2,0]]").unwrap();
        assert_eq!(back.keys().copied().collect::<Vec<_>>(), [1, 2, 3]);
        assert!(back.backend().check_invariants().is_ok());
    }

    #[test]
    fn tree_rebuilds_sorted_input_and_inverse() {
        let json = serde_json::to_string(&(0..100).map(|k| (k, k + 1000)).collect::<Vec<_>>()).unwrap();
        let seed = RedBlackTreeEntries::<i32, i32>::builder().bidi(BidiType::AllValues);
        let back = from_json(seed, &json).unwrap();
        assert_eq!(back.len(), 100);
        assert!(back.backend().check_invariants().is_ok());
        assert_eq!(back.get_by_value(&1042), Some(&42));
    }

    #[test]
    fn builder_validators_run_on_restore() {
        let seed = HashEntries::<u8, u8>::builder().value_validator(Validator::new(|v: &u8| {
            if *v < 10 { Ok(()) } else { Err(format!("{v} is too large")) }
        }));
        assert!(from_json(seed.clone(), "[[1,2]]").is_ok());
        let err = from_json(seed, "[[1,2],[3,40]]").unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn element_backends_round_trip() {
        let mut array = ArrayElements::<String>::builder().build().unwrap();
        array.add_all(["x", "y", "x"].map(String::from)).unwrap();
        let json = serde_json::to_string(&array).unwrap();
        assert_eq!(json, r#"["x","y","x"]"#);

        let linked: LinkedElements<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(linked.iter().collect::<Vec<_>>(), array.iter().collect::<Vec<_>>());
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(serde_json::from_str::<HashEntries<u8, u8>>("[[1]]").is_err());
        assert!(serde_json::from_str::<ArrayElements<u8>>("{}").is_err());
    }
}
