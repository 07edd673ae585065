//! Transactional collections with two-phase change triggers.
//!
//! Every structural change to a container (an entry or element being added,
//! changed or removed) can be observed by a handler in two phases: a *pre*
//! callback before anything is applied and a *post* callback after the whole
//! operation has been applied. Each operation is recorded by a [`Trigger`]
//! that decides, from the pre callbacks, whether the mutation runs at all.
//!
//! Two families of containers share that machinery:
//!
//! - [`Entries`]: key/value maps backed by a hash table, an insertion-ordered
//!   linked hash table, or a size-augmented red-black tree with ranged
//!   [`SubTree`] views.
//! - [`Elements`]: positional sequences backed by a growable array or a
//!   doubly linked list, with window-relative [`SubList`] views.
//!
//! Both can keep an inverse index ("bidi"), in which case a value (or
//! element) may appear only once and inserting a duplicate removes the
//! previous holder as a *conflict*, announced before the insertion itself.
//!
//! Handler callbacks may not start new mutations. A per-container freeze
//! counter is raised while callbacks run, and a mutation attempted in that
//! window fails with [`Error::Frozen`].
//!
//! # Example
//!
//! ```
//! use nexus_txcollections::{BidiType, BoxError, EntriesHandler, HashEntries};
//!
//! #[derive(Default)]
//! struct Audit(Vec<String>);
//!
//! impl EntriesHandler<&'static str, u32> for Audit {
//!     type Argument = ();
//!
//!     fn create_adding_argument(&mut self, _: &&'static str, _: &u32) -> Option<()> {
//!         Some(())
//!     }
//!     fn create_changing_argument(&mut self, _: &&'static str, _: &u32, _: &&'static str, _: &u32) -> Option<()> {
//!         Some(())
//!     }
//!     fn create_removing_argument(&mut self, _: &&'static str, _: &u32) -> Option<()> {
//!         Some(())
//!     }
//!     fn removed(&mut self, k: &&'static str, _: &u32, _: Option<&mut ()>) -> Result<(), BoxError> {
//!         self.0.push(format!("removed {k}"));
//!         Ok(())
//!     }
//!     fn added(&mut self, k: &&'static str, _: &u32, _: Option<&mut ()>) -> Result<(), BoxError> {
//!         self.0.push(format!("added {k}"));
//!         Ok(())
//!     }
//! }
//!
//! let mut m = HashEntries::<&'static str, u32>::builder()
//!     .bidi(BidiType::AllValues)
//!     .build()
//!     .unwrap();
//! let mut audit = Audit::default();
//! m.put_with("a", 1, &mut audit).unwrap();
//! m.put_with("b", 1, &mut audit).unwrap();
//! assert_eq!(audit.0, ["added a", "removed a", "added b"]);
//! ```

#![warn(missing_docs)]

mod attach;
pub mod comparator;
pub mod contains;
pub mod elements;
pub mod entries;
pub mod error;
pub mod handler;
pub mod index;
pub mod range;
mod serial;
pub mod storage;
pub mod suspend;
pub mod trigger;
pub mod validator;

pub use comparator::{Comparator, EqualityComparator, UnifiedComparator};
pub use contains::{ContainsSource, OverriddenContainsBehavior};
pub use elements::{
    ArrayConfig, ArrayElements, ElementBackend, Elements, ElementsBuilder, ElementsCursor, ElementsView,
    GrowableArray, LinkedConfig, LinkedElements, NodeList, ReaderOptimization, SubList,
};
pub use entries::{
    BidiType, Entries, EntriesBuilder, EntriesCursor, EntryBackend, HashEntries, LinkedHashEntries,
    RedBlackTreeEntries, ReplacementRule, SubTree,
};
pub use error::{BoxError, Error, HandlerError, Result};
pub use handler::{ElementsConflictHandler, ElementsHandler, EntriesHandler, NoHandler};
pub use index::{EntryId, Index};
pub use range::{Endpoint, NavigableRange};
pub use storage::NodeStorage;
pub use suspend::FrozenContextSuspending;
pub use trigger::{Freeze, Trigger};
pub use validator::Validator;
