//! Sentinel-based link indices and stable entry handles.
//!
//! Node links inside the containers use a reserved sentinel value
//! (`u32::MAX`) instead of `Option<u32>`, which keeps nodes small and lets
//! rotations and relinking work on plain integers.

/// A copyable link type with a sentinel "none" value.
///
/// # Example
///
/// ```
/// use nexus_txcollections::Index;
///
/// let link: u32 = 5;
/// assert!(link.is_some());
/// assert!(u32::NONE.is_none());
/// ```
pub trait Index: Copy + Eq {
    /// Sentinel value meaning "no node".
    const NONE: Self;

    /// Returns `true` if this is the sentinel value.
    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` if this is not the sentinel value.
    #[inline]
    fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Returns the link as a slot number.
    fn as_usize(self) -> usize;

    /// Creates a link from a slot number.
    fn from_usize(val: usize) -> Self;

    /// Converts the sentinel into `None`.
    #[inline]
    fn to_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }
}

macro_rules! impl_index_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Index for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as Self
                }
            }
        )*
    };
}

impl_index_for_unsigned!(u16, u32, u64, usize);

/// Stable handle to an entry owned by an entries container.
///
/// A handle stays valid until its entry is removed. Structural edits on
/// other entries (rebalancing, rehashing, reordering) never move an entry to
/// a different handle, so a handle observed before a deletion elsewhere still
/// names the same key/value afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    /// Returns the raw slot number.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Index for EntryId {
    const NONE: Self = EntryId(u32::MAX);

    #[inline]
    fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_usize(val: usize) -> Self {
        EntryId(val as u32)
    }
}

impl From<u32> for EntryId {
    #[inline]
    fn from(raw: u32) -> Self {
        EntryId(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_index_sentinel {
        ($($ty:ty => $name:ident),*) => {
            $(
                #[test]
                fn $name() {
                    assert!(<$ty>::NONE.is_none());
                    assert!(!<$ty>::NONE.is_some());
                    assert!((0 as $ty).is_some());
                    assert_eq!((7 as $ty).to_option(), Some(7));
                    assert_eq!(<$ty>::NONE.to_option(), None);
                }
            )*
        };
    }

    test_index_sentinel!(
        u16 => u16_sentinel,
        u32 => u32_sentinel,
        u64 => u64_sentinel,
        usize => usize_sentinel
    );

    #[test]
    fn entry_id_sentinel() {
        assert!(EntryId::NONE.is_none());
        let id = EntryId::from_usize(3);
        assert!(id.is_some());
        assert_eq!(id.raw(), 3);
        assert_eq!(id.as_usize(), 3);
        assert_eq!(EntryId::from(9u32), EntryId(9));
    }
}
