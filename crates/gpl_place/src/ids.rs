//! Opaque ID newtypes for database entities.
//!
//! [`InstId`], [`NetId`], and [`PinId`] are thin `u32` wrappers that the
//! caller's database hands out. The placement engine keeps its own dense
//! indices internally and only uses these to talk back to the database.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Database ID of a placeable instance.
    InstId
);

define_id!(
    /// Database ID of a net.
    NetId
);

define_id!(
    /// Database ID of a pin.
    PinId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_roundtrip() {
        assert_eq!(InstId::from_raw(42).as_raw(), 42);
        assert_eq!(NetId::from_raw(99).as_raw(), 99);
        assert_eq!(PinId::from_raw(7).as_raw(), 7);
    }

    #[test]
    fn id_hash_and_order() {
        let mut set = HashSet::new();
        set.insert(NetId::from_raw(1));
        set.insert(NetId::from_raw(2));
        set.insert(NetId::from_raw(1));
        assert_eq!(set.len(), 2);
        assert!(InstId::from_raw(3) < InstId::from_raw(4));
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", InstId::from_raw(55)), "55");
    }
}
