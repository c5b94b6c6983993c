//! Entity identifiers.
//!
//! Every backend service hands out its own integer keys. Wrapping them in
//! distinct types keeps a rider id from being passed where a driver id is
//! expected, which matters because the matching service reports both.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw integer key.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identity issued by the identity service. Riders are keyed by this id.
    UserId,
    "UserId"
);
entity_id!(
    /// Station key.
    StationId,
    "StationId"
);
entity_id!(
    /// Driver record key. Distinct from the owning [`UserId`].
    DriverId,
    "DriverId"
);
entity_id!(RideRequestId, "RideRequestId");
entity_id!(MatchId, "MatchId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_carries_kind() {
        assert_eq!(format!("{:?}", DriverId(7)), "DriverId(7)");
        assert_eq!(format!("{:?}", StationId(3)), "StationId(3)");
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(UserId(42).to_string(), "42");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&RideRequestId(9)).unwrap();
        assert_eq!(json, "9");
        let back: RideRequestId = serde_json::from_str("9").unwrap();
        assert_eq!(back, RideRequestId(9));
    }
}
