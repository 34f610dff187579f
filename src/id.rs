#![allow(missing_docs)]

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! num_id {
    ($id:ident, $t:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $id($t);

        impl $id {
            pub fn new() -> Self {
                $id(fastrand::$t(..))
            }
        }

        impl Deref for $id {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$t> for $id {
            fn from(v: $t) -> Self {
                $id(v)
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

num_id!(Pt, u8);
num_id!(SessionId, u64);
num_id!(CallId, u32);
num_id!(LegId, u32);

impl Pt {
    /// First payload number of the dynamic range (RFC 3551).
    pub const DYNAMIC_START: u8 = 96;

    /// Last payload number of the dynamic range.
    pub const DYNAMIC_END: u8 = 127;

    pub const fn new_with_value(v: u8) -> Pt {
        Pt(v)
    }

    pub fn is_dynamic(&self) -> bool {
        (Self::DYNAMIC_START..=Self::DYNAMIC_END).contains(&self.0)
    }
}

impl SessionId {
    /// Origin session ids must fit a signed 63 bit integer for some peers.
    pub fn new_origin() -> Self {
        SessionId(fastrand::u64(1..i64::MAX as u64))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dynamic_range() {
        assert!(!Pt::from(0).is_dynamic());
        assert!(!Pt::from(95).is_dynamic());
        assert!(Pt::from(96).is_dynamic());
        assert!(Pt::from(127).is_dynamic());
        assert!(!Pt::from(128).is_dynamic());
    }

    #[test]
    fn origin_session_id_positive() {
        for _ in 0..100 {
            let id = SessionId::new_origin();
            assert!(*id > 0 && *id < i64::MAX as u64);
        }
    }
}
