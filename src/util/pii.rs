//! Redaction wrapper for values that identify the people on a call.
//!
//! Dial strings, mail box numbers, conference ids and addresses all end
//! up in the negotiation logs. With the `pii` feature enabled, anything
//! wrapped in [`Pii`] formats as `{REDACTED}` in both `Display` and
//! `Debug`. Without the feature the inner value is shown unchanged.
//!
//! Use it for debug level and above. Trace logs are left as is.

use core::fmt;
use core::ops::Deref;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pii<T>(pub T);

impl<T: fmt::Display> fmt::Display for Pii<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if cfg!(feature = "pii") {
            return f.write_str("{REDACTED}");
        }
        self.0.fmt(f)
    }
}

impl<T: fmt::Debug> fmt::Debug for Pii<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if cfg!(feature = "pii") {
            return f.write_str("{REDACTED}");
        }
        self.0.fmt(f)
    }
}

impl<T> Deref for Pii<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn ip_display() {
        let addr = Pii(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));

        if cfg!(feature = "pii") {
            assert_eq!(addr.to_string(), "{REDACTED}");
        } else {
            assert_eq!(addr.to_string(), "10.0.0.7");
        }
    }

    #[test]
    fn dial_string_debug() {
        let dial = Pii("18005551234");

        if cfg!(feature = "pii") {
            assert_eq!(format!("{:?}", dial), "{REDACTED}");
        } else {
            assert_eq!(format!("{:?}", dial), "\"18005551234\"");
        }
    }
}
