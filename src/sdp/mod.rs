//! Session description model with typed attribute values.

#![allow(missing_docs)]

use thiserror::Error;

mod data;
pub use data::{Bandwidth, BandwidthType, Crypto, FeedbackType, FormatParam, KeyParam};
pub use data::{MediaAttribute, MediaLine, MediaType, Origin, Proto, Rtcp, RtpMap};
pub use data::{Sdp, SessionAttribute, Setup};
pub use data::{ATTR_DISPLAY_SIZE, ATTR_GROUP_CHAT, ATTR_MAIL, ATTR_SINFO};

mod parser;
pub(crate) use parser::display_size;

/// Errors from typing SDP attribute values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// An attribute value that doesn't follow its grammar.
    #[error("SDP parse: {0}")]
    Parse(String),

    /// A description that parses but doesn't make sense.
    #[error("SDP inconsistent: {0}")]
    Inconsistent(String),
}
