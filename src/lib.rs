//! SDP offer/answer negotiation for the SIP call legs of a videophone.
//!
//! This is a Sans I/O implementation. The [`CallLeg`] does no network
//! talking and runs no threads. The SIP layer hands it received SDP bodies
//! together with the transaction that carried them, and drains
//! [`Output`] actions telling it what to send next.
//!
//! ```no_run
//! use sdpneg::{Call, Calls, CallLeg, NegotiationConfig, Output, SipMessage};
//! # fn parse_body() -> sdpneg::Sdp { unimplemented!() }
//!
//! let mut calls = Calls::new();
//! let call_id = calls.insert(Call::new(sdpneg::CallId::new()));
//! let mut leg = CallLeg::new(&mut calls, call_id, NegotiationConfig::new()).unwrap();
//!
//! // An INVITE arrived with an offer.
//! let offer = parse_body();
//! leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer)).unwrap();
//!
//! while let Some(o) = leg.poll_output() {
//!     match o {
//!         Output::Provisional { .. } => { /* send 180 */ }
//!         Output::AlertLocalUser => { /* ring */ }
//!         _ => {}
//!     }
//! }
//!
//! // The user picked up.
//! leg.accept(&mut calls).unwrap();
//! ```
//!
//! # Collaborators
//!
//! ICE and the media layer live outside this crate. They are reached
//! through the [`IceAgent`]/[`IceSession`] and [`RtpSession`] traits.
//!
//! # Logging
//!
//! Logging goes through `tracing`. Addresses, dial strings and key
//! material are redacted at debug level and above with the `pii` feature.

#![forbid(unsafe_code)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

use thiserror::Error;

mod call;
pub use call::{Call, CallState, Calls, EndReason, LegIceState, McuType};
pub use call::{MediaChannel, MediaChannels, MediaSupport, RtpSession, Substate, VcoType};

mod config;
pub use config::{NegotiationConfig, SecureCallMode, SignalingSupport};

/// Media encryption parameters.
pub mod crypto;

mod direction;
pub use direction::Direction;

/// Codecs and payload numbers.
pub mod format;

mod ice;
pub use ice::{IceAgent, IceAttributes, IceNominations, IceRole, IceSession};
pub use ice::{IceState, IceSupport, MediaTransports};

mod id;
pub use id::{CallId, LegId, Pt, SessionId};

mod leg;
pub use leg::{CallLeg, Output, RemoteDevice, RtcpOffered, SdpRole, SipMessage};

/// Session descriptions.
pub mod sdp;
pub use sdp::Sdp;

mod stream;
pub use stream::{LocalStream, MediaKind, PayloadEntry, PerKind, SdpStream};

mod util;

/// Various error types.
pub mod error {
    pub use crate::ice::IceError;
    pub use crate::sdp::SdpError;
}

/// Errors from the negotiation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NegotiationError {
    /// The message doesn't fit the offer/answer state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The remote SDP offers media we can't handle.
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Encryption is required and the peer offered none we accept.
    #[error("security inadequate")]
    SecurityInadequate,

    /// No local address to put in our SDP.
    #[error("no local address")]
    NoLocalAddress,

    /// Asked to repeat an SDP that was never created.
    #[error("no SDP available")]
    NoSdpAvailable,

    /// An answer arrived with no offer outstanding.
    #[error("unexpected answer")]
    UnexpectedAnswer,

    /// The remote SDP is valid but the call can't go on with it.
    #[error("call not viable: {0}")]
    NotViable(String),

    /// The call of a leg has been removed.
    #[error("call {0} is gone")]
    CallGone(CallId),

    /// ICE errors.
    #[error("{0}")]
    Ice(#[from] error::IceError),

    /// SDP errors.
    #[error("{0}")]
    Sdp(#[from] error::SdpError),
}

impl NegotiationError {
    /// SIP status to reject the transaction with, if any.
    ///
    /// A call that is not viable ends without a response code of its own.
    pub fn sip_response(&self) -> Option<u16> {
        use NegotiationError::*;
        match self {
            ProtocolViolation(_) => Some(480),
            UnsupportedMedia(_) | SecurityInadequate => Some(488),
            NotViable(_) => None,
            _ => Some(500),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sip_responses() {
        assert_eq!(
            NegotiationError::ProtocolViolation("x".into()).sip_response(),
            Some(480)
        );
        assert_eq!(NegotiationError::SecurityInadequate.sip_response(), Some(488));
        assert_eq!(NegotiationError::NotViable("x".into()).sip_response(), None);
        assert_eq!(NegotiationError::NoLocalAddress.sip_response(), Some(500));
    }

    #[test]
    fn is_send() {
        fn is_send<T: Send>(_t: T) {}
        is_send(NegotiationError::UnexpectedAnswer);
    }
}
