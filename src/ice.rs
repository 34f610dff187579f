//! Interface to the ICE engine.
//!
//! Candidate gathering and connectivity checks live outside this crate. The
//! call leg drives an [`IceSession`] through its states and feeds the
//! outcome back into the stream model.

#![allow(missing_docs)]

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

use crate::sdp::{MediaAttribute, Sdp, SessionAttribute};
use crate::stream::PerKind;

/// Errors from the ICE engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IceError {
    /// The session could not be started.
    #[error("ICE session start failed: {0}")]
    Start(String),

    /// The remote offer has no media we can do ICE for. The call should end.
    #[error("ICE invalid media: {0}")]
    InvalidMedia(String),

    /// Something in a description the ICE engine can't handle.
    #[error("ICE can't use SDP: {0}")]
    Unusable(String),

    /// Nominations or addresses asked for before they exist.
    #[error("ICE not ready: {0}")]
    NotReady(String),
}

/// What we started an ICE session for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceRole {
    /// We send the offer with candidates.
    Offerer,
    /// We answer an offer with candidates.
    Answerer,
    /// Only gathering transports for a peer that doesn't do ICE.
    Gatherer,
}

/// States of an ICE session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceState {
    Idle,
    Gathering,
    GatheringComplete,
    Nominating,
    Succeeded,
    Failed,
    /// Nominations have been handled by the call leg.
    Complete,
}

/// Whether the peer's description shows working ICE support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IceSupport {
    #[default]
    Unknown,
    Supported,
    NotSupported,
}

/// RTP and RTCP addresses of one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTransports {
    pub rtp: SocketAddr,
    pub rtcp: SocketAddr,
}

/// Attributes the ICE engine wants in our descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceAttributes {
    pub session: Vec<SessionAttribute>,
    /// One set per enabled m-line, in m-line order.
    pub media: Vec<Vec<MediaAttribute>>,
}

impl IceAttributes {
    pub fn clear(&mut self) {
        self.session.clear();
        self.media.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_empty() && self.media.is_empty()
    }
}

/// Outcome of the nomination phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceNominations {
    /// Our nominated transports.
    pub local: PerKind<Option<MediaTransports>>,
    /// The peer's nominated addresses.
    pub remote: PerKind<Option<MediaTransports>>,
    pub attributes: IceAttributes,
}

/// Starts ICE sessions. Shared between call legs.
pub trait IceAgent: fmt::Debug {
    /// Start a session. `sdp` is our offer for [`IceRole::Offerer`] and
    /// [`IceRole::Gatherer`] and the remote offer for [`IceRole::Answerer`].
    fn start_session(
        &self,
        role: IceRole,
        sdp: &Sdp,
    ) -> Result<(Box<dyn IceSession>, IceSupport), IceError>;
}

/// One running ICE session.
pub trait IceSession: fmt::Debug {
    fn role(&self) -> IceRole;

    fn state(&self) -> IceState;

    /// Record that the call leg has handled the nomination outcome.
    fn complete(&mut self);

    /// A description from the peer.
    fn sdp_received(&mut self, sdp: &Sdp) -> IceSupport;

    /// Put our candidates and credentials into an outgoing description.
    fn sdp_update(&mut self, sdp: &mut Sdp) -> Result<(), IceError>;

    /// Our default addresses once gathering is complete.
    fn local_addresses(&self) -> Result<PerKind<Option<MediaTransports>>, IceError>;

    fn nominations(&self) -> Result<IceNominations, IceError>;

    /// Start connectivity checks.
    fn proceed(&mut self) -> Result<(), IceError>;

    fn end(&mut self);
}
