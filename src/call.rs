//! Calls and the per call state the negotiation reads and writes.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::crypto::{DtlsContext, EncryptionState, KeyExchangeMethod, SdesKey, SdesKeyPair};
use crate::format::PayloadMappings;
use crate::ice::MediaTransports;
use crate::id::{CallId, LegId};
use crate::stream::{MediaKind, PerKind};
use crate::NegotiationError;

/// Connection state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// We put the call on hold.
    HoldLocal,
    /// The peer put the call on hold.
    HoldRemote,
    HoldBoth,
    Disconnecting,
    Disconnected,
    Transferring,
}

/// How a call state treats an offer or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Call setup.
    Setup,
    /// Established, possibly held.
    Established,
    /// Nothing can be negotiated.
    Unavailable,
}

impl CallState {
    pub(crate) fn phase(&self) -> Phase {
        use CallState::*;
        match self {
            Idle | Connecting => Phase::Setup,
            Connected | HoldLocal | HoldRemote | HoldBoth => Phase::Established,
            Disconnecting | Disconnected | Transferring => Phase::Unavailable,
        }
    }

    /// Local hold, alone or together with remote hold.
    pub fn is_local_hold(&self) -> bool {
        matches!(self, CallState::HoldLocal | CallState::HoldBoth)
    }

    /// Remote hold, alone or together with local hold.
    pub fn is_remote_hold(&self) -> bool {
        matches!(self, CallState::HoldRemote | CallState::HoldBoth)
    }

    fn with_hold(local: bool, remote: bool) -> Self {
        match (local, remote) {
            (false, false) => CallState::Connected,
            (true, false) => CallState::HoldLocal,
            (false, true) => CallState::HoldRemote,
            (true, true) => CallState::HoldBoth,
        }
    }
}

/// Hold and resume negotiations in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Substate {
    pub negotiating_local_hold: bool,
    pub negotiating_local_resume: bool,
    pub negotiating_remote_hold: bool,
    pub negotiating_remote_resume: bool,
}

/// A playback or record channel of the media layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaChannel {
    /// Local address we receive RTP on.
    pub rtp: SocketAddr,
    pub rtcp: SocketAddr,
    /// Privacy (mute) is on.
    pub privacy: bool,
    /// Current flow control rate in bps.
    pub flow_control_rate: u32,
    /// Max rate of the channel in bps.
    pub max_channel_rate: u32,
}

/// Channels of one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaChannels {
    pub playback: Option<MediaChannel>,
    pub record: Option<MediaChannel>,
}

/// What this endpoint can do for one media kind in this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSupport {
    pub supported: bool,
    pub inbound: bool,
    pub outbound: bool,
    /// Video can be supported but switched off.
    pub active: bool,
}

impl Default for MediaSupport {
    fn default() -> Self {
        MediaSupport {
            supported: true,
            inbound: true,
            outbound: true,
            active: true,
        }
    }
}

/// Video relay preference of the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VcoType {
    OneLine,
    TwoLine,
}

/// Kind of conference server we are connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum McuType {
    /// Group video chat room.
    GroupChat,
    Other,
}

/// Why the negotiation ended a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// No address to send media to.
    NotAcceptable,
    /// Encryption is required and the peer offered none.
    SecurityInadequate,
    /// Nothing in the offer we can do ICE for.
    InvalidMedia,
    /// ICE failed on every leg.
    Unreachable,
    /// The peer redirected us to leave a video mail.
    LeaveMessage,
}

/// ICE outcome of one leg of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LegIceState {
    #[default]
    None,
    Succeeded,
    Failed,
}

/// The RTP session of one media kind, owned by the media layer.
///
/// The negotiation hands it the agreed keys.
pub trait RtpSession: fmt::Debug {
    /// Local RTP and RTCP addresses.
    fn local_addresses(&self) -> Option<MediaTransports>;

    /// Use DTLS-SRTP with this context, or stop using it.
    fn set_dtls_context(&mut self, ctx: Option<DtlsContext>);

    fn set_sdes_keys(&mut self, keys: SdesKeyPair);

    /// Whether a decrypt key is in use and differs from `key`.
    fn decrypt_key_changed(&self, key: &SdesKey) -> bool;

    /// Pick a new SSRC for what we send.
    fn new_ssrc(&mut self);

    /// Send and receive in the clear. Calling it when already disabled is fine.
    fn disable_encryption(&mut self);

    fn encryption_state(&self) -> EncryptionState;

    fn key_exchange_method(&self) -> KeyExchangeMethod;
}

/// A call and the state shared by its legs.
#[derive(Debug)]
pub struct Call {
    id: CallId,
    pub state: CallState,
    pub substate: Substate,
    /// Audio bridged to another call. Bridged calls need no video.
    pub bridged: bool,
    pub payloads: PayloadMappings,
    pub support: PerKind<MediaSupport>,
    pub channels: PerKind<MediaChannels>,
    /// Transports to use while no channel exists.
    pub default_addrs: PerKind<Option<MediaTransports>>,
    pub sessions: PerKind<Option<Box<dyn RtpSession>>>,
    /// Address of the interface the call runs over.
    pub local_ip: Option<IpAddr>,
    pub dial_string: String,
    pub routing_address: String,
    pub remote_text_supported: bool,
    pub remote_vco: Option<VcoType>,
    pub mcu: Option<McuType>,
    pub conference_id: Option<String>,
    pub video_mail_number: Option<String>,
    pub leave_message: bool,
    /// Whether the call goes into call history.
    pub log_call: bool,
    /// The local user has been alerted.
    pub alert_local_user: bool,
    /// Events left before the user is alerted.
    pub alert_countdown: u32,
    legs: BTreeMap<LegId, LegIceState>,
}

impl Call {
    pub fn new(id: CallId) -> Self {
        Call {
            id,
            state: CallState::Idle,
            substate: Substate::default(),
            bridged: false,
            payloads: PayloadMappings::new(),
            support: PerKind::default(),
            channels: PerKind::default(),
            default_addrs: PerKind::default(),
            sessions: PerKind::default(),
            local_ip: None,
            dial_string: String::new(),
            routing_address: String::new(),
            remote_text_supported: false,
            remote_vco: None,
            mcu: None,
            conference_id: None,
            video_mail_number: None,
            leave_message: false,
            log_call: true,
            alert_local_user: false,
            alert_countdown: 0,
            legs: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn support(&self, kind: MediaKind) -> MediaSupport {
        self.support.get(kind).copied().unwrap_or(MediaSupport {
            supported: false,
            inbound: false,
            outbound: false,
            active: false,
        })
    }

    pub(crate) fn channels(&self, kind: MediaKind) -> MediaChannels {
        self.channels.get(kind).copied().unwrap_or_default()
    }

    pub(crate) fn session(&self, kind: MediaKind) -> Option<&dyn RtpSession> {
        self.sessions.get(kind)?.as_deref()
    }

    pub(crate) fn session_mut(&mut self, kind: MediaKind) -> Option<&mut (dyn RtpSession + 'static)> {
        self.sessions.get_mut(kind)?.as_deref_mut()
    }

    /// Start negotiating a local hold. Follow with a new offer.
    pub fn begin_local_hold(&mut self) {
        self.substate.negotiating_local_hold = true;
        self.substate.negotiating_local_resume = false;
    }

    /// Start negotiating a local resume. Follow with a new offer.
    pub fn begin_local_resume(&mut self) {
        self.substate.negotiating_local_resume = true;
        self.substate.negotiating_local_hold = false;
    }

    /// The peer's offer held (or released) every enabled stream.
    pub(crate) fn set_remote_hold(&mut self, held: bool) {
        if self.state.phase() != Phase::Established || held == self.state.is_remote_hold() {
            return;
        }
        if held {
            self.substate.negotiating_remote_hold = true;
        } else {
            self.substate.negotiating_remote_resume = true;
        }
    }

    /// Finish a hold negotiation, local or remote.
    pub(crate) fn hold_complete(&mut self, local: bool) {
        if self.state.phase() != Phase::Established {
            return;
        }

        let s = &mut self.substate;
        let mut local_hold = self.state.is_local_hold();
        let mut remote_hold = self.state.is_remote_hold();

        if local {
            if s.negotiating_local_hold {
                local_hold = true;
            } else if s.negotiating_local_resume {
                local_hold = false;
            }
            s.negotiating_local_hold = false;
            s.negotiating_local_resume = false;
        } else {
            if s.negotiating_remote_hold {
                remote_hold = true;
            } else if s.negotiating_remote_resume {
                remote_hold = false;
            }
            s.negotiating_remote_hold = false;
            s.negotiating_remote_resume = false;
        }

        let state = CallState::with_hold(local_hold, remote_hold);
        if state != self.state {
            debug!("Call {} hold state {:?} -> {:?}", self.id, self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn register_leg(&mut self, leg: LegId) {
        self.legs.entry(leg).or_default();
    }

    pub(crate) fn set_leg_ice(&mut self, leg: LegId, state: LegIceState) {
        self.legs.insert(leg, state);
    }

    /// Every leg of the call failed ICE nominations.
    pub fn all_legs_failed_ice(&self) -> bool {
        !self.legs.is_empty() && self.legs.values().all(|s| *s == LegIceState::Failed)
    }

    pub(crate) fn alert_countdown_decrement(&mut self) -> bool {
        self.alert_countdown = self.alert_countdown.saturating_sub(1);
        self.alert_countdown == 0
    }
}

/// All calls, indexed by id. Call legs refer to their call by [`CallId`].
#[derive(Debug, Default)]
pub struct Calls {
    calls: HashMap<CallId, Call>,
}

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, call: Call) -> CallId {
        let id = call.id;
        self.calls.insert(id, call);
        id
    }

    pub fn get(&self, id: CallId) -> Option<&Call> {
        self.calls.get(&id)
    }

    pub fn get_mut(&mut self, id: CallId) -> Option<&mut Call> {
        self.calls.get_mut(&id)
    }

    pub(crate) fn call(&self, id: CallId) -> Result<&Call, NegotiationError> {
        self.calls.get(&id).ok_or(NegotiationError::CallGone(id))
    }

    pub(crate) fn call_mut(&mut self, id: CallId) -> Result<&mut Call, NegotiationError> {
        self.calls.get_mut(&id).ok_or(NegotiationError::CallGone(id))
    }

    pub fn remove(&mut self, id: CallId) -> Option<Call> {
        self.calls.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn connected() -> Call {
        let mut call = Call::new(CallId::new());
        call.state = CallState::Connected;
        call
    }

    #[test]
    fn phases() {
        assert_eq!(CallState::Idle.phase(), Phase::Setup);
        assert_eq!(CallState::HoldBoth.phase(), Phase::Established);
        assert_eq!(CallState::Transferring.phase(), Phase::Unavailable);
    }

    #[test]
    fn remote_hold_and_resume() {
        let mut call = connected();
        call.set_remote_hold(true);
        assert!(call.substate.negotiating_remote_hold);
        call.hold_complete(false);
        assert_eq!(call.state, CallState::HoldRemote);

        call.set_remote_hold(false);
        call.hold_complete(false);
        assert_eq!(call.state, CallState::Connected);
    }

    #[test]
    fn local_then_remote_hold() {
        let mut call = connected();
        call.begin_local_hold();
        call.hold_complete(true);
        assert_eq!(call.state, CallState::HoldLocal);

        call.set_remote_hold(true);
        call.hold_complete(false);
        assert_eq!(call.state, CallState::HoldBoth);

        call.begin_local_resume();
        call.hold_complete(true);
        assert_eq!(call.state, CallState::HoldRemote);
    }

    #[test]
    fn hold_ignored_during_setup() {
        let mut call = Call::new(CallId::new());
        call.set_remote_hold(true);
        call.hold_complete(false);
        assert_eq!(call.state, CallState::Idle);
    }

    #[test]
    fn all_legs_failed() {
        let mut call = connected();
        assert!(!call.all_legs_failed_ice());

        let a = LegId::new();
        let b = LegId::new();
        call.register_leg(a);
        call.register_leg(b);
        call.set_leg_ice(a, LegIceState::Failed);
        assert!(!call.all_legs_failed_ice());
        call.set_leg_ice(b, LegIceState::Failed);
        assert!(call.all_legs_failed_ice());
    }

    #[test]
    fn arena_lookup() {
        let mut calls = Calls::new();
        let id = calls.insert(Call::new(CallId::new()));
        assert!(calls.call(id).is_ok());
        calls.remove(id);
        assert!(matches!(calls.call(id), Err(NegotiationError::CallGone(_))));
    }
}
