//! The negotiation engine of one call leg.
//!
//! A [`CallLeg`] is driven by the SIP layer. Every received SDP body goes
//! into [`CallLeg::process_sdp`] together with the transaction that carried
//! it. ICE progress is reported through [`CallLeg::ice_gathering_complete`]
//! and [`CallLeg::ice_nominations_complete`]. What the SIP layer must send in
//! response is queued and drained with [`CallLeg::poll_output`].
//!
//! The leg refers to its call by [`CallId`]. Every operation takes the
//! [`Calls`] arena and fails with [`NegotiationError::CallGone`] if the call
//! has been removed.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::call::{Call, Calls, EndReason};
use crate::config::{NegotiationConfig, SecureCallMode};
use crate::crypto::{DtlsContext, EncryptionState, KeyExchangeMethod};
use crate::ice::{IceAgent, IceAttributes, IceSession, IceState, MediaTransports};
use crate::id::{CallId, LegId, SessionId};
use crate::sdp::Sdp;
use crate::stream::{LocalStream, MediaKind, PerKind, SdpStream};
use crate::util::starts_with_ignore_case;
use crate::NegotiationError;

mod generate;
mod ice;
mod offer_answer;
mod parse;
mod security;

/// Remote SIP versions from this one on are WebRTC capable and link RTX
/// payloads themselves.
pub(crate) const WEBRTC_SIP_VERSION: u32 = 10;

/// Product name prefix of every SVRS device.
const SVRS_DEVICE_PREFIX: &str = "Sorenson";
/// Product name prefix of SVRS videophones, matched ignoring case.
const SVRS_VIDEOPHONE_PREFIX: &str = "Sorenson Videophone";
/// Product name of the hold server.
const SVRS_HOLD_SERVER: &str = "Sorenson Hold Server";
/// Info package announcing contact sharing.
const SHARE_CONTACT_PACKAGE: &str = "x-share-contact";

/// Whether an SDP is an offer or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SdpRole {
    #[default]
    Offer,
    Answer,
}

/// The SIP transaction that carried, or must carry, an SDP body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SipMessage {
    #[default]
    None,
    Invite,
    /// A reliable (100rel) provisional response to the INVITE.
    ReliableResponse,
    Prack,
    /// The 200 to a PRACK.
    PrackFinalResponse,
    /// The 200 to an INVITE.
    InviteFinalResponse,
    Ack,
    Update,
    /// The 200 to an UPDATE.
    UpdateFinalResponse,
}

impl SipMessage {
    /// Messages that can carry an answer but never an offer.
    pub fn answer_only(&self) -> bool {
        matches!(
            self,
            SipMessage::Ack | SipMessage::PrackFinalResponse | SipMessage::UpdateFinalResponse
        )
    }
}

/// What a remote product name tells us about the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RemoteDevice {
    SvrsVideophone,
    SvrsHoldServer,
    /// Any other SVRS product.
    SvrsDevice,
    #[default]
    Other,
}

impl RemoteDevice {
    /// Classify by product name.
    pub fn classify(product_name: &str) -> Self {
        if product_name == SVRS_HOLD_SERVER {
            RemoteDevice::SvrsHoldServer
        } else if starts_with_ignore_case(product_name, SVRS_VIDEOPHONE_PREFIX) {
            RemoteDevice::SvrsVideophone
        } else if product_name.starts_with(SVRS_DEVICE_PREFIX) {
            RemoteDevice::SvrsDevice
        } else {
            RemoteDevice::Other
        }
    }

    pub fn is_svrs(&self) -> bool {
        *self != RemoteDevice::Other
    }
}

/// Actions for the SIP layer and notifications for the call layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Send the initial INVITE with our offer.
    Invite { sdp: Sdp },
    /// Send a re-INVITE with a new offer.
    ReInvite { sdp: Sdp },
    /// Send a provisional response to the INVITE.
    Provisional {
        code: u16,
        sdp: Option<Sdp>,
        /// Send with 100rel.
        reliable: bool,
        /// System info to attach for SVRS peers.
        sinfo: Option<String>,
    },
    /// Send the 200 to the INVITE.
    Accept { sdp: Option<Sdp> },
    Prack { sdp: Option<Sdp> },
    PrackResponse { code: u16, sdp: Option<Sdp> },
    /// Send the 200 to an UPDATE.
    UpdateResponse { sdp: Sdp },
    Ack { sdp: Option<Sdp> },
    /// Start ringing locally.
    AlertLocalUser,
    /// Remote capabilities (text, VCO, system info) changed.
    CapabilitiesChanged,
    /// (Re)configure the media channels from the negotiated streams.
    ConfigureMedia {
        /// We are applying an answer to our own offer.
        reply: bool,
    },
    /// Start or continue DTLS, then configure media.
    DtlsBegin { reply: bool },
    /// Local transports for the media channels.
    Transports {
        /// From ICE nominations rather than gathered defaults.
        nominated: bool,
        transports: PerKind<Option<MediaTransports>>,
    },
    /// End the call.
    EndCall { reason: EndReason, sip_code: u16 },
}

/// What the remote endpoint told us about itself.
#[derive(Debug, Clone, Default)]
struct RemoteEndpoint {
    product_name: String,
    product_version: String,
    sip_version: u32,
    device: RemoteDevice,
    display_size: Option<(u32, u32)>,
    sinfo: Option<String>,
    sinfo_received: bool,
    transferable: bool,
    update_allowed: bool,
    share_contact: bool,
    /// Whether the peer is doing ICE with us.
    is_ice: bool,
}

/// RTCP feedback the peer offered, for report generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcpOffered {
    pub fir: bool,
    pub pli: bool,
    pub tmmbr: bool,
    pub nack: bool,
}

/// SDP negotiation for one leg of a call.
pub struct CallLeg {
    id: LegId,
    call_id: CallId,
    config: NegotiationConfig,
    ice_agent: Option<Arc<dyn IceAgent>>,
    ice: Option<Box<dyn IceSession>>,
    dtls: Option<DtlsContext>,

    /// The m-lines of the last received SDP, by index.
    streams: Vec<SdpStream>,
    local: PerKind<LocalStream>,

    /// Our last generated SDP.
    sdp: Option<Sdp>,
    sdp_role: SdpRole,
    session_id: SessionId,
    sdp_version: u64,

    answer_pending: bool,
    offer_answer_complete: bool,
    /// Our answer waits for the 200 to the INVITE.
    answer_ready: bool,
    next_ice_message: SipMessage,
    ice_attributes: IceAttributes,

    remote: RemoteEndpoint,
    rtcp_offered: RtcpOffered,
    /// Session level bandwidth of the last received SDP, kbps.
    call_bandwidth: u32,

    reliable_provisional: bool,
    tunneled: bool,
    send_offer_in_prack: bool,
    send_offer_when_ready: bool,
    pending_offer_update: bool,
    /// Offer again once an answer shows the peer is an SVRS device.
    reoffer_to_svrs: bool,

    output: VecDeque<Output>,
}

impl CallLeg {
    /// Create a leg of a call in the arena.
    pub fn new(
        calls: &mut Calls,
        call_id: CallId,
        config: NegotiationConfig,
    ) -> Result<Self, NegotiationError> {
        let id = LegId::new();
        calls.call_mut(call_id)?.register_leg(id);

        Ok(CallLeg {
            id,
            call_id,
            config,
            ice_agent: None,
            ice: None,
            dtls: None,
            streams: vec![],
            local: PerKind::default(),
            sdp: None,
            sdp_role: SdpRole::Offer,
            session_id: SessionId::new_origin(),
            sdp_version: 0,
            answer_pending: false,
            offer_answer_complete: false,
            answer_ready: false,
            next_ice_message: SipMessage::None,
            ice_attributes: IceAttributes::default(),
            remote: RemoteEndpoint::default(),
            rtcp_offered: RtcpOffered::default(),
            call_bandwidth: 0,
            reliable_provisional: false,
            tunneled: false,
            send_offer_in_prack: false,
            send_offer_when_ready: false,
            pending_offer_update: false,
            reoffer_to_svrs: false,
            output: VecDeque::new(),
        })
    }

    /// Use an ICE agent. Without one the leg never does ICE.
    pub fn with_ice_agent(mut self, agent: Arc<dyn IceAgent>) -> Self {
        self.ice_agent = Some(agent);
        self
    }

    /// Use a DTLS context. Without one DTLS is never selected.
    pub fn with_dtls(mut self, ctx: DtlsContext) -> Self {
        self.dtls = Some(ctx);
        self
    }

    pub fn id(&self) -> LegId {
        self.id
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Next queued action. Drain until `None` after every operation.
    pub fn poll_output(&mut self) -> Option<Output> {
        let o = self.output.pop_front()?;
        debug!("Leg {} output {:?}", self.id, o);
        Some(o)
    }

    fn enqueue(&mut self, o: Output) {
        self.output.push_back(o);
    }

    /// Remote product from the User-Agent header.
    pub fn set_remote_product(&mut self, name: &str, version: &str) {
        self.remote.product_name = name.to_string();
        self.remote.product_version = version.to_string();
        self.remote.device = RemoteDevice::classify(name);
    }

    pub fn set_remote_sip_version(&mut self, version: u32) {
        self.remote.sip_version = version;
    }

    /// Methods from the peer's Allow header.
    pub fn set_remote_allow(&mut self, methods: &[&str]) {
        let has = |m: &str| methods.iter().any(|v| v.eq_ignore_ascii_case(m));
        self.remote.transferable = has("REFER");
        self.remote.update_allowed = has("UPDATE");
    }

    /// Info packages from the peer's Recv-Info header.
    pub fn set_remote_info_packages(&mut self, packages: &[&str]) {
        self.remote.share_contact = self.remote.device.is_svrs()
            && packages
                .iter()
                .any(|p| p.eq_ignore_ascii_case(SHARE_CONTACT_PACKAGE));
    }

    /// The dialog supports reliable provisional responses (100rel).
    pub fn set_reliable_provisional(&mut self, enabled: bool) {
        self.reliable_provisional = enabled;
    }

    /// The leg is tunneled and has no NAT traversal of its own.
    pub fn set_tunneled(&mut self, tunneled: bool) {
        self.tunneled = tunneled;
    }

    /// A PRACK is still to be sent and can carry an offer.
    pub fn set_send_offer_in_prack(&mut self, enabled: bool) {
        self.send_offer_in_prack = enabled;
    }

    pub fn remote_product_name(&self) -> &str {
        &self.remote.product_name
    }

    pub fn remote_product_version(&self) -> &str {
        &self.remote.product_version
    }

    pub fn remote_sip_version(&self) -> u32 {
        self.remote.sip_version
    }

    pub fn remote_device(&self) -> RemoteDevice {
        self.remote.device
    }

    /// Width and height from `x-displaysize`.
    pub fn remote_display_size(&self) -> Option<(u32, u32)> {
        self.remote.display_size
    }

    /// The last `x-sinfo` of the peer.
    pub fn remote_system_info(&self) -> Option<&str> {
        self.remote.sinfo.as_deref()
    }

    pub fn is_transferable(&self) -> bool {
        self.remote.transferable
    }

    pub fn is_update_allowed(&self) -> bool {
        self.remote.update_allowed
    }

    pub fn can_share_contact(&self) -> bool {
        self.remote.share_contact
    }

    pub fn remote_is_ice(&self) -> bool {
        self.remote.is_ice
    }

    pub fn rtcp_offered(&self) -> RtcpOffered {
        self.rtcp_offered
    }

    /// The m-lines of the last received SDP.
    pub fn streams(&self) -> &[SdpStream] {
        &self.streams
    }

    /// What we announced for a media kind.
    pub fn local_stream(&self, kind: MediaKind) -> Option<&LocalStream> {
        self.local.get(kind)
    }

    /// Our last generated SDP.
    pub fn local_sdp(&self) -> Option<&Sdp> {
        self.sdp.as_ref()
    }

    pub fn sdp_version(&self) -> u64 {
        self.sdp_version
    }

    pub fn answer_pending(&self) -> bool {
        self.answer_pending
    }

    pub fn offer_answer_complete(&self) -> bool {
        self.offer_answer_complete
    }

    /// The transaction that will carry the SDP once ICE is ready.
    pub fn next_ice_message(&self) -> SipMessage {
        self.next_ice_message
    }

    pub fn ice_state(&self) -> Option<IceState> {
        self.ice.as_ref().map(|s| s.state())
    }

    /// An offer waits for the call to connect.
    pub fn send_offer_when_ready(&self) -> bool {
        self.send_offer_when_ready
    }

    /// An offer update waits for the reliable response to be acknowledged.
    pub fn pending_offer_update(&self) -> bool {
        self.pending_offer_update
    }

    /// Encryption state of the media session of a kind.
    pub fn encryption_state(
        &self,
        calls: &Calls,
        kind: MediaKind,
    ) -> Result<EncryptionState, NegotiationError> {
        let call = calls.call(self.call_id)?;
        Ok(call
            .session(kind)
            .map(|s| s.encryption_state())
            .unwrap_or_default())
    }

    /// Key exchange of the media session of a kind.
    pub fn key_exchange_method(
        &self,
        calls: &Calls,
        kind: MediaKind,
    ) -> Result<KeyExchangeMethod, NegotiationError> {
        let call = calls.call(self.call_id)?;
        Ok(call
            .session(kind)
            .map(|s| s.key_exchange_method())
            .unwrap_or_default())
    }

    fn use_ice(&self) -> bool {
        self.config.use_ice && self.ice_agent.is_some()
    }

    fn is_svrs_device(&self) -> bool {
        self.remote.device.is_svrs()
    }

    /// System info to attach to responses, for SVRS peers that read it.
    fn sinfo_for_peer(&self) -> Option<String> {
        if self.is_svrs_device() && self.remote.sip_version >= 2 {
            self.config.system_info.clone()
        } else {
            None
        }
    }

    fn encryption_required(&self, call: &Call) -> bool {
        self.config.secure_call_mode == SecureCallMode::Required
            && self.remote.device != RemoteDevice::SvrsHoldServer
            && call.dial_string != "911"
    }

    fn include_encryption_attributes(&self, call: &Call) -> bool {
        self.config.secure_call_mode != SecureCallMode::Disabled
            && !self
                .config
                .encryption_excluded_hosts
                .iter()
                .any(|h| call.routing_address.contains(h.as_str()))
    }

    fn dtls_selected(&self) -> bool {
        self.local.audio.has_dtls() || self.local.video.has_dtls() || self.local.text.has_dtls()
    }

    /// Ask for the media to be (re)configured.
    fn media_update(&mut self, reply: bool) {
        if self.dtls_selected() {
            self.enqueue(Output::DtlsBegin { reply });
        } else {
            self.enqueue(Output::ConfigureMedia { reply });
        }
    }

    /// Send 180 Ringing. Returns whether the local user was alerted.
    fn send_ringing(&mut self, call: &mut Call, alert_count: &mut u32) -> bool {
        if self.reliable_provisional && self.is_svrs_device() && self.remote.sip_version >= 2 {
            let sinfo = self.config.system_info.clone();
            self.enqueue(Output::Provisional {
                code: 180,
                sdp: None,
                reliable: true,
                sinfo,
            });
            *alert_count += 1;
            false
        } else {
            self.enqueue(Output::Provisional {
                code: 180,
                sdp: None,
                reliable: false,
                sinfo: None,
            });
            self.alert_user(call);
            true
        }
    }

    fn alert_user(&mut self, call: &mut Call) {
        if !call.alert_local_user {
            call.alert_local_user = true;
            self.enqueue(Output::AlertLocalUser);
        }
    }

    fn alert_countdown_decrement(&mut self, call: &mut Call) {
        if call.alert_countdown_decrement() {
            self.alert_user(call);
        }
    }

    fn end_call(&mut self, call: &mut Call, reason: EndReason, sip_code: u16) {
        info!("Leg {} ends call {}: {:?} {}", self.id, call.id(), reason, sip_code);
        self.ice_end();
        call.state = crate::call::CallState::Disconnecting;
        self.enqueue(Output::EndCall { reason, sip_code });
    }
}

impl fmt::Debug for CallLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLeg")
            .field("id", &self.id)
            .field("call_id", &self.call_id)
            .field("streams", &self.streams.len())
            .field("sdp_version", &self.sdp_version)
            .field("answer_pending", &self.answer_pending)
            .field("offer_answer_complete", &self.offer_answer_complete)
            .field("next_ice_message", &self.next_ice_message)
            .field("ice", &self.ice_state())
            .finish()
    }
}
