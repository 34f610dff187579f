use crate::call::{Call, CallState, Calls, EndReason, Phase};
use crate::ice::{IceError, IceRole, IceState, IceSupport};
use crate::sdp::Sdp;
use crate::NegotiationError;

use super::parse::ParseOutcome;
use super::{CallLeg, Output, SdpRole, SipMessage};

impl CallLeg {
    /// Handle the SDP body (or its absence) of a received SIP message.
    ///
    /// A body is an answer when we have an offer outstanding, otherwise an
    /// offer. ACK and the 200s to PRACK and UPDATE only ever carry answers.
    /// An INVITE without body asks us for an offer.
    pub fn process_sdp(
        &mut self,
        calls: &mut Calls,
        msg: SipMessage,
        sdp: Option<&Sdp>,
    ) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;

        match sdp {
            None if self.answer_pending => {
                trace!("Leg {} no answer in {:?}, still pending", self.id, msg);
                Ok(())
            }
            None => self.offerless(call, msg),
            Some(sdp) if self.answer_pending || msg.answer_only() => {
                self.process_answer(call, msg, sdp)
            }
            Some(sdp) => self.process_offer(call, msg, sdp),
        }
    }

    /// Send a new offer. During setup it goes in the PRACK if configured,
    /// otherwise once the call is connected.
    pub fn send_offer(&mut self, calls: &mut Calls) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;
        self.send_offer_inner(call)
    }

    /// Place an outgoing call with our initial offer.
    pub fn invite(&mut self, calls: &mut Calls) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;
        if call.state == CallState::Idle {
            call.state = CallState::Connecting;
        }

        let offer = self.initial_offer_create(call)?;

        if self.use_ice() {
            self.next_ice_message = SipMessage::Invite;
            match self.ice_start(IceRole::Offerer, &offer) {
                // The INVITE goes out when gathering completes.
                Ok(_) => return Ok(()),
                Err(e) => warn!("Leg {} sends INVITE without ICE: {}", self.id, e),
            }
        }

        self.enqueue(Output::Invite { sdp: offer });
        self.answer_pending = true;
        Ok(())
    }

    /// The local user answered the call. Queues the 200 to the INVITE.
    pub fn accept(&mut self, calls: &mut Calls) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;

        if self.answer_ready {
            self.answer_ready = false;
            self.enqueue(Output::Accept {
                sdp: self.sdp.clone(),
            });
            match self.sdp_role {
                SdpRole::Offer => self.answer_pending = true,
                SdpRole::Answer => self.offer_answer_complete = true,
            }
        } else if self.streams.is_empty() && self.sdp.is_none() {
            // The INVITE had no offer. Ours goes in the 200.
            let offer = self.initial_offer_create(call)?;
            self.enqueue(Output::Accept { sdp: Some(offer) });
            self.answer_pending = true;
        } else if !self.offer_answer_complete && !self.answer_pending {
            let mut answer = self.sdp_create(call, SdpRole::Answer)?;
            self.ice_sdp_update(&mut answer)?;
            self.enqueue(Output::Accept { sdp: Some(answer) });
            self.offer_answer_complete = true;
        } else {
            self.enqueue(Output::Accept { sdp: None });
        }

        Ok(())
    }

    /// The call is connected (the 200 to the INVITE was sent or received).
    pub fn connected(&mut self, calls: &mut Calls) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;
        call.state = CallState::Connected;

        if self.send_offer_when_ready || self.pending_offer_update {
            debug!("Leg {} sends the offer held back during setup", self.id);
            self.send_offer_when_ready = false;
            self.pending_offer_update = false;
            self.send_offer_inner(call)?;
        }
        Ok(())
    }

    /// The peer acknowledged (PRACK) a reliable provisional response.
    pub fn reliable_response_acknowledged(
        &mut self,
        calls: &mut Calls,
    ) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;
        self.alert_countdown_decrement(call);
        Ok(())
    }

    pub(crate) fn send_offer_inner(&mut self, call: &mut Call) -> Result<(), NegotiationError> {
        match call.state.phase() {
            Phase::Setup => {
                if self.send_offer_in_prack {
                    let mut offer = self.sdp_create(call, SdpRole::Offer)?;
                    self.ice_sdp_update(&mut offer)?;
                    self.enqueue(Output::Prack { sdp: Some(offer) });
                    self.answer_pending = true;
                } else {
                    debug!("Leg {} offer waits for the call to connect", self.id);
                    self.send_offer_when_ready = true;
                }
            }
            Phase::Established => {
                let mut offer = self.sdp_create(call, SdpRole::Offer)?;
                self.ice_sdp_update(&mut offer)?;
                self.enqueue(Output::ReInvite { sdp: offer });
                self.answer_pending = true;
            }
            Phase::Unavailable => {
                return Err(NegotiationError::ProtocolViolation(format!(
                    "no offer in call state {:?}",
                    call.state
                )));
            }
        }
        Ok(())
    }

    /// An INVITE without SDP. We make the offer.
    fn offerless(&mut self, call: &mut Call, msg: SipMessage) -> Result<(), NegotiationError> {
        if msg != SipMessage::Invite {
            return Err(NegotiationError::ProtocolViolation(format!(
                "no SDP in {:?}",
                msg
            )));
        }

        match call.state.phase() {
            Phase::Setup => {
                if self.reliable_provisional && self.use_ice() {
                    self.ice_end();
                    let offer = self.initial_offer_create(call)?;
                    self.next_ice_message = SipMessage::ReliableResponse;

                    if let Err(e) = self.ice_start(IceRole::Offerer, &offer) {
                        warn!("Leg {} offers without ICE: {}", self.id, e);
                        let sinfo = self.sinfo_for_peer();
                        self.enqueue(Output::Provisional {
                            code: 180,
                            sdp: Some(offer),
                            reliable: true,
                            sinfo,
                        });
                        self.alert_user(call);
                        self.answer_pending = true;
                    }
                } else if self.config.nat_traversal && self.use_ice() {
                    let offer = self.initial_offer_create(call)?;
                    self.next_ice_message = SipMessage::InviteFinalResponse;

                    if let Err(e) = self.ice_start(IceRole::Gatherer, &offer) {
                        warn!("Leg {} offers without gathering: {}", self.id, e);
                        let mut alert_count = 0;
                        self.send_ringing(call, &mut alert_count);
                        self.answer_ready = true;
                    }
                } else {
                    self.enqueue(Output::Provisional {
                        code: 180,
                        sdp: None,
                        reliable: false,
                        sinfo: None,
                    });
                    self.alert_user(call);
                }
            }

            Phase::Established => {
                let offer = self.sdp_create(call, SdpRole::Offer)?;

                if self.use_ice() {
                    self.next_ice_message = SipMessage::InviteFinalResponse;
                    match self.ice_start(IceRole::Offerer, &offer) {
                        Ok(_) => return Ok(()),
                        Err(e) => warn!("Leg {} re-offers without ICE: {}", self.id, e),
                    }
                }

                self.enqueue(Output::Accept { sdp: Some(offer) });
                self.answer_pending = true;
            }

            Phase::Unavailable => {
                return Err(NegotiationError::ProtocolViolation(format!(
                    "INVITE in call state {:?}",
                    call.state
                )));
            }
        }

        Ok(())
    }

    fn process_offer(
        &mut self,
        call: &mut Call,
        msg: SipMessage,
        sdp: &Sdp,
    ) -> Result<(), NegotiationError> {
        let phase = call.state.phase();
        if phase == Phase::Unavailable {
            return Err(NegotiationError::ProtocolViolation(format!(
                "offer in call state {:?}",
                call.state
            )));
        }

        self.offer_answer_complete = false;
        self.answer_ready = false;

        let outcome = match self.parse(call, sdp, SdpRole::Offer) {
            Ok(v) => v,
            Err(NegotiationError::SecurityInadequate) => {
                self.end_call(call, EndReason::SecurityInadequate, 488);
                return Err(NegotiationError::SecurityInadequate);
            }
            Err(e) => return Err(e),
        };

        match phase {
            Phase::Setup if msg == SipMessage::Invite => self.initial_offer_answer(call, sdp)?,
            Phase::Setup => self.setup_offer_answer(call, msg, sdp, outcome.restart_ice)?,
            _ => self.established_offer_answer(call, msg, sdp, outcome.restart_ice)?,
        }

        if outcome.capabilities_changed {
            self.enqueue(Output::CapabilitiesChanged);
        }

        self.media_server_disconnect(call);
        Ok(())
    }

    /// The offer of an initial INVITE. The answer waits for ICE or for the
    /// user to answer.
    fn initial_offer_answer(&mut self, call: &mut Call, sdp: &Sdp) -> Result<(), NegotiationError> {
        let mut alert_count = 0;
        let mut alerted = false;

        if self.use_ice() {
            let mut offer = sdp.clone();
            self.unsupported_streams_disable(call, &mut offer);
            self.next_ice_message = if self.reliable_provisional {
                SipMessage::ReliableResponse
            } else {
                SipMessage::InviteFinalResponse
            };

            match self.ice_start(IceRole::Answerer, &offer) {
                Err(IceError::InvalidMedia(m)) => {
                    self.end_call(call, EndReason::InvalidMedia, 488);
                    return Err(NegotiationError::UnsupportedMedia(m));
                }
                Ok(IceSupport::Supported) => {
                    self.remote.is_ice = true;
                    if self.remote.sip_version == 3 {
                        alert_count += 1;
                    }
                    if self.is_svrs_device() {
                        alert_count += 1;
                    }
                }
                other => {
                    if let Err(e) = other {
                        debug!("Leg {} answers without ICE: {}", self.id, e);
                    }
                    self.remote.is_ice = false;

                    if self.tunneled {
                        alerted = self.send_ringing(call, &mut alert_count);
                    } else {
                        match self.gather_transports(call) {
                            Ok(()) => alert_count += 1,
                            Err(e) => {
                                warn!("Leg {} can't gather transports: {}", self.id, e);
                                alerted = self.send_ringing(call, &mut alert_count);
                            }
                        }
                    }
                }
            }
        } else {
            alerted = self.send_ringing(call, &mut alert_count);
        }

        if !alerted {
            call.alert_countdown = alert_count;
        }
        Ok(())
    }

    /// An offer in PRACK, a reliable provisional or the 200, during setup.
    fn setup_offer_answer(
        &mut self,
        call: &mut Call,
        msg: SipMessage,
        sdp: &Sdp,
        restart_ice: bool,
    ) -> Result<(), NegotiationError> {
        if restart_ice && self.use_ice() {
            self.next_ice_message = match msg {
                SipMessage::ReliableResponse => SipMessage::Prack,
                SipMessage::Prack => SipMessage::PrackFinalResponse,
                SipMessage::InviteFinalResponse => SipMessage::Ack,
                _ => SipMessage::None,
            };

            let mut offer = sdp.clone();
            self.unsupported_streams_disable(call, &mut offer);
            if self.ice_offer_received(&offer) == IceSupport::Supported {
                self.remote.is_ice = true;
                return Ok(());
            }
            self.ice_end();
        }

        if let Some(s) = self.ice.as_mut() {
            s.sdp_received(sdp);
        }

        let mut answer = self.sdp_create(call, SdpRole::Answer)?;
        self.ice_sdp_update(&mut answer)?;

        match msg {
            SipMessage::Prack => self.enqueue(Output::PrackResponse {
                code: 200,
                sdp: Some(answer),
            }),
            SipMessage::ReliableResponse => self.enqueue(Output::Prack { sdp: Some(answer) }),
            SipMessage::InviteFinalResponse => self.enqueue(Output::Ack { sdp: Some(answer) }),
            m => {
                return Err(NegotiationError::ProtocolViolation(format!(
                    "can't answer offer in {:?}",
                    m
                )));
            }
        }

        self.offer_answer_complete = true;
        Ok(())
    }

    /// A re-INVITE or UPDATE offer, or an offer in the 200 to our offerless
    /// re-INVITE.
    fn established_offer_answer(
        &mut self,
        call: &mut Call,
        msg: SipMessage,
        sdp: &Sdp,
        restart_ice: bool,
    ) -> Result<(), NegotiationError> {
        let mut send_now = true;

        if restart_ice && self.use_ice() {
            self.next_ice_message = match msg {
                SipMessage::Invite => SipMessage::InviteFinalResponse,
                SipMessage::InviteFinalResponse => SipMessage::Ack,
                _ => SipMessage::None,
            };

            let mut offer = sdp.clone();
            self.unsupported_streams_disable(call, &mut offer);
            if self.ice_offer_received(&offer) == IceSupport::Supported {
                self.remote.is_ice = true;
                send_now = false;
            } else {
                self.ice_attributes.clear();
                self.remote.is_ice = false;
                match self.gather_transports(call) {
                    Ok(()) => send_now = false,
                    Err(e) => warn!("Leg {} answers without gathering: {}", self.id, e),
                }
            }
        }

        if send_now {
            self.media_update(false);

            let mut answer = self.sdp_create(call, SdpRole::Answer)?;
            self.ice_sdp_update(&mut answer)?;

            match msg {
                SipMessage::Invite => self.enqueue(Output::Accept { sdp: Some(answer) }),
                SipMessage::Update => self.enqueue(Output::UpdateResponse { sdp: answer }),
                SipMessage::InviteFinalResponse => self.enqueue(Output::Ack { sdp: Some(answer) }),
                m => {
                    return Err(NegotiationError::ProtocolViolation(format!(
                        "can't answer offer in {:?}",
                        m
                    )));
                }
            }
            self.offer_answer_complete = true;
        }

        Ok(())
    }

    /// Hand a remote offer to ICE, starting an answerer if none runs.
    fn ice_offer_received(&mut self, sdp: &Sdp) -> IceSupport {
        if let Some(s) = self.ice.as_mut() {
            return s.sdp_received(sdp);
        }
        match self.ice_start(IceRole::Answerer, sdp) {
            Ok(v) => v,
            Err(e) => {
                debug!("Leg {} no ICE for offer: {}", self.id, e);
                IceSupport::NotSupported
            }
        }
    }

    fn process_answer(
        &mut self,
        call: &mut Call,
        msg: SipMessage,
        sdp: &Sdp,
    ) -> Result<(), NegotiationError> {
        if !self.answer_pending {
            debug!("Leg {} answer in {:?} without an offer out", self.id, msg);
            return Err(NegotiationError::UnexpectedAnswer);
        }
        self.answer_pending = false;

        let phase = call.state.phase();
        if phase == Phase::Unavailable {
            self.reoffer_to_svrs = false;
            return Err(NegotiationError::ProtocolViolation(format!(
                "answer in call state {:?}",
                call.state
            )));
        }

        // The transaction is acknowledged even when the answer is unusable.
        // Media stays on the streams of the last good negotiation.
        let previous = self.streams.clone();
        let outcome = match self.parse(call, sdp, SdpRole::Answer) {
            Ok(v) => v,
            Err(NegotiationError::SecurityInadequate) if phase == Phase::Setup => {
                self.end_call(call, EndReason::SecurityInadequate, 488);
                return Err(NegotiationError::SecurityInadequate);
            }
            Err(e) => {
                warn!("Leg {} ignores unusable answer: {}", self.id, e);
                self.streams = previous;
                self.local_streams_from_remote_streams_update(call);
                ParseOutcome::default()
            }
        };
        let support = self.answer_ice(sdp);

        if phase == Phase::Established
            && support != IceSupport::Supported
            && self
                .ice
                .as_ref()
                .map(|s| s.state() != IceState::Complete)
                .unwrap_or(false)
        {
            self.default_transports_apply(call)?;
            self.ice_end();
        }

        let nominating = self
            .ice
            .as_ref()
            .map(|s| s.state() == IceState::Nominating)
            .unwrap_or(false);
        if !nominating {
            call.hold_complete(true);
            self.media_update(true);
        }

        match (phase, msg) {
            (Phase::Setup, SipMessage::Prack) => self.enqueue(Output::PrackResponse {
                code: 200,
                sdp: None,
            }),
            (Phase::Setup, SipMessage::ReliableResponse) => {
                self.enqueue(Output::Prack { sdp: None })
            }
            (_, SipMessage::InviteFinalResponse) => self.enqueue(Output::Ack { sdp: None }),
            (_, SipMessage::PrackFinalResponse) | (_, SipMessage::Ack) => {}
            (_, m) => debug!("Leg {} answer in {:?}", self.id, m),
        }

        self.offer_answer_complete = true;

        if outcome.capabilities_changed {
            self.enqueue(Output::CapabilitiesChanged);
        }

        if self.reoffer_to_svrs && self.is_svrs_device() {
            self.reoffer_to_svrs = false;
            debug!("Leg {} offers again to SVRS peer", self.id);
            match phase {
                // Nominations end with a new offer of their own.
                _ if nominating => {}
                Phase::Established => self.send_offer_inner(call)?,
                _ => self.send_offer_when_ready = true,
            }
        }
        Ok(())
    }

    /// Hand an answer to our ICE offer to the session.
    fn answer_ice(&mut self, sdp: &Sdp) -> IceSupport {
        let Some(session) = self.ice.as_mut() else {
            return IceSupport::Unknown;
        };

        let support = session.sdp_received(sdp);
        if support == IceSupport::Supported {
            self.remote.is_ice = true;

            // Lines the answer rejected stay rejected in our offer.
            if let Some(offer) = self.sdp.as_mut() {
                for (o, a) in offer.media_lines.iter_mut().zip(&sdp.media_lines) {
                    if a.is_disabled() {
                        o.port = 0;
                    }
                }
            }

            if session.state() == IceState::GatheringComplete {
                if let Err(e) = session.proceed() {
                    warn!("Leg {} ICE can't proceed: {}", self.id, e);
                }
            }
        }
        support
    }

    /// A media server redirected us to leave a message.
    fn media_server_disconnect(&mut self, call: &mut Call) {
        let has_number = call
            .video_mail_number
            .as_ref()
            .map(|n| !n.is_empty())
            .unwrap_or(false);
        if call.leave_message && has_number {
            self.end_call(call, EndReason::LeaveMessage, 603);
        }
    }
}
