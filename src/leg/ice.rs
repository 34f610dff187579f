use crate::call::{Call, Calls, EndReason, LegIceState, Phase};
use crate::ice::{IceError, IceRole, IceState, IceSupport};
use crate::sdp::Sdp;
use crate::NegotiationError;

use super::{CallLeg, Output, SdpRole, SipMessage};

impl CallLeg {
    /// ICE gathering finished. Send what was waiting for the candidates.
    pub fn ice_gathering_complete(&mut self, calls: &mut Calls) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;

        let Some(role) = self.ice.as_ref().map(|s| s.role()) else {
            debug!("Leg {} gathering complete without ICE session", self.id);
            return Ok(());
        };
        debug!("Leg {} ICE gathering complete as {:?}", self.id, role);

        match role {
            IceRole::Answerer => self.gathered_answerer(call),
            IceRole::Offerer => self.gathered_offerer(call),
            IceRole::Gatherer => self.gathered_gatherer(call),
        }
    }

    /// ICE nominations finished, successfully or not.
    pub fn ice_nominations_complete(
        &mut self,
        calls: &mut Calls,
        succeeded: bool,
    ) -> Result<(), NegotiationError> {
        let call = calls.call_mut(self.call_id)?;

        let Some(session) = self.ice.as_mut() else {
            debug!("Leg {} nominations complete without ICE session", self.id);
            return Ok(());
        };
        session.complete();
        let role = session.role();

        info!(
            "Leg {} ICE nominations {}",
            self.id,
            if succeeded { "succeeded" } else { "failed" }
        );
        let state = if succeeded {
            LegIceState::Succeeded
        } else {
            LegIceState::Failed
        };
        call.set_leg_ice(self.id, state);

        match role {
            IceRole::Answerer | IceRole::Gatherer => {
                if succeeded {
                    self.ice_nominations_apply(call)?;
                } else {
                    self.default_transports_apply(call)?;
                }
                self.media_update(false);
            }

            IceRole::Offerer => match call.state.phase() {
                Phase::Setup => {
                    if succeeded {
                        self.ice_nominations_apply(call)?;
                        self.media_update(false);
                        self.send_offer_inner(call)?;
                    } else if self.remote.sip_version < 4 && call.all_legs_failed_ice() {
                        self.end_call(call, EndReason::Unreachable, 500);
                    } else {
                        self.default_transports_apply(call)?;
                        self.ice_end();
                        self.media_update(false);
                    }
                }
                Phase::Established => {
                    if succeeded {
                        self.ice_nominations_apply(call)?;
                    } else {
                        self.default_transports_apply(call)?;
                        self.ice_end();
                    }
                    self.media_update(true);
                    self.send_offer_inner(call)?;
                }
                Phase::Unavailable => {
                    debug!("Leg {} ignores nominations, call unavailable", self.id);
                }
            },
        }

        Ok(())
    }

    /// Start a new ICE session, ending any running one.
    pub(crate) fn ice_start(&mut self, role: IceRole, sdp: &Sdp) -> Result<IceSupport, IceError> {
        self.ice_end();

        let agent = self
            .ice_agent
            .as_ref()
            .ok_or_else(|| IceError::Start("no ICE agent".into()))?;
        let (session, support) = agent.start_session(role, sdp)?;

        debug!("Leg {} ICE {:?} session started, peer {:?}", self.id, role, support);
        self.ice = Some(session);
        Ok(support)
    }

    pub(crate) fn ice_end(&mut self) {
        if let Some(mut session) = self.ice.take() {
            debug!("Leg {} ICE {:?} session ended", self.id, session.role());
            session.end();
        }
    }

    /// Candidates and credentials into an outgoing SDP, while ICE runs.
    pub(crate) fn ice_sdp_update(&mut self, sdp: &mut Sdp) -> Result<(), IceError> {
        let Some(session) = self.ice.as_mut() else {
            return Ok(());
        };
        if matches!(session.state(), IceState::Complete | IceState::Failed) {
            return Ok(());
        }
        session.sdp_update(sdp)?;
        self.sdp = Some(sdp.clone());
        Ok(())
    }

    /// Gather transports for a peer that doesn't do ICE, behind a NAT.
    pub(crate) fn gather_transports(&mut self, call: &mut Call) -> Result<(), NegotiationError> {
        self.ice_end();
        let answer = self.sdp_create(call, SdpRole::Answer)?;
        self.ice_start(IceRole::Gatherer, &answer)?;
        Ok(())
    }

    /// Use the gathered default transports for media.
    pub(crate) fn default_transports_apply(&mut self, call: &mut Call) -> Result<(), IceError> {
        let local = self
            .ice
            .as_ref()
            .ok_or_else(|| IceError::NotReady("no ICE session".into()))?
            .local_addresses()?;

        call.default_addrs = local.clone();
        self.enqueue(Output::Transports {
            nominated: false,
            transports: local,
        });
        Ok(())
    }

    /// Use the nominated pairs for media.
    fn ice_nominations_apply(&mut self, call: &mut Call) -> Result<(), IceError> {
        let n = self
            .ice
            .as_ref()
            .ok_or_else(|| IceError::NotReady("no ICE session".into()))?
            .nominations()?;

        call.default_addrs = n.local.clone();
        self.enqueue(Output::Transports {
            nominated: true,
            transports: n.local,
        });

        for stream in self.streams.iter_mut().filter(|s| s.is_enabled()) {
            if let Some(Some(t)) = n.remote.get(stream.kind) {
                stream.rtp_addr = t.rtp;
                stream.rtcp_addr = t.rtcp;
            }
        }

        self.ice_attributes = n.attributes;
        Ok(())
    }

    /// Our SDP with gathered defaults and candidates.
    fn gathered_sdp(&mut self, call: &mut Call, role: SdpRole) -> Result<Sdp, NegotiationError> {
        let local = self
            .ice
            .as_ref()
            .ok_or_else(|| IceError::NotReady("no ICE session".into()))?
            .local_addresses()?;
        call.default_addrs = local;

        let mut sdp = self.sdp_create(call, role)?;
        self.ice_sdp_update(&mut sdp)?;
        Ok(sdp)
    }

    fn ice_proceed(&mut self) -> Result<(), IceError> {
        match self.ice.as_mut() {
            Some(s) => s.proceed(),
            None => Ok(()),
        }
    }

    fn gathered_answerer(&mut self, call: &mut Call) -> Result<(), NegotiationError> {
        let answer = match self.gathered_sdp(call, SdpRole::Answer) {
            Ok(v) => v,
            Err(e) => {
                warn!("Leg {} ICE answer failed: {}", self.id, e);
                self.ice_end();
                if call.state.phase() == Phase::Setup {
                    let mut alert_count = 0;
                    if !self.send_ringing(call, &mut alert_count) {
                        self.alert_countdown_decrement(call);
                    }
                }
                return Ok(());
            }
        };

        match call.state.phase() {
            Phase::Setup => {
                if self.next_ice_message == SipMessage::InviteFinalResponse {
                    self.enqueue(Output::Provisional {
                        code: 180,
                        sdp: None,
                        reliable: false,
                        sinfo: None,
                    });
                    self.alert_user(call);
                    self.answer_ready = true;
                } else {
                    match self.next_ice_message {
                        SipMessage::PrackFinalResponse => self.enqueue(Output::PrackResponse {
                            code: 200,
                            sdp: Some(answer),
                        }),
                        SipMessage::Prack => self.enqueue(Output::Prack { sdp: Some(answer) }),
                        SipMessage::ReliableResponse => {
                            let sinfo = self.sinfo_for_peer();
                            self.enqueue(Output::Provisional {
                                code: 180,
                                sdp: Some(answer),
                                reliable: true,
                                sinfo,
                            });
                            if self.remote.sip_version >= 4 {
                                self.alert_user(call);
                            } else if self.remote.sip_version == 3 {
                                self.pending_offer_update = true;
                            }
                        }
                        SipMessage::Ack => self.enqueue(Output::Ack { sdp: Some(answer) }),
                        m => warn!("Leg {} can't carry an answer in {:?}", self.id, m),
                    }
                    self.offer_answer_complete = true;
                }
            }
            Phase::Established => {
                match self.next_ice_message {
                    SipMessage::Ack => self.enqueue(Output::Ack { sdp: Some(answer) }),
                    _ => self.enqueue(Output::Accept { sdp: Some(answer) }),
                }
                self.offer_answer_complete = true;
            }
            Phase::Unavailable => return Ok(()),
        }

        self.ice_proceed()?;
        Ok(())
    }

    fn gathered_offerer(&mut self, call: &mut Call) -> Result<(), NegotiationError> {
        let offer = self.gathered_sdp(call, SdpRole::Offer)?;

        match call.state.phase() {
            Phase::Setup => match self.next_ice_message {
                SipMessage::Invite => {
                    self.enqueue(Output::Invite { sdp: offer });
                    self.answer_pending = true;
                }
                SipMessage::ReliableResponse => {
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
                m => warn!("Leg {} can't carry an offer in {:?}", self.id, m),
            },
            Phase::Established => {
                match self.next_ice_message {
                    SipMessage::Invite => self.enqueue(Output::ReInvite { sdp: offer }),
                    _ => self.enqueue(Output::Accept { sdp: Some(offer) }),
                }
                self.answer_pending = true;
            }
            Phase::Unavailable => {}
        }

        Ok(())
    }

    fn gathered_gatherer(&mut self, call: &mut Call) -> Result<(), NegotiationError> {
        self.default_transports_apply(call)?;
        let role = self.sdp_role;
        let sdp = self.gathered_sdp(call, role)?;
        self.media_update(true);
        self.ice_end();

        match call.state.phase() {
            Phase::Setup => match self.next_ice_message {
                SipMessage::ReliableResponse => {
                    let sinfo = self.sinfo_for_peer();
                    self.enqueue(Output::Provisional {
                        code: 180,
                        sdp: Some(sdp),
                        reliable: true,
                        sinfo,
                    });
                    self.alert_countdown_decrement(call);
                }
                _ => {
                    self.enqueue(Output::Provisional {
                        code: 180,
                        sdp: None,
                        reliable: false,
                        sinfo: None,
                    });
                    self.alert_user(call);
                    self.answer_ready = true;
                }
            },
            Phase::Established => self.enqueue(Output::Accept { sdp: Some(sdp) }),
            Phase::Unavailable => return Ok(()),
        }

        if role == SdpRole::Offer {
            self.answer_pending = true;
        } else if !self.answer_ready {
            self.offer_answer_complete = true;
        }

        Ok(())
    }
}
