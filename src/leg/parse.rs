use std::collections::HashSet;
use std::net::SocketAddr;

use crate::call::{Call, EndReason, McuType, VcoType};
use crate::crypto::SdesKey;
use crate::direction::Direction;
use crate::format::{static_payload, Codec, CodecParams, CodecPreferences};
use crate::format::{PayloadMapping, PreferredMedia, RtcpFeedback};
use crate::id::Pt;
use crate::sdp::{display_size, FeedbackType, MediaLine, Sdp, SessionAttribute};
use crate::stream::{MediaKind, PayloadEntry, SdpStream, DEFAULT_PTIME};
use crate::util::Pii;
use crate::NegotiationError;

use super::{CallLeg, SdpRole, WEBRTC_SIP_VERSION};

/// What parsing a remote SDP found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ParseOutcome {
    /// ICE credentials appeared or changed.
    pub restart_ice: bool,
    /// Text, VCO or system info of the peer changed.
    pub capabilities_changed: bool,
}

/// Preference lists used to match payloads of one m-line.
struct Prefs<'a> {
    inbound: &'a [PreferredMedia],
    outbound: &'a [PreferredMedia],
    features: &'a [PreferredMedia],
}

impl<'a> Prefs<'a> {
    const NONE: Prefs<'static> = Prefs {
        inbound: &[],
        outbound: &[],
        features: &[],
    };

    fn for_kind(codecs: &'a CodecPreferences, kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Prefs {
                inbound: &codecs.audio,
                outbound: &codecs.audio,
                features: &codecs.audio_features,
            },
            MediaKind::Video => Prefs {
                inbound: &codecs.video_playback,
                outbound: &codecs.video_record,
                features: &[],
            },
            MediaKind::Text => Prefs {
                inbound: &codecs.text_playback,
                outbound: &codecs.text_record,
                features: &[],
            },
            MediaKind::Unknown => Prefs::NONE,
        }
    }

    /// Inbound, then features, unless the peer only sends. Then outbound,
    /// then features, unless the peer only receives.
    fn find(&self, encoding: &str, pt: Pt, offered: Direction) -> Option<&'a PreferredMedia> {
        let mut found = None;
        if offered != Direction::SendOnly {
            found = CodecPreferences::find(self.inbound, encoding, pt)
                .or_else(|| CodecPreferences::find(self.features, encoding, pt));
        }
        if found.is_none() && offered != Direction::RecvOnly {
            found = CodecPreferences::find(self.outbound, encoding, pt)
                .or_else(|| CodecPreferences::find(self.features, encoding, pt));
        }
        found
    }
}

impl CallLeg {
    /// Rebuild the stream model from a received SDP.
    pub(crate) fn parse(
        &mut self,
        call: &mut Call,
        sdp: &Sdp,
        role: SdpRole,
    ) -> Result<ParseOutcome, NegotiationError> {
        let mut outcome = ParseOutcome::default();

        let remote_ip = match sdp.connection {
            Some(c) if !c.is_unspecified() => Some(c),
            _ => sdp.origin.address,
        };
        let Some(remote_ip) = remote_ip else {
            self.end_call(call, EndReason::NotAcceptable, 488);
            return Err(NegotiationError::ProtocolViolation(
                "no remote address in SDP".into(),
            ));
        };

        self.call_bandwidth = sdp.bandwidth_kbps().unwrap_or(0);

        let mut sinfo_present = false;
        for a in &sdp.attrs {
            match a {
                SessionAttribute::SInfo(v) => {
                    sinfo_present = true;
                    if self.remote.sinfo.as_ref() != Some(v) {
                        debug!("Remote system info changed");
                        self.remote.sinfo = Some(v.clone());
                        outcome.capabilities_changed = true;
                    }
                    self.remote.sinfo_received = true;
                }
                SessionAttribute::Mail(v) => {
                    if !self.config.media_server {
                        debug!("Leave message at {}", Pii(v));
                        call.leave_message = true;
                        call.video_mail_number = Some(v.clone());
                    }
                }
                SessionAttribute::GroupChat(v) => {
                    call.routing_address = v.clone();
                    call.mcu = Some(McuType::GroupChat);
                    call.conference_id = conference_id(v);
                }
                SessionAttribute::DisplaySize(v) => match display_size(v) {
                    Ok((w, h)) if w > 0 && h > 0 => self.remote.display_size = Some((w, h)),
                    _ => debug!("Ignore display size: {}", v),
                },
                _ => {}
            }
        }

        let session_setup = sdp.attrs.iter().find_map(|a| match a {
            SessionAttribute::Setup(s) => Some(*s),
            _ => None,
        });

        let codecs = self.config.codecs.clone();
        let include_encryption = self.include_encryption_attributes(call);
        let encryption_required = self.encryption_required(call);
        let negotiating_local_hold = call.substate.negotiating_local_hold;
        let max_send = self.config.max_send_kbps();

        let mut first_of_kind = HashSet::new();
        let mut all_held = true;
        let mut any_enabled = false;
        let mut video_present = false;
        let mut audio_supported = false;
        let mut text_supported = false;
        let mut rtx_links = vec![];
        let mut streams = Vec::with_capacity(sdp.media_lines.len());

        for (idx, m) in sdp.media_lines.iter().enumerate() {
            let kind = MediaKind::from(&m.typ);
            let mut stream = SdpStream::new(
                kind,
                &m.typ.to_string(),
                m.proto.clone(),
                &m.proto.to_string(),
            );

            if m.is_disabled() || !kind.is_supported() {
                trace!("Skip m-line {} {} port {}", idx, stream.type_string, m.port);
                stream.ice_ufrag = sdp.ice_ufrag().unwrap_or_default().to_string();
                stream.ice_pwd = sdp.ice_pwd().unwrap_or_default().to_string();
                streams.push(stream);
                continue;
            }

            any_enabled = true;
            match kind {
                MediaKind::Video => video_present = true,
                MediaKind::Audio => audio_supported = true,
                MediaKind::Text => text_supported = true,
                MediaKind::Unknown => {}
            }

            stream.ptime = m
                .ptime()
                .unwrap_or(DEFAULT_PTIME)
                .min(self.config.max_ptime);
            stream.offer_direction = m.direction().unwrap_or_default();

            let mut bandwidth = m.bandwidth_kbps().unwrap_or(if self.call_bandwidth == 0 {
                max_send
            } else {
                self.call_bandwidth
            });
            if !negotiating_local_hold {
                bandwidth = bandwidth.min(max_send);
                match stream.offer_direction {
                    Direction::RecvOnly | Direction::SendRecv => all_held = false,
                    Direction::Inactive => bandwidth = 0,
                    Direction::SendOnly => {}
                }
            }

            let ip = m.connection.unwrap_or(remote_ip);
            stream.rtp_addr = SocketAddr::new(ip, m.port);
            stream.rtcp_addr = match m.rtcp() {
                Some(r) => SocketAddr::new(r.address.unwrap_or(ip), r.port),
                None => SocketAddr::new(ip, m.port.saturating_add(1)),
            };

            // Only the first line of a kind is matched against our codecs.
            let prefs = if first_of_kind.insert(kind) {
                Prefs::for_kind(&codecs, kind)
            } else {
                Prefs::NONE
            };

            stream.default_pt = m.pts.first().copied();

            for &pt in &m.pts {
                let (encoding, clock_rate) = match m.rtpmap(pt) {
                    Some(r) => (r.encoding.clone(), r.clock_rate),
                    None => match static_payload(pt) {
                        Some(s) => (s.encoding.to_string(), s.clock_rate),
                        None => {
                            debug!("Drop payload {} on m-line {}, no rtpmap", pt, idx);
                            continue;
                        }
                    },
                };

                if kind == MediaKind::Video && Codec::from_encoding(&encoding).is_rtx() {
                    let params = CodecParams::decode(Codec::Rtx, m.fmtp(pt));
                    if let Some(apt) = params.apt {
                        rtx_links.push((idx, pt, apt));
                    }
                    continue;
                }

                let Some(pref) = prefs.find(&encoding, pt, stream.offer_direction) else {
                    trace!("Drop payload {} {} on m-line {}", pt, encoding, idx);
                    continue;
                };

                let codec = pref.codec;
                let params = CodecParams::decode(codec, m.fmtp(pt));
                let rtcp_fb = if kind == MediaKind::Video {
                    self.rtcp_feedback(m, pt, role)
                } else {
                    vec![]
                };

                let bandwidth = match static_payload(pt) {
                    Some(s) => s.bandwidth_for(m.bandwidth_kbps(), bandwidth),
                    None => bandwidth,
                };

                trace!(
                    "m-line {} payload {} {} {:?} {:?}",
                    idx,
                    pt,
                    codec,
                    params.profile,
                    params.packetization
                );

                register_mapping(call, kind, pt, codec, clock_rate, &params, &rtcp_fb);

                stream.payloads.push(PayloadEntry {
                    pt,
                    encoding: pref.encoding.clone(),
                    codec,
                    clock_rate,
                    bandwidth,
                    packetization: params.packetization,
                    profile: params.profile,
                    rtcp_fb,
                    rtx_pt: None,
                    fmtp: m.fmtp(pt).to_vec(),
                    feature_pts: vec![],
                });
            }

            stream.ice_ufrag = m
                .ice_ufrag()
                .or(sdp.ice_ufrag())
                .unwrap_or_default()
                .to_string();
            stream.ice_pwd = m.ice_pwd().or(sdp.ice_pwd()).unwrap_or_default().to_string();

            if role == SdpRole::Offer && self.config.use_ice {
                let restart = match self.streams.get(idx) {
                    None => stream.has_ice(),
                    Some(old) => {
                        (self.remote.is_ice || stream.has_ice())
                            && (old.ice_ufrag != stream.ice_ufrag || old.ice_pwd != stream.ice_pwd)
                    }
                };
                if restart {
                    debug!(
                        "ICE credentials changed on m-line {}: ufrag {}",
                        idx,
                        Pii(&stream.ice_ufrag)
                    );
                    outcome.restart_ice = true;
                }
            }

            stream.sdes_keys = m
                .crypto()
                .filter_map(|c| match SdesKey::from_crypto(c) {
                    Ok(k) => Some(k),
                    Err(e) => {
                        debug!("Ignore crypto on m-line {}: {}", idx, e);
                        None
                    }
                })
                .collect();

            if !self.config.disable_dtls {
                if let Some(fp) = m.fingerprint().or(sdp.fingerprint()) {
                    let setup = m.setup().or(session_setup);
                    if fp.is_usable() && (stream.proto.is_savp() || include_encryption) {
                        if let Some(ctx) = &self.dtls {
                            ctx.set_remote(fp.clone(), setup);
                        }
                    }
                    stream.fingerprint = Some(fp.clone());
                    stream.setup = setup;
                }
            }

            let has_fingerprint = stream
                .fingerprint
                .as_ref()
                .map(|f| f.is_usable())
                .unwrap_or(false);
            if encryption_required && stream.sdes_keys.is_empty() && !has_fingerprint {
                info!("No encryption offered on m-line {} {}", idx, kind);
                return Err(NegotiationError::SecurityInadequate);
            }

            streams.push(stream);
        }

        if self.remote.sip_version < WEBRTC_SIP_VERSION {
            for (idx, rtx, apt) in rtx_links {
                if let Some(p) = streams[idx].payloads.iter_mut().find(|p| p.pt == apt) {
                    p.rtx_pt = Some(rtx);
                    if let Some(mapping) = call.payloads.get_mut(MediaKind::Video, apt) {
                        mapping.rtx_pt.get_or_insert(rtx);
                    }
                }
            }
        }

        // Replace by index, keeping slots in step with the peer's m-lines.
        let count = streams.len();
        for (idx, s) in streams.into_iter().enumerate() {
            if let Some(old) = self.streams.get_mut(idx) {
                *old = s;
            } else {
                self.streams.push(s);
            }
        }
        self.streams.truncate(count);

        self.local_streams_from_remote_streams_update(call);

        if role == SdpRole::Offer {
            call.set_remote_hold(any_enabled && all_held);
            call.hold_complete(false);
        }

        if !call.bridged && !video_present {
            info!("No video in SDP, call {} is not viable", call.id());
            call.log_call = false;
            return Err(NegotiationError::NotViable("no video media line".into()));
        }

        if text_supported != call.remote_text_supported {
            call.remote_text_supported = text_supported;
            outcome.capabilities_changed = true;
        }

        if !sinfo_present
            && audio_supported
            && !self.remote.sinfo_received
            && call.remote_vco.is_none()
        {
            debug!("Peer without system info, default to one line VCO");
            call.remote_vco = Some(VcoType::OneLine);
            outcome.capabilities_changed = true;
        }

        Ok(outcome)
    }

    /// Feedback on a video payload we are willing to use with this peer.
    fn rtcp_feedback(&mut self, m: &MediaLine, pt: Pt, role: SdpRole) -> Vec<RtcpFeedback> {
        let svrs = self.is_svrs_device();
        let tmmbr = self.config.tmmbr.allows(svrs) && !self.config.legacy_auto_speed;
        let nack = self.config.nack_rtx.allows(svrs);
        let offered = role == SdpRole::Offer;

        let mut fb = vec![];
        for (p, t) in m.rtcp_fb() {
            if p.is_some() && p != Some(pt) {
                continue;
            }
            let v = match t {
                FeedbackType::CcmTmmbr if tmmbr => {
                    self.rtcp_offered.tmmbr = offered;
                    RtcpFeedback::Tmmbr
                }
                FeedbackType::CcmFir if self.config.fir => {
                    self.rtcp_offered.fir = offered;
                    RtcpFeedback::Fir
                }
                FeedbackType::NackPli if self.config.pli => {
                    self.rtcp_offered.pli = offered;
                    RtcpFeedback::Pli
                }
                FeedbackType::Nack if nack => {
                    self.rtcp_offered.nack = offered;
                    RtcpFeedback::NackRtx
                }
                _ => continue,
            };
            if !fb.contains(&v) {
                fb.push(v);
            }
        }
        fb
    }
}

/// Bind a payload number the peer used, unless it or the codec is bound.
fn register_mapping(
    call: &mut Call,
    kind: MediaKind,
    pt: Pt,
    codec: Codec,
    clock_rate: u32,
    params: &CodecParams,
    rtcp_fb: &[RtcpFeedback],
) {
    if call.payloads.is_used(kind, pt) {
        return;
    }
    let bound = match kind {
        MediaKind::Video => false,
        MediaKind::Audio => call
            .payloads
            .find_audio(codec, params.packetization, clock_rate)
            .is_some(),
        MediaKind::Text => call.payloads.find_text(codec, params.packetization).is_some(),
        MediaKind::Unknown => true,
    };
    if bound {
        return;
    }

    let mut mapping = PayloadMapping::new(pt, codec, clock_rate);
    mapping.packetization = params.packetization;
    mapping.profile = params.profile;
    mapping.rtcp_fb = rtcp_fb.to_vec();
    call.payloads.insert(kind, mapping);
}

/// Conference id carried in a group chat URI.
fn conference_id(uri: &str) -> Option<String> {
    let id: String = uri.chars().skip(4).take(44).collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
