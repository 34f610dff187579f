use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use crate::call::Call;
use crate::config::{SecureCallMode, SignalingSupport};
use crate::direction::{decide, Direction, DirectionInputs};
use crate::format::{Codec, CodecPreferences, Packetization, PayloadMapping, PreferredMedia};
use crate::format::{ProfileSpec, RtcpFeedback, VideoProfile, DUMMY_PT};
use crate::id::Pt;
use crate::sdp::{Bandwidth, FeedbackType, FormatParam, MediaAttribute, MediaLine, MediaType};
use crate::sdp::{Origin, Proto, Rtcp, RtpMap, Sdp, SessionAttribute};
use crate::stream::{MediaKind, PayloadEntry, SdpStream, NO_ADDR};
use crate::util::Pii;
use crate::NegotiationError;

use super::{CallLeg, SdpRole};

/// Where media goes when a peer must not see that we hold.
const BLACK_HOLE: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// H.264 level 3.1.
const H264_LEVEL: u8 = 0x1f;

const RTX_CLOCK_RATE: u32 = 90_000;

impl CallLeg {
    /// Generate our SDP from the stream model.
    ///
    /// Without any streams the last generated SDP is reused.
    pub(crate) fn sdp_create(
        &mut self,
        call: &mut Call,
        role: SdpRole,
    ) -> Result<Sdp, NegotiationError> {
        if self.streams.is_empty() {
            return self.sdp.clone().ok_or(NegotiationError::NoSdpAvailable);
        }

        let public_ip = self.public_ip(call)?;
        self.sdp_version += 1;

        let mut sdp = self.header(call, public_ip);

        let mut chosen = HashSet::new();
        let mut enabled_index = 0;
        for idx in 0..self.streams.len() {
            let line = self.media_line_create(
                call,
                role,
                idx,
                public_ip,
                &mut chosen,
                &mut enabled_index,
            );
            sdp.media_lines.push(line);
        }

        debug!(
            "Created {:?} version {} with {} m-lines at {}",
            role,
            self.sdp_version,
            sdp.media_lines.len(),
            Pii(public_ip)
        );

        self.sdp = Some(sdp.clone());
        self.sdp_role = role;
        Ok(sdp)
    }

    /// Our first offer, with one stream per media kind we support.
    pub(crate) fn initial_offer_create(&mut self, call: &mut Call) -> Result<Sdp, NegotiationError> {
        let proto = if self.config.secure_call_mode == SecureCallMode::Required
            && self.include_encryption_attributes(call)
        {
            Proto::Savp
        } else {
            Proto::Avp
        };

        self.streams = MediaKind::SUPPORTED
            .iter()
            .filter(|k| call.support(**k).supported)
            .map(|k| SdpStream::new(*k, &k.to_string(), proto.clone(), &proto.to_string()))
            .collect();

        // Feedback kept for our own devices is missing until we know the
        // peer, so those get a second offer once the answer is in.
        let svrs_only = self.config.tmmbr == SignalingSupport::SorensonOnly
            || self.config.nack_rtx == SignalingSupport::SorensonOnly;
        self.reoffer_to_svrs = svrs_only && call.support(MediaKind::Video).supported;

        self.encryption_attributes_add(call);
        self.sdp_create(call, SdpRole::Offer)
    }

    /// Zero the port of every m-line we won't answer, before the offer
    /// is handed to ICE.
    pub(crate) fn unsupported_streams_disable(&mut self, call: &Call, sdp: &mut Sdp) {
        let codecs = self.config.codecs.clone();
        let mut chosen = HashSet::new();

        for (idx, line) in sdp.media_lines.iter_mut().enumerate() {
            let Some(stream) = self.streams.get_mut(idx) else {
                continue;
            };
            let kind = stream.kind;
            let keep = kind.is_supported()
                && call.support(kind).supported
                && !chosen.contains(&kind)
                && {
                    let (prefs, features) = best_media_prefs(&codecs, kind);
                    stream.best_media(&prefs, &features).is_some()
                };

            if keep {
                chosen.insert(kind);
            } else if line.port != 0 {
                debug!("Disable m-line {} {} before ICE", idx, kind);
                line.port = 0;
            }
        }
    }

    fn public_ip(&self, call: &Call) -> Result<IpAddr, NegotiationError> {
        match self.config.public_ipv4 {
            Some(ip) if !call.bridged => Ok(IpAddr::V4(ip)),
            _ => call.local_ip.ok_or(NegotiationError::NoLocalAddress),
        }
    }

    fn header(&self, call: &Call, public_ip: IpAddr) -> Sdp {
        let mut sdp = Sdp::new(Origin {
            username: "-".into(),
            session_id: self.session_id,
            version: self.sdp_version,
            address: Some(public_ip),
        });
        sdp.connection = Some(public_ip);

        let bw = call
            .channels(MediaKind::Video)
            .playback
            .map(|p| p.flow_control_rate / 1000)
            .unwrap_or_else(|| self.config.max_recv_kbps());
        sdp.bw.push(Bandwidth::as_kbps(bw));

        sdp.attrs.extend(self.ice_attributes.session.iter().cloned());

        if self.config.media_server {
            let dial = call.dial_string.strip_prefix('+').unwrap_or(&call.dial_string);
            if !dial.is_empty() {
                sdp.attrs.push(SessionAttribute::Mail(dial.to_string()));
            }
        } else if !call.bridged {
            if let Some(s) = &self.config.system_info {
                sdp.attrs.push(SessionAttribute::SInfo(s.clone()));
            }
            if let Some((w, h)) = self.config.display_size {
                sdp.attrs
                    .push(SessionAttribute::DisplaySize(format!("{}:{}", w, h)));
            }
        }

        sdp
    }

    fn media_line_create(
        &mut self,
        call: &mut Call,
        role: SdpRole,
        idx: usize,
        public_ip: IpAddr,
        chosen: &mut HashSet<MediaKind>,
        enabled_index: &mut usize,
    ) -> MediaLine {
        let codecs = self.config.codecs.clone();
        let kind = self.streams[idx].kind;
        let support = call.support(kind);

        let mut inbound = support.inbound;
        let mut outbound = support.outbound;
        if kind == MediaKind::Video && !support.active {
            inbound = false;
            outbound = false;
        }
        let mut record_privacy_allowed = true;
        if kind == MediaKind::Audio && call.bridged {
            inbound = true;
            outbound = true;
            record_privacy_allowed = false;
        }

        let first = kind.is_supported() && support.supported && !chosen.contains(&kind);
        let best = if first {
            let (prefs, features) = best_media_prefs(&codecs, kind);
            self.streams[idx].best_media(&prefs, &features).cloned()
        } else {
            None
        };

        let stream = &self.streams[idx];
        // An offer of a stream nobody has sent payloads for yet is ours to fill.
        let found = first
            && (best.is_some() || (role == SdpRole::Offer && stream.payloads.is_empty()));
        if found {
            chosen.insert(kind);
        }
        let add_back = role == SdpRole::Offer && found && inbound && outbound;

        let mut line = MediaLine::new(
            MediaType::from(stream.type_string.as_str()),
            0,
            Proto::from(stream.proto_string.as_str()),
        );

        let mut rtp = NO_ADDR;
        let mut rtcp = NO_ADDR;
        let mut direction = Direction::Inactive;
        let mut rate = None;

        if found && (role == SdpRole::Offer || stream.is_enabled()) {
            let channels = call.channels(kind);

            let ch = channels.playback.or(channels.record);
            let record_privacy = record_privacy_allowed
                && self.is_svrs_device()
                && kind != MediaKind::Audio
                && channels.record.map(|r| r.privacy).unwrap_or(false);

            // Without channels nothing is muted yet.
            let d = decide(&DirectionInputs {
                role,
                offer_direction: stream.offer_direction,
                inbound,
                outbound,
                playback: channels.playback.is_some() || ch.is_none(),
                playback_privacy: channels.playback.map(|p| p.privacy).unwrap_or(false),
                record_privacy,
                local_hold: call.state.is_local_hold(),
                remote_hold: call.state.is_remote_hold(),
                substate: call.substate,
                third_party_mcu: call.mcu.is_some() && !self.is_svrs_device(),
            });

            let addrs = ch
                .map(|c| (c.rtp, c.rtcp))
                .or_else(|| call.default_addrs.get(kind).copied().flatten().map(|t| (t.rtp, t.rtcp)));
            if let Some((a, b)) = addrs {
                rtp = a;
                rtcp = b;
            }
            if d.redirect_rtp {
                rtp.set_ip(BLACK_HOLE);
            }
            direction = d.direction;

            if rtp.port() == 0 && add_back {
                if let Some(t) = call.session(kind).and_then(|s| s.local_addresses()) {
                    rtp = t.rtp;
                    rtcp = t.rtcp;
                }
            }

            if rtp.port() == 0 && (inbound || outbound) {
                warn!("Enabled {} m-line {} has no port", kind, idx);
            }

            if direction != Direction::Inactive {
                rate = if let Some(p) = channels.playback {
                    if kind == MediaKind::Video {
                        Some(p.flow_control_rate / 1000)
                    } else {
                        Some(p.max_channel_rate / 1000)
                    }
                } else if let Some(r) = channels.record {
                    Some(r.flow_control_rate / 1000)
                } else {
                    match kind {
                        MediaKind::Video => Some(self.config.max_recv_kbps()),
                        MediaKind::Audio => Some(self.config.audio_rate / 1000),
                        _ => None,
                    }
                };
            }

            line.port = rtp.port();
        }

        let ice_index = *enabled_index;
        if line.port != 0 {
            *enabled_index += 1;

            if let Some(local) = self.local.get(kind) {
                for (i, k) in local.sdes_keys.iter().enumerate() {
                    line.attrs
                        .push(MediaAttribute::Crypto(k.to_crypto(i as u32 + 1)));
                }
                if !self.config.disable_dtls {
                    if let Some(s) = local.setup {
                        line.attrs.push(MediaAttribute::Setup(s));
                    }
                    if let Some(fp) = &local.fingerprint {
                        line.attrs.push(MediaAttribute::Fingerprint(fp.clone()));
                    }
                }
            }

            match best.as_ref().filter(|_| role == SdpRole::Answer) {
                Some(b) => self.answer_payloads_add(&mut line, stream, b),
                None => self.offer_payloads_add(call, &mut line, kind, &codecs),
            }

            if rtp.ip() != public_ip {
                line.connection = Some(rtp.ip());
            }
            if let Some(r) = rate {
                line.bw.push(Bandwidth::as_kbps(r));
            }
            line.attrs.push(direction.into());

            if let Some(attrs) = self.ice_attributes.media.get(ice_index) {
                line.attrs.extend(attrs.iter().cloned());
            }

            if rtcp.port() != rtp.port().wrapping_add(1) || rtcp.ip() != rtp.ip() {
                line.attrs.push(MediaAttribute::Rtcp(Rtcp {
                    port: rtcp.port(),
                    address: Some(rtcp.ip()),
                }));
            }
        }

        if line.pts.is_empty() {
            line.pts.push(DUMMY_PT);
        }

        line
    }

    /// Every codec we prefer, numbered from the call's payload table.
    fn offer_payloads_add(
        &self,
        call: &mut Call,
        line: &mut MediaLine,
        kind: MediaKind,
        codecs: &CodecPreferences,
    ) {
        match kind {
            MediaKind::Video => {
                let feedback = self.feedback_allowed();
                let rtx = feedback.contains(&RtcpFeedback::NackRtx);
                let mut emitted = vec![];

                for pref in codecs.video_playback.iter().chain(&codecs.video_record) {
                    let profiles = if pref.profiles.is_empty() {
                        vec![ProfileSpec::new(VideoProfile::None, 0)]
                    } else {
                        pref.profiles.clone()
                    };
                    let packetizations = if pref.packetizations.is_empty() {
                        vec![Packetization::Unknown]
                    } else {
                        pref.packetizations.clone()
                    };

                    for prof in &profiles {
                        for &pkt in &packetizations {
                            let key = (pref.codec, prof.profile, pkt);
                            if emitted.contains(&key) {
                                continue;
                            }
                            emitted.push(key);

                            let Some(pt) = resolve_pt(call, kind, pref, pkt, prof.profile) else {
                                debug!("No payload number for {} {:?}", pref.codec, prof.profile);
                                continue;
                            };
                            line.pts.push(pt);
                            video_payload_attrs(line, pt, pref, *prof, pkt, &feedback);

                            if rtx {
                                if let Some(rtx_pt) = resolve_rtx_pt(call, pt) {
                                    line.pts.push(rtx_pt);
                                    rtx_payload_attrs(line, rtx_pt, pt);
                                }
                            }
                        }
                    }
                }
            }

            MediaKind::Audio => {
                for pref in codecs.audio.iter().chain(&codecs.audio_features) {
                    let Some(pt) = resolve_pt(call, kind, pref, Packetization::Unknown, VideoProfile::None) else {
                        continue;
                    };
                    line.pts.push(pt);
                    line.attrs.push(rtpmap(pt, &pref.encoding, pref.clock_rate));
                    if pref.codec == Codec::TelephoneEvent {
                        line.attrs.push(MediaAttribute::Fmtp {
                            pt,
                            values: vec![FormatParam::Raw("0-15".into())],
                        });
                    }
                }
            }

            MediaKind::Text => {
                let resolved: Vec<(Pt, &PreferredMedia)> = codecs
                    .text_playback
                    .iter()
                    .chain(&codecs.text_record)
                    .filter_map(|p| {
                        resolve_pt(call, kind, p, Packetization::Unknown, VideoProfile::None)
                            .map(|pt| (pt, p))
                    })
                    .collect();
                let t140 = resolved
                    .iter()
                    .find(|(_, p)| p.codec == Codec::T140)
                    .map(|(pt, _)| *pt);

                for (pt, pref) in &resolved {
                    if line.pts.contains(pt) {
                        continue;
                    }
                    line.pts.push(*pt);
                    line.attrs.push(rtpmap(*pt, &pref.encoding, pref.clock_rate));
                    if pref.codec == Codec::T140Red {
                        if let Some(t140) = t140 {
                            line.attrs.push(MediaAttribute::Fmtp {
                                pt: *pt,
                                values: vec![FormatParam::Redundancy(vec![t140; 3])],
                            });
                        }
                    }
                }
            }

            MediaKind::Unknown => {}
        }
    }

    /// The payload we picked from the offer, with its companions.
    fn answer_payloads_add(&self, line: &mut MediaLine, stream: &SdpStream, best: &PayloadEntry) {
        line.pts.push(best.pt);

        match stream.kind {
            MediaKind::Video => {
                let codecs = &self.config.codecs;
                let pref = codecs
                    .video_playback
                    .iter()
                    .chain(&codecs.video_record)
                    .find(|p| p.codec == best.codec);
                let prof = pref
                    .and_then(|p| p.profiles.iter().find(|s| s.profile == best.profile))
                    .copied()
                    .unwrap_or(ProfileSpec::new(best.profile, 0));

                let mut pref = pref
                    .cloned()
                    .unwrap_or_else(|| PreferredMedia::new(best.codec, None, best.clock_rate));
                pref.encoding = best.encoding.clone();
                pref.clock_rate = best.clock_rate;

                video_payload_attrs(line, best.pt, &pref, prof, best.packetization, &best.rtcp_fb);

                let rtx = best.rtcp_fb.contains(&RtcpFeedback::NackRtx);
                if let Some(rtx_pt) = best.rtx_pt.filter(|_| rtx) {
                    line.pts.push(rtx_pt);
                    rtx_payload_attrs(line, rtx_pt, best.pt);
                }
            }

            MediaKind::Audio => {
                payload_attrs(line, best);
                for pt in &best.feature_pts {
                    if let Some(f) = stream.payloads.iter().find(|p| p.pt == *pt) {
                        line.pts.push(f.pt);
                        payload_attrs(line, f);
                    }
                }
            }

            MediaKind::Text => {
                line.attrs.push(rtpmap(best.pt, &best.encoding, best.clock_rate));
                let t140 = stream.payloads.iter().find(|p| p.codec == Codec::T140);
                match t140.filter(|_| best.codec == Codec::T140Red) {
                    Some(t) => {
                        line.attrs.push(MediaAttribute::Fmtp {
                            pt: best.pt,
                            values: vec![FormatParam::Redundancy(vec![t.pt; 3])],
                        });
                        line.pts.push(t.pt);
                        payload_attrs(line, t);
                    }
                    None => {
                        if !best.fmtp.is_empty() {
                            line.attrs.push(MediaAttribute::Fmtp {
                                pt: best.pt,
                                values: best.fmtp.clone(),
                            });
                        }
                    }
                }
            }

            MediaKind::Unknown => {}
        }
    }

    /// RTCP feedback we signal to this peer.
    fn feedback_allowed(&self) -> Vec<RtcpFeedback> {
        let svrs = self.is_svrs_device();
        RtcpFeedback::ALL
            .into_iter()
            .filter(|f| match f {
                RtcpFeedback::Tmmbr => {
                    self.config.tmmbr.allows(svrs) && !self.config.legacy_auto_speed
                }
                RtcpFeedback::Fir => self.config.fir,
                RtcpFeedback::Pli => self.config.pli,
                RtcpFeedback::NackRtx => self.config.nack_rtx.allows(svrs),
            })
            .collect()
    }
}

/// Lists the best media of a stream is chosen from.
fn best_media_prefs(
    codecs: &CodecPreferences,
    kind: MediaKind,
) -> (Vec<PreferredMedia>, Vec<PreferredMedia>) {
    match kind {
        MediaKind::Audio => (codecs.audio.clone(), codecs.audio_features.clone()),
        MediaKind::Video => (
            codecs
                .video_playback
                .iter()
                .chain(&codecs.video_record)
                .cloned()
                .collect(),
            vec![],
        ),
        MediaKind::Text => (
            codecs
                .text_playback
                .iter()
                .chain(&codecs.text_record)
                .cloned()
                .collect(),
            vec![],
        ),
        MediaKind::Unknown => (vec![], vec![]),
    }
}

/// Payload number for a codec configuration, binding a new one if needed.
fn resolve_pt(
    call: &mut Call,
    kind: MediaKind,
    pref: &PreferredMedia,
    packetization: Packetization,
    profile: VideoProfile,
) -> Option<Pt> {
    let payloads = &mut call.payloads;

    let existing = match kind {
        MediaKind::Video => payloads.find_video(pref.codec, profile, packetization),
        MediaKind::Audio => payloads.find_audio(pref.codec, packetization, pref.clock_rate),
        MediaKind::Text => payloads.find_text(pref.codec, packetization),
        MediaKind::Unknown => None,
    };
    if let Some(m) = existing {
        return Some(m.pt);
    }

    let pt = match pref.pt {
        Some(pt) => {
            // Static numbers can already be bound by the peer with other parameters.
            match payloads.get(kind, pt) {
                Some(m) if m.codec == pref.codec => return Some(pt),
                Some(_) => return None,
                None => pt,
            }
        }
        None => payloads.allocate_dynamic(kind)?,
    };

    let mut mapping = PayloadMapping::new(pt, pref.codec, pref.clock_rate);
    mapping.packetization = packetization;
    mapping.profile = profile;
    payloads.insert(kind, mapping);

    Some(pt)
}

/// Retransmission payload for a video payload.
fn resolve_rtx_pt(call: &mut Call, primary: Pt) -> Option<Pt> {
    let payloads = &mut call.payloads;
    if let Some(rtx) = payloads.get(MediaKind::Video, primary).and_then(|m| m.rtx_pt) {
        return Some(rtx);
    }

    let rtx = payloads.allocate_dynamic(MediaKind::Video)?;
    payloads.insert(
        MediaKind::Video,
        PayloadMapping::new(rtx, Codec::Rtx, RTX_CLOCK_RATE),
    );
    if let Some(m) = payloads.get_mut(MediaKind::Video, primary) {
        m.rtx_pt = Some(rtx);
    }
    Some(rtx)
}

fn rtpmap(pt: Pt, encoding: &str, clock_rate: u32) -> MediaAttribute {
    MediaAttribute::RtpMap {
        pt,
        value: RtpMap {
            encoding: encoding.to_string(),
            clock_rate,
            channels: None,
        },
    }
}

fn payload_attrs(line: &mut MediaLine, p: &PayloadEntry) {
    line.attrs.push(rtpmap(p.pt, &p.encoding, p.clock_rate));
    if !p.fmtp.is_empty() {
        line.attrs.push(MediaAttribute::Fmtp {
            pt: p.pt,
            values: p.fmtp.clone(),
        });
    }
}

fn video_payload_attrs(
    line: &mut MediaLine,
    pt: Pt,
    pref: &PreferredMedia,
    prof: ProfileSpec,
    packetization: Packetization,
    feedback: &[RtcpFeedback],
) {
    line.attrs.push(rtpmap(pt, &pref.encoding, pref.clock_rate));

    if pref.codec == Codec::H264 {
        let mut values = vec![FormatParam::ProfileLevelId {
            profile_idc: prof.profile.value() as u8,
            profile_iop: prof.constraints,
            level_idc: H264_LEVEL,
        }];
        if let Some(mode) = packetization.h264_mode() {
            values.push(FormatParam::PacketizationMode(mode));
        }
        line.attrs.push(MediaAttribute::Fmtp { pt, values });
    }

    for f in feedback {
        line.attrs.push(MediaAttribute::RtcpFb {
            pt: Some(pt),
            value: feedback_type(*f),
        });
    }
}

fn rtx_payload_attrs(line: &mut MediaLine, rtx: Pt, primary: Pt) {
    line.attrs.push(rtpmap(rtx, Codec::Rtx.encoding_name(), RTX_CLOCK_RATE));
    line.attrs.push(MediaAttribute::Fmtp {
        pt: rtx,
        values: vec![FormatParam::Apt(primary)],
    });
}

fn feedback_type(f: RtcpFeedback) -> FeedbackType {
    match f {
        RtcpFeedback::Tmmbr => FeedbackType::CcmTmmbr,
        RtcpFeedback::Fir => FeedbackType::CcmFir,
        RtcpFeedback::Pli => FeedbackType::NackPli,
        RtcpFeedback::NackRtx => FeedbackType::Nack,
    }
}
