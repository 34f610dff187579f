//! Our model of the m-lines of the last received description.

#![allow(missing_docs)]

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::crypto::{Fingerprint, SdesKey};
use crate::direction::Direction;
use crate::format::{Codec, Packetization, PreferredMedia, RtcpFeedback, VideoProfile};
use crate::id::Pt;
use crate::sdp::{FormatParam, MediaType, Proto, Setup};

/// Kind of media on an m-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
    Text,
    /// Anything we don't handle.
    Unknown,
}

impl MediaKind {
    /// All kinds we negotiate, in the order we offer them.
    pub const SUPPORTED: [MediaKind; 3] = [MediaKind::Audio, MediaKind::Video, MediaKind::Text];

    pub fn is_supported(&self) -> bool {
        *self != MediaKind::Unknown
    }
}

impl From<&MediaType> for MediaKind {
    fn from(v: &MediaType) -> Self {
        match v {
            MediaType::Audio => MediaKind::Audio,
            MediaType::Video => MediaKind::Video,
            MediaType::Text => MediaKind::Text,
            // Some stacks can't name the type and send it through as a string.
            MediaType::Unknown(s) => match s.to_ascii_lowercase().as_str() {
                "audio" => MediaKind::Audio,
                "video" => MediaKind::Video,
                "text" => MediaKind::Text,
                _ => MediaKind::Unknown,
            },
            MediaType::Application => MediaKind::Unknown,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Text => "text",
            MediaKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// One value per media kind we negotiate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerKind<T> {
    pub audio: T,
    pub video: T,
    pub text: T,
}

impl<T> PerKind<T> {
    pub fn get(&self, kind: MediaKind) -> Option<&T> {
        match kind {
            MediaKind::Audio => Some(&self.audio),
            MediaKind::Video => Some(&self.video),
            MediaKind::Text => Some(&self.text),
            MediaKind::Unknown => None,
        }
    }

    pub fn get_mut(&mut self, kind: MediaKind) -> Option<&mut T> {
        match kind {
            MediaKind::Audio => Some(&mut self.audio),
            MediaKind::Video => Some(&mut self.video),
            MediaKind::Text => Some(&mut self.text),
            MediaKind::Unknown => None,
        }
    }
}

/// An offered payload we can handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub pt: Pt,
    /// Encoding name from our preference list.
    pub encoding: String,
    pub codec: Codec,
    pub clock_rate: u32,
    /// Send bandwidth in kbps.
    pub bandwidth: u32,
    pub packetization: Packetization,
    pub profile: VideoProfile,
    pub rtcp_fb: Vec<RtcpFeedback>,
    pub rtx_pt: Option<Pt>,
    /// Raw `a=fmtp` parameters.
    pub fmtp: Vec<FormatParam>,
    /// Feature payloads (DTMF) usable with this one. Filled in when this is
    /// picked as the best media.
    pub feature_pts: Vec<Pt>,
}

/// One m-line of the remote description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpStream {
    pub kind: MediaKind,
    /// The media type as signaled, echoed back in our m-line.
    pub type_string: String,
    pub proto: Proto,
    /// The protocol as signaled, echoed back for protocols we don't know.
    pub proto_string: String,
    /// Payloads we can handle, in the peer's order.
    pub payloads: Vec<PayloadEntry>,
    /// First payload number of the m-line.
    pub default_pt: Option<Pt>,
    /// Packet time in ms.
    pub ptime: u32,
    /// Port 0 means the stream is disabled.
    pub rtp_addr: SocketAddr,
    pub rtcp_addr: SocketAddr,
    pub offer_direction: Direction,
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<Setup>,
    pub sdes_keys: Vec<SdesKey>,
}

/// Packet time assumed when the peer doesn't say (RFC 3551).
pub const DEFAULT_PTIME: u32 = 20;

/// Placeholder address for disabled streams.
pub(crate) const NO_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

impl SdpStream {
    pub fn new(kind: MediaKind, type_string: &str, proto: Proto, proto_string: &str) -> Self {
        SdpStream {
            kind,
            type_string: type_string.to_string(),
            proto,
            proto_string: proto_string.to_string(),
            payloads: vec![],
            default_pt: None,
            ptime: DEFAULT_PTIME,
            rtp_addr: NO_ADDR,
            rtcp_addr: NO_ADDR,
            offer_direction: Direction::SendRecv,
            ice_ufrag: String::new(),
            ice_pwd: String::new(),
            fingerprint: None,
            setup: None,
            sdes_keys: vec![],
        }
    }

    /// A stream is enabled when it has a port.
    pub fn is_enabled(&self) -> bool {
        self.rtp_addr.port() != 0
    }

    pub fn has_ice(&self) -> bool {
        !self.ice_ufrag.is_empty() || !self.ice_pwd.is_empty()
    }

    /// The first payload, in the peer's order, that matches our preferences.
    ///
    /// For audio, the feature payloads (DTMF) usable alongside it are
    /// recorded on the chosen payload.
    pub fn best_media(
        &mut self,
        prefs: &[PreferredMedia],
        features: &[PreferredMedia],
    ) -> Option<&PayloadEntry> {
        let idx = self.payloads.iter().position(|p| {
            !p.codec.is_rtx()
                && prefs
                    .iter()
                    .any(|pref| pref.codec == p.codec && pref.accepts(p.profile, p.packetization))
        })?;

        if self.kind == MediaKind::Audio {
            let feature_pts: Vec<Pt> = self
                .payloads
                .iter()
                .filter(|p| {
                    features.iter().any(|f| {
                        f.codec == p.codec
                            && (p.packetization == Packetization::Unknown
                                || f.packetizations.contains(&p.packetization))
                    })
                })
                .map(|p| p.pt)
                .collect();

            self.payloads[idx].feature_pts = feature_pts;
        }

        self.payloads.get(idx)
    }
}

/// What we announced ourselves for a media kind.
///
/// Only the security parameters are tracked.
#[derive(Debug, Clone, Default)]
pub struct LocalStream {
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<Setup>,
    pub sdes_keys: Vec<SdesKey>,
}

impl LocalStream {
    pub(crate) fn clear_dtls(&mut self) {
        self.fingerprint = None;
        self.setup = None;
    }

    pub(crate) fn clear(&mut self) {
        self.clear_dtls();
        self.sdes_keys.clear();
    }

    pub fn has_dtls(&self) -> bool {
        self.fingerprint.as_ref().map(|f| f.is_usable()).unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::CodecPreferences;

    fn payload(pt: u8, codec: Codec, packetization: Packetization, profile: VideoProfile) -> PayloadEntry {
        PayloadEntry {
            pt: pt.into(),
            encoding: codec.encoding_name().into(),
            codec,
            clock_rate: 90_000,
            bandwidth: 0,
            packetization,
            profile,
            rtcp_fb: vec![],
            rtx_pt: None,
            fmtp: vec![],
            feature_pts: vec![],
        }
    }

    #[test]
    fn kind_from_type() {
        assert_eq!(MediaKind::from(&MediaType::Video), MediaKind::Video);
        assert_eq!(MediaKind::from(&MediaType::Unknown("TEXT".into())), MediaKind::Text);
        assert_eq!(MediaKind::from(&MediaType::Application), MediaKind::Unknown);
    }

    #[test]
    fn port_zero_is_disabled() {
        let mut s = SdpStream::new(MediaKind::Audio, "audio", Proto::Avp, "RTP/AVP");
        assert!(!s.is_enabled());
        s.rtp_addr = "10.0.0.1:5000".parse().unwrap();
        assert!(s.is_enabled());
    }

    #[test]
    fn best_media_in_peer_order() {
        let prefs = CodecPreferences::default();
        let mut s = SdpStream::new(MediaKind::Video, "video", Proto::Avp, "RTP/AVP");
        s.payloads = vec![
            payload(96, Codec::Rtx, Packetization::Unknown, VideoProfile::None),
            payload(97, Codec::H264, Packetization::H264Interleaved, VideoProfile::H264Main),
            payload(34, Codec::H263, Packetization::Unknown, VideoProfile::H263Zero),
            payload(98, Codec::H264, Packetization::H264SingleNal, VideoProfile::H264Baseline),
        ];

        let best = s.best_media(&prefs.video_playback, &[]).unwrap();
        assert_eq!(best.pt, 34.into());
    }

    #[test]
    fn best_media_none() {
        let prefs = CodecPreferences::default();
        let mut s = SdpStream::new(MediaKind::Video, "video", Proto::Avp, "RTP/AVP");
        s.payloads = vec![payload(
            97,
            Codec::H264,
            Packetization::H264SingleNal,
            VideoProfile::H264High,
        )];
        assert!(s.best_media(&prefs.video_playback, &[]).is_none());
    }

    #[test]
    fn best_audio_collects_features() {
        let prefs = CodecPreferences::default();
        let mut s = SdpStream::new(MediaKind::Audio, "audio", Proto::Avp, "RTP/AVP");
        s.payloads = vec![
            payload(101, Codec::TelephoneEvent, Packetization::Unknown, VideoProfile::None),
            payload(8, Codec::Pcma, Packetization::Unknown, VideoProfile::None),
            payload(0, Codec::Pcmu, Packetization::Unknown, VideoProfile::None),
        ];

        let best = s.best_media(&prefs.audio, &prefs.audio_features).unwrap();
        assert_eq!(best.pt, 8.into());
        assert_eq!(best.feature_pts, vec![Pt::from(101)]);
    }
}
