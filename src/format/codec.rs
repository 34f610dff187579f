use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::Pt;
use crate::sdp::FormatParam;
use crate::stream::MediaKind;

/// Codecs the negotiation engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Codec {
    /// G.711 µ-law.
    Pcmu,
    /// G.711 A-law.
    Pcma,
    G722,
    /// DTMF events (RFC 4733).
    TelephoneEvent,
    H263,
    H263_1998,
    H264,
    H265,
    /// Real time text (RFC 4103).
    T140,
    /// Redundant real time text.
    T140Red,
    /// Retransmission (RFC 4588).
    Rtx,
    #[doc(hidden)]
    Unknown,
}

impl Codec {
    /// Which media the codec belongs to.
    pub fn kind(&self) -> MediaKind {
        use Codec::*;
        match self {
            Pcmu | Pcma | G722 | TelephoneEvent => MediaKind::Audio,
            H263 | H263_1998 | H264 | H265 | Rtx => MediaKind::Video,
            T140 | T140Red => MediaKind::Text,
            Unknown => MediaKind::Unknown,
        }
    }

    /// Resolve from an `a=rtpmap` encoding name, ignoring case.
    pub fn from_encoding(name: &str) -> Self {
        use Codec::*;
        match name.to_ascii_lowercase().as_str() {
            "pcmu" => Pcmu,
            "pcma" => Pcma,
            "g722" => G722,
            "telephone-event" => TelephoneEvent,
            "h263" => H263,
            "h263-1998" => H263_1998,
            "h264" => H264,
            "h265" => H265,
            "t140" => T140,
            "red" => T140Red,
            "rtx" => Rtx,
            _ => Unknown,
        }
    }

    /// The encoding name we use in `a=rtpmap`.
    pub fn encoding_name(&self) -> &'static str {
        use Codec::*;
        match self {
            Pcmu => "PCMU",
            Pcma => "PCMA",
            G722 => "G722",
            TelephoneEvent => "telephone-event",
            H263 => "H263",
            H263_1998 => "H263-1998",
            H264 => "H264",
            H265 => "H265",
            T140 => "t140",
            T140Red => "red",
            Rtx => "rtx",
            Unknown => "unknown",
        }
    }

    pub fn is_rtx(&self) -> bool {
        *self == Codec::Rtx
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoding_name())
    }
}

/// Packetization schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Packetization {
    /// The codec has a single scheme, or it wasn't signaled.
    #[default]
    Unknown,
    /// H.263 per RFC 2190.
    H263Rfc2190,
    /// H.264 packetization-mode=0.
    H264SingleNal,
    /// H.264 packetization-mode=1.
    H264NonInterleaved,
    /// H.264 packetization-mode=2.
    H264Interleaved,
    /// H.265 as per RFC 7798.
    H265NonInterleaved,
}

impl Packetization {
    /// From an H.264 `packetization-mode`. Out of range modes are single NAL.
    pub fn from_h264_mode(mode: u8) -> Self {
        match mode {
            1 => Packetization::H264NonInterleaved,
            2 => Packetization::H264Interleaved,
            _ => Packetization::H264SingleNal,
        }
    }

    /// The H.264 `packetization-mode` value, if this is an H.264 scheme.
    pub fn h264_mode(&self) -> Option<u8> {
        match self {
            Packetization::H264SingleNal => Some(0),
            Packetization::H264NonInterleaved => Some(1),
            Packetization::H264Interleaved => Some(2),
            _ => None,
        }
    }
}

/// Video codec profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoProfile {
    #[default]
    None,
    /// H.263 baseline, profile 0.
    H263Zero,
    /// H.264 profile_idc 66.
    H264Baseline,
    /// H.264 profile_idc 77.
    H264Main,
    /// H.264 profile_idc 88.
    H264Extended,
    /// H.264 profile_idc 100.
    H264High,
    /// H.265 profile-id 1.
    H265Main,
    /// Any other numeric profile.
    Other(u32),
}

impl VideoProfile {
    pub fn from_h264_idc(idc: u8) -> Self {
        match idc {
            66 => VideoProfile::H264Baseline,
            77 => VideoProfile::H264Main,
            88 => VideoProfile::H264Extended,
            100 => VideoProfile::H264High,
            v => VideoProfile::Other(v as u32),
        }
    }

    pub fn from_h265_id(id: u32) -> Self {
        match id {
            1 => VideoProfile::H265Main,
            v => VideoProfile::Other(v),
        }
    }

    /// The numeric value used in fmtp lines.
    pub fn value(&self) -> u32 {
        match self {
            VideoProfile::None | VideoProfile::H263Zero => 0,
            VideoProfile::H264Baseline => 66,
            VideoProfile::H264Main => 77,
            VideoProfile::H264Extended => 88,
            VideoProfile::H264High => 100,
            VideoProfile::H265Main => 1,
            VideoProfile::Other(v) => *v,
        }
    }
}

/// A profile with its H.264 constraint flags, as advertised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub profile: VideoProfile,
    pub constraints: u8,
}

impl ProfileSpec {
    pub const fn new(profile: VideoProfile, constraints: u8) -> Self {
        ProfileSpec {
            profile,
            constraints,
        }
    }
}

/// RTCP feedback a video payload supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtcpFeedback {
    /// `ccm tmmbr`
    Tmmbr,
    /// `ccm fir`
    Fir,
    /// `nack pli`
    Pli,
    /// Generic `nack`, answered with RTX.
    NackRtx,
}

impl RtcpFeedback {
    /// Everything we can do.
    pub const ALL: [RtcpFeedback; 4] = [
        RtcpFeedback::Tmmbr,
        RtcpFeedback::Fir,
        RtcpFeedback::Pli,
        RtcpFeedback::NackRtx,
    ];
}

/// Codec parameters decoded from `a=fmtp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecParams {
    pub packetization: Packetization,
    pub profile: VideoProfile,
    /// RTX associated payload.
    pub apt: Option<Pt>,
}

impl CodecParams {
    /// Decode the parameters relevant for `codec`, with defaults for anything
    /// missing or malformed.
    pub fn decode(codec: Codec, fmtp: &[FormatParam]) -> Self {
        let mut p = CodecParams::default();

        match codec {
            Codec::H264 => {
                p.packetization = Packetization::H264SingleNal;
                p.profile = VideoProfile::H264Baseline;
                for f in fmtp {
                    match f {
                        FormatParam::PacketizationMode(m) => {
                            p.packetization = Packetization::from_h264_mode(*m)
                        }
                        FormatParam::ProfileLevelId { profile_idc, .. } => {
                            p.profile = VideoProfile::from_h264_idc(*profile_idc)
                        }
                        _ => {}
                    }
                }
            }
            Codec::H265 => {
                p.packetization = Packetization::H265NonInterleaved;
                p.profile = VideoProfile::H265Main;
                for f in fmtp {
                    if let FormatParam::ProfileId(id) = f {
                        p.profile = VideoProfile::from_h265_id(*id);
                    }
                }
            }
            Codec::H263 | Codec::H263_1998 => {
                p.profile = VideoProfile::H263Zero;
            }
            Codec::Rtx => {
                p.apt = fmtp.iter().find_map(|f| match f {
                    FormatParam::Apt(pt) => Some(*pt),
                    _ => None,
                });
            }
            _ => {}
        }

        p
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encoding_names_ignore_case() {
        assert_eq!(Codec::from_encoding("h264"), Codec::H264);
        assert_eq!(Codec::from_encoding("H263-1998"), Codec::H263_1998);
        assert_eq!(Codec::from_encoding("T140"), Codec::T140);
        assert_eq!(Codec::from_encoding("opus"), Codec::Unknown);
    }

    #[test]
    fn h264_defaults() {
        let p = CodecParams::decode(Codec::H264, &[]);
        assert_eq!(p.packetization, Packetization::H264SingleNal);
        assert_eq!(p.profile, VideoProfile::H264Baseline);
    }

    #[test]
    fn h264_signaled() {
        let p = CodecParams::decode(
            Codec::H264,
            &[
                FormatParam::ProfileLevelId {
                    profile_idc: 0x64,
                    profile_iop: 0,
                    level_idc: 0x1f,
                },
                FormatParam::PacketizationMode(1),
            ],
        );
        assert_eq!(p.packetization, Packetization::H264NonInterleaved);
        assert_eq!(p.profile, VideoProfile::H264High);
    }

    #[test]
    fn h264_out_of_range_mode() {
        let p = CodecParams::decode(Codec::H264, &[FormatParam::PacketizationMode(7)]);
        assert_eq!(p.packetization, Packetization::H264SingleNal);
    }

    #[test]
    fn h265_profile_id() {
        let p = CodecParams::decode(Codec::H265, &[FormatParam::ProfileId(2)]);
        assert_eq!(p.packetization, Packetization::H265NonInterleaved);
        assert_eq!(p.profile, VideoProfile::Other(2));
    }

    #[test]
    fn rtx_apt() {
        let p = CodecParams::decode(Codec::Rtx, &[FormatParam::Apt(97.into())]);
        assert_eq!(p.apt, Some(97.into()));
        assert_eq!(p.packetization, Packetization::Unknown);
    }
}
