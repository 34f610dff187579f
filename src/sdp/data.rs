use std::fmt;
use std::net::IpAddr;

use crate::crypto::Fingerprint;
use crate::direction::Direction;
use crate::id::{Pt, SessionId};

use super::parser;

/// A session description as handed over by the SIP stack.
///
/// The SIP stack owns the wire grammar. It splits the body into lines and
/// `a=` lines into name and value, which become typed attributes via
/// [`SessionAttribute::parse`] and [`MediaAttribute::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdp {
    pub origin: Origin,
    /// Session level `c=` address.
    pub connection: Option<IpAddr>,
    /// Session level `b=` lines.
    pub bw: Vec<Bandwidth>,
    pub attrs: Vec<SessionAttribute>,
    pub media_lines: Vec<MediaLine>,
}

impl Sdp {
    /// An empty description with the given origin.
    pub fn new(origin: Origin) -> Self {
        Sdp {
            origin,
            connection: None,
            bw: vec![],
            attrs: vec![],
            media_lines: vec![],
        }
    }

    /// Session level `a=ice-ufrag`.
    pub fn ice_ufrag(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| {
            if let SessionAttribute::IceUfrag(v) = a {
                Some(v.as_str())
            } else {
                None
            }
        })
    }

    /// Session level `a=ice-pwd`.
    pub fn ice_pwd(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| {
            if let SessionAttribute::IcePwd(v) = a {
                Some(v.as_str())
            } else {
                None
            }
        })
    }

    /// Session level `a=fingerprint`.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.attrs.iter().find_map(|a| {
            if let SessionAttribute::Fingerprint(v) = a {
                Some(v)
            } else {
                None
            }
        })
    }

    /// Session bandwidth in kbps. TIAS (bps) is preferred over AS.
    pub fn bandwidth_kbps(&self) -> Option<u32> {
        bandwidth_kbps(&self.bw)
    }
}

/// `o=<username> <sess-id> <sess-version> IN <addrtype> <unicast-address>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: SessionId,
    pub version: u64,
    /// `None` when the origin carries a host name or an unparseable address.
    pub address: Option<IpAddr>,
}

/// `b=<bwtype>:<bandwidth>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bandwidth {
    pub typ: BandwidthType,
    pub val: u32,
}

impl Bandwidth {
    /// `b=AS:<kbps>`
    pub fn as_kbps(val: u32) -> Self {
        Bandwidth {
            typ: BandwidthType::As,
            val,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandwidthType {
    /// Application specific, kbps.
    As,
    /// Transport independent application specific, bps.
    Tias,
    Other(String),
}

impl From<&str> for BandwidthType {
    fn from(v: &str) -> Self {
        match v {
            "AS" => BandwidthType::As,
            "TIAS" => BandwidthType::Tias,
            _ => BandwidthType::Other(v.to_string()),
        }
    }
}

impl fmt::Display for BandwidthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandwidthType::As => write!(f, "AS"),
            BandwidthType::Tias => write!(f, "TIAS"),
            BandwidthType::Other(v) => write!(f, "{}", v),
        }
    }
}

fn bandwidth_kbps(bw: &[Bandwidth]) -> Option<u32> {
    let tias = bw.iter().find(|b| b.typ == BandwidthType::Tias);
    let as_ = bw.iter().find(|b| b.typ == BandwidthType::As);

    tias.map(|b| b.val / 1000).or_else(|| as_.map(|b| b.val))
}

/// Attributes before the first m-line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAttribute {
    IceUfrag(String),
    IcePwd(String),
    IceLite,
    IceOptions(String),
    Fingerprint(Fingerprint),
    Setup(Setup),
    /// Opaque system information blob of the remote endpoint.
    SInfo(String),
    /// Video mail routing, carrying the mail box number.
    Mail(String),
    /// Group chat routing URI.
    GroupChat(String),
    /// Remote display size, `<width>:<height>`.
    DisplaySize(String),
    Unused { name: String, value: Option<String> },
}

/// Name of the system information attribute.
pub const ATTR_SINFO: &str = "x-sinfo";
/// Name of the video mail attribute.
pub const ATTR_MAIL: &str = "x-mail";
/// Name of the group chat attribute.
pub const ATTR_GROUP_CHAT: &str = "x-groupchat";
/// Name of the display size attribute.
pub const ATTR_DISPLAY_SIZE: &str = "x-displaysize";

impl SessionAttribute {
    /// Type a session attribute from its name and optional value.
    ///
    /// Values that don't parse are kept as [`SessionAttribute::Unused`].
    pub fn parse(name: &str, value: Option<&str>) -> Self {
        parser::session_attribute(name, value)
    }

    /// The attribute name, as in `a=<name>:<value>`.
    pub fn name(&self) -> &str {
        use SessionAttribute::*;
        match self {
            IceUfrag(_) => "ice-ufrag",
            IcePwd(_) => "ice-pwd",
            IceLite => "ice-lite",
            IceOptions(_) => "ice-options",
            Fingerprint(_) => "fingerprint",
            Setup(_) => "setup",
            SInfo(_) => ATTR_SINFO,
            Mail(_) => ATTR_MAIL,
            GroupChat(_) => ATTR_GROUP_CHAT,
            DisplaySize(_) => ATTR_DISPLAY_SIZE,
            Unused { name, .. } => name,
        }
    }

    /// The attribute value, if it has one.
    pub fn value(&self) -> Option<String> {
        use SessionAttribute::*;
        match self {
            IceUfrag(v) | IcePwd(v) | IceOptions(v) => Some(v.clone()),
            SInfo(v) | Mail(v) | GroupChat(v) | DisplaySize(v) => Some(v.clone()),
            IceLite => None,
            Fingerprint(v) => Some(v.to_string()),
            Setup(v) => Some(v.to_string()),
            Unused { value, .. } => value.clone(),
        }
    }
}

impl fmt::Display for SessionAttribute {
    /// Formats as `<name>[:<value>]`, without `a=`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(v) = self.value() {
            write!(f, ":{}", v)?;
        }
        Ok(())
    }
}

/// An m-line with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLine {
    pub typ: MediaType,
    /// RTP port. 0 means the stream is disabled.
    pub port: u16,
    pub proto: Proto,
    pub pts: Vec<Pt>,
    /// Media level `c=` address.
    pub connection: Option<IpAddr>,
    pub bw: Vec<Bandwidth>,
    pub attrs: Vec<MediaAttribute>,
}

impl MediaLine {
    /// A line with no payloads or attributes.
    pub fn new(typ: MediaType, port: u16, proto: Proto) -> Self {
        MediaLine {
            typ,
            port,
            proto,
            pts: vec![],
            connection: None,
            bw: vec![],
            attrs: vec![],
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.port == 0
    }

    /// Media level `b=` in kbps. TIAS (bps) is preferred over AS.
    pub fn bandwidth_kbps(&self) -> Option<u32> {
        bandwidth_kbps(&self.bw)
    }

    /// The direction attribute, if any.
    pub fn direction(&self) -> Option<Direction> {
        self.attrs.iter().find_map(|a| match a {
            MediaAttribute::SendRecv => Some(Direction::SendRecv),
            MediaAttribute::SendOnly => Some(Direction::SendOnly),
            MediaAttribute::RecvOnly => Some(Direction::RecvOnly),
            MediaAttribute::Inactive => Some(Direction::Inactive),
            _ => None,
        })
    }

    pub fn ice_ufrag(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::IceUfrag(v) = a {
                Some(v.as_str())
            } else {
                None
            }
        })
    }

    pub fn ice_pwd(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::IcePwd(v) = a {
                Some(v.as_str())
            } else {
                None
            }
        })
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::Fingerprint(v) = a {
                Some(v)
            } else {
                None
            }
        })
    }

    pub fn setup(&self) -> Option<Setup> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::Setup(v) = a {
                Some(*v)
            } else {
                None
            }
        })
    }

    pub fn ptime(&self) -> Option<u32> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::Ptime(v) = a {
                Some(*v)
            } else {
                None
            }
        })
    }

    pub fn rtcp(&self) -> Option<&Rtcp> {
        self.attrs.iter().find_map(|a| {
            if let MediaAttribute::Rtcp(v) = a {
                Some(v)
            } else {
                None
            }
        })
    }

    /// The `a=rtpmap` for a payload number.
    pub fn rtpmap(&self, pt: Pt) -> Option<&RtpMap> {
        self.attrs.iter().find_map(|a| match a {
            MediaAttribute::RtpMap { pt: p, value } if *p == pt => Some(value),
            _ => None,
        })
    }

    /// The `a=fmtp` parameters for a payload number.
    pub fn fmtp(&self, pt: Pt) -> &[FormatParam] {
        self.attrs
            .iter()
            .find_map(|a| match a {
                MediaAttribute::Fmtp { pt: p, values } if *p == pt => Some(values.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn crypto(&self) -> impl Iterator<Item = &Crypto> + '_ {
        self.attrs.iter().filter_map(|a| {
            if let MediaAttribute::Crypto(c) = a {
                Some(c)
            } else {
                None
            }
        })
    }

    pub fn rtcp_fb(&self) -> impl Iterator<Item = (Option<Pt>, &FeedbackType)> + '_ {
        self.attrs.iter().filter_map(|a| {
            if let MediaAttribute::RtcpFb { pt, value } = a {
                Some((*pt, value))
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Text,
    Application,
    Unknown(String),
}

impl From<&str> for MediaType {
    fn from(v: &str) -> Self {
        match v {
            "audio" => MediaType::Audio,
            "video" => MediaType::Video,
            "text" => MediaType::Text,
            "application" => MediaType::Application,
            _ => MediaType::Unknown(v.to_string()),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MediaType::*;
        match self {
            Audio => write!(f, "audio"),
            Video => write!(f, "video"),
            Text => write!(f, "text"),
            Application => write!(f, "application"),
            Unknown(v) => write!(f, "{}", v),
        }
    }
}

/// Transport protocol of an m-line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Proto {
    /// `RTP/AVP`
    Avp,
    /// `RTP/SAVP`
    Savp,
    Other(String),
}

impl Proto {
    pub fn is_savp(&self) -> bool {
        *self == Proto::Savp
    }
}

impl From<&str> for Proto {
    fn from(v: &str) -> Self {
        match v {
            "RTP/AVP" => Proto::Avp,
            "RTP/SAVP" => Proto::Savp,
            _ => Proto::Other(v.to_string()),
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Avp => write!(f, "RTP/AVP"),
            Proto::Savp => write!(f, "RTP/SAVP"),
            Proto::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Media level attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAttribute {
    // a=ice-ufrag:IdNYTNL1fjvjyEzL
    IceUfrag(String),
    // a=ice-pwd:4d64pT3T1xfwbZvi9fQKjoPb
    IcePwd(String),
    // a=candidate:1 1 UDP 2130706431 10.0.0.4 49170 typ host
    // Candidates belong to the ICE agent, we only carry them.
    Candidate(String),
    // a=fingerprint:sha-256 45:AD:5C:82:...
    Fingerprint(Fingerprint),
    // a=setup:actpass
    Setup(Setup),
    // a=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR|2^20|1:32
    Crypto(Crypto),
    // a=sendrecv
    SendRecv,
    // a=sendonly
    SendOnly,
    // a=recvonly
    RecvOnly,
    // a=inactive
    Inactive,
    // a=rtcp:53020 IN IP4 126.16.64.4
    Rtcp(Rtcp),
    // a=ptime:20
    Ptime(u32),
    // a=rtpmap:97 H264/90000
    RtpMap {
        pt: Pt,
        value: RtpMap,
    },
    // a=fmtp:97 profile-level-id=42e01f;packetization-mode=1
    Fmtp {
        pt: Pt,
        values: Vec<FormatParam>,
    },
    // a=rtcp-fb:* ccm fir
    // a=rtcp-fb:97 nack pli
    RtcpFb {
        /// `None` for `*`.
        pt: Option<Pt>,
        value: FeedbackType,
    },
    Unused {
        name: String,
        value: Option<String>,
    },
}

impl MediaAttribute {
    /// Type a media attribute from its name and optional value.
    ///
    /// Values that don't parse are kept as [`MediaAttribute::Unused`].
    pub fn parse(name: &str, value: Option<&str>) -> Self {
        parser::media_attribute(name, value)
    }

    /// The attribute name, as in `a=<name>:<value>`.
    pub fn name(&self) -> &str {
        use MediaAttribute::*;
        match self {
            IceUfrag(_) => "ice-ufrag",
            IcePwd(_) => "ice-pwd",
            Candidate(_) => "candidate",
            Fingerprint(_) => "fingerprint",
            Setup(_) => "setup",
            Crypto(_) => "crypto",
            SendRecv => "sendrecv",
            SendOnly => "sendonly",
            RecvOnly => "recvonly",
            Inactive => "inactive",
            Rtcp(_) => "rtcp",
            Ptime(_) => "ptime",
            RtpMap { .. } => "rtpmap",
            Fmtp { .. } => "fmtp",
            RtcpFb { .. } => "rtcp-fb",
            Unused { name, .. } => name,
        }
    }

    /// The attribute value, if it has one.
    pub fn value(&self) -> Option<String> {
        use MediaAttribute::*;
        match self {
            IceUfrag(v) | IcePwd(v) | Candidate(v) => Some(v.clone()),
            Fingerprint(v) => Some(v.to_string()),
            Setup(v) => Some(v.to_string()),
            Crypto(v) => Some(v.to_string()),
            SendRecv | SendOnly | RecvOnly | Inactive => None,
            Rtcp(v) => Some(v.to_string()),
            Ptime(v) => Some(v.to_string()),
            RtpMap { pt, value } => Some(format!("{} {}", pt, value)),
            Fmtp { pt, values } => {
                let params = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(";");
                Some(format!("{} {}", pt, params))
            }
            RtcpFb { pt, value } => match pt {
                Some(pt) => Some(format!("{} {}", pt, value)),
                None => Some(format!("* {}", value)),
            },
            Unused { value, .. } => value.clone(),
        }
    }
}

impl From<Direction> for MediaAttribute {
    fn from(v: Direction) -> Self {
        match v {
            Direction::SendRecv => MediaAttribute::SendRecv,
            Direction::SendOnly => MediaAttribute::SendOnly,
            Direction::RecvOnly => MediaAttribute::RecvOnly,
            Direction::Inactive => MediaAttribute::Inactive,
        }
    }
}

impl fmt::Display for MediaAttribute {
    /// Formats as `<name>[:<value>]`, without `a=`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(v) = self.value() {
            write!(f, ":{}", v)?;
        }
        Ok(())
    }
}

/// DTLS role from `a=setup` (RFC 4145).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Setup {
    #[default]
    ActPass,
    Active,
    Passive,
    HoldConn,
}

impl Setup {
    /// The role to answer with given the remote's role.
    pub fn answer_to(remote: Setup) -> Setup {
        use Setup::*;
        match remote {
            ActPass => Active,
            Active => Passive,
            Passive => Active,
            HoldConn => HoldConn,
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Setup::*;
        let x = match self {
            ActPass => "actpass",
            Active => "active",
            Passive => "passive",
            HoldConn => "holdconn",
        };
        write!(f, "{}", x)
    }
}

/// `a=crypto:<tag> <crypto-suite> <key-params> [<session-params>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crypto {
    pub tag: u32,
    pub suite: String,
    pub key_params: Vec<KeyParam>,
    pub session_params: Vec<String>,
}

/// `<key-method>:<key-info>`, as in `inline:<base64>|2^20|1:32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParam {
    pub method: String,
    pub info: String,
}

impl fmt::Display for Crypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.tag, self.suite)?;
        let params = self
            .key_params
            .iter()
            .map(|k| format!("{}:{}", k.method, k.info))
            .collect::<Vec<_>>()
            .join(";");
        write!(f, "{}", params)?;
        for s in &self.session_params {
            write!(f, " {}", s)?;
        }
        Ok(())
    }
}

/// `a=rtcp:<port> [IN <addrtype> <address>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtcp {
    pub port: u16,
    pub address: Option<IpAddr>,
}

impl fmt::Display for Rtcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port)?;
        match self.address {
            Some(IpAddr::V4(a)) => write!(f, " IN IP4 {}", a),
            Some(IpAddr::V6(a)) => write!(f, " IN IP6 {}", a),
            None => Ok(()),
        }
    }
}

/// `<encoding name>/<clock rate>[/<channels>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub encoding: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.encoding, self.clock_rate)?;
        if let Some(c) = self.channels {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

/// Feedback message types in `a=rtcp-fb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackType {
    /// `ccm tmmbr`
    CcmTmmbr,
    /// `ccm fir`
    CcmFir,
    /// `nack pli`
    NackPli,
    /// `nack`
    Nack,
    Other(String),
}

impl From<&str> for FeedbackType {
    fn from(v: &str) -> Self {
        let mut tokens = v.split_ascii_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some("ccm"), Some("tmmbr")) => FeedbackType::CcmTmmbr,
            (Some("ccm"), Some("fir")) => FeedbackType::CcmFir,
            (Some("nack"), Some("pli")) => FeedbackType::NackPli,
            (Some("nack"), None) => FeedbackType::Nack,
            _ => FeedbackType::Other(v.to_string()),
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FeedbackType::*;
        match self {
            CcmTmmbr => write!(f, "ccm tmmbr"),
            CcmFir => write!(f, "ccm fir"),
            NackPli => write!(f, "nack pli"),
            Nack => write!(f, "nack"),
            Other(v) => write!(f, "{}", v),
        }
    }
}

/// Codec specific parameters in `a=fmtp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatParam {
    /// H.264 packetization mode, 0 single NAL, 1 non-interleaved, 2 interleaved.
    PacketizationMode(u8),
    /// H.264 profile-level-id as its three bytes.
    ProfileLevelId {
        profile_idc: u8,
        profile_iop: u8,
        level_idc: u8,
    },
    /// H.264 max macroblocks per second.
    MaxMbps(u32),
    /// H.264 max frame size in macroblocks.
    MaxFs(u32),
    /// H.265 profile id.
    ProfileId(u32),
    /// H.265 tier flag.
    TierFlag(u8),
    /// H.265 level id.
    LevelId(u32),
    /// H.263 profile.
    Profile(u32),
    /// H.263 CIF minimum picture interval.
    Cif(u8),
    /// H.263 QCIF minimum picture interval.
    Qcif(u8),
    /// RTX associated payload type.
    Apt(Pt),
    /// RED redundancy payloads, `98/98/98`.
    Redundancy(Vec<Pt>),
    /// A value that isn't `key=value`, such as `0-15` for telephone-event.
    Raw(String),
    /// A `key=value` we don't interpret.
    Unknown { key: String, value: String },
}

impl FormatParam {
    /// Type a `key=value` parameter.
    pub fn parse(k: &str, v: &str) -> Self {
        use FormatParam::*;

        fn num<T: std::str::FromStr>(k: &str, v: &str, f: impl Fn(T) -> FormatParam) -> FormatParam {
            if let Ok(v) = v.parse() {
                f(v)
            } else {
                trace!("Failed to parse: {}", k);
                Unknown {
                    key: k.to_string(),
                    value: v.to_string(),
                }
            }
        }

        match k.to_ascii_lowercase().as_str() {
            "packetization-mode" => num(k, v, PacketizationMode),
            "profile-level-id" => match parser::profile_level_id(v) {
                Ok((profile_idc, profile_iop, level_idc)) => ProfileLevelId {
                    profile_idc,
                    profile_iop,
                    level_idc,
                },
                Err(_) => {
                    trace!("Failed to parse: {}", k);
                    Unknown {
                        key: k.to_string(),
                        value: v.to_string(),
                    }
                }
            },
            "max-mbps" => num(k, v, MaxMbps),
            "max-fs" => num(k, v, MaxFs),
            "profile-id" => num(k, v, ProfileId),
            "tier-flag" => num(k, v, TierFlag),
            "level-id" => num(k, v, LevelId),
            "profile" => num(k, v, Profile),
            "cif" => num(k, v, Cif),
            "qcif" => num(k, v, Qcif),
            "apt" => num(k, v, |x: u8| Apt(x.into())),
            _ => Unknown {
                key: k.to_string(),
                value: v.to_string(),
            },
        }
    }
}

impl fmt::Display for FormatParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FormatParam::*;
        match self {
            PacketizationMode(v) => write!(f, "packetization-mode={}", v),
            ProfileLevelId {
                profile_idc,
                profile_iop,
                level_idc,
            } => write!(
                f,
                "profile-level-id={:02x}{:02x}{:02x}",
                profile_idc, profile_iop, level_idc
            ),
            MaxMbps(v) => write!(f, "max-mbps={}", v),
            MaxFs(v) => write!(f, "max-fs={}", v),
            ProfileId(v) => write!(f, "profile-id={}", v),
            TierFlag(v) => write!(f, "tier-flag={}", v),
            LevelId(v) => write!(f, "level-id={}", v),
            Profile(v) => write!(f, "profile={}", v),
            Cif(v) => write!(f, "CIF={}", v),
            Qcif(v) => write!(f, "QCIF={}", v),
            Apt(v) => write!(f, "apt={}", v),
            Redundancy(pts) => {
                let s = pts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
                write!(f, "{}", s.join("/"))
            }
            Raw(v) => write!(f, "{}", v),
            Unknown { key, value } => write!(f, "{}={}", key, value),
        }
    }
}
