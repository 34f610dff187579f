#![allow(unused)]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, Once};

use sdpneg::crypto::{DtlsContext, EncryptionState, Fingerprint, KeyExchangeMethod};
use sdpneg::crypto::{SdesKey, SdesKeyPair};
use sdpneg::error::IceError;
use sdpneg::sdp::{MediaAttribute, MediaLine, MediaType, Origin, Proto, SessionAttribute};
use sdpneg::{Call, CallId, CallLeg, Calls, IceAgent, IceAttributes, IceNominations, IceRole};
use sdpneg::{IceSession, IceState, IceSupport, MediaKind, MediaTransports, NegotiationConfig};
use sdpneg::{Output, PerKind, RtpSession, Sdp, SessionId};

pub fn init_log() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    });
}

pub const REMOTE_IP: &str = "198.51.100.7";
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(LOCAL_IP), port)
}

pub fn transports(port: u16) -> MediaTransports {
    MediaTransports {
        rtp: addr(port),
        rtcp: addr(port + 1),
    }
}

/// Session level SDP from a remote peer.
pub fn sdp(ip: &str, session_attrs: &[&str], lines: Vec<MediaLine>) -> Sdp {
    let ip: IpAddr = ip.parse().unwrap();
    let mut sdp = Sdp::new(Origin {
        username: "-".into(),
        session_id: SessionId::from(4711),
        version: 1,
        address: Some(ip),
    });
    sdp.connection = Some(ip);
    sdp.attrs = session_attrs
        .iter()
        .map(|a| {
            let (n, v) = split_attr(a);
            SessionAttribute::parse(n, v)
        })
        .collect();
    sdp.media_lines = lines;
    sdp
}

/// One m-line with attributes written as in SDP, without the `a=`.
pub fn m(typ: &str, port: u16, proto: &str, pts: &[u8], attrs: &[&str]) -> MediaLine {
    let mut line = MediaLine::new(MediaType::from(typ), port, Proto::from(proto));
    line.pts = pts.iter().map(|p| (*p).into()).collect();
    line.attrs = attrs
        .iter()
        .map(|a| {
            let (n, v) = split_attr(a);
            MediaAttribute::parse(n, v)
        })
        .collect();
    line
}

fn split_attr(a: &str) -> (&str, Option<&str>) {
    match a.split_once(':') {
        Some((n, v)) => (n, Some(v)),
        None => (a, None),
    }
}

pub fn audio_line(port: u16) -> MediaLine {
    m("audio", port, "RTP/AVP", &[0, 8], &[])
}

pub fn video_line(port: u16) -> MediaLine {
    m(
        "video",
        port,
        "RTP/AVP",
        &[97, 34],
        &[
            "rtpmap:97 H264/90000",
            "fmtp:97 profile-level-id=42e01f;packetization-mode=1",
            "rtcp-fb:97 nack pli",
            "rtcp-fb:* ccm fir",
            "rtpmap:34 H263/90000",
        ],
    )
}

pub fn basic_offer() -> Sdp {
    sdp(REMOTE_IP, &[], vec![audio_line(5000), video_line(5002)])
}

pub fn fingerprint(b: u8) -> Fingerprint {
    let hex: Vec<String> = (0..32).map(|_| format!("{:02X}", b)).collect();
    format!("sha-256 {}", hex.join(":")).parse().unwrap()
}

/// All outputs queued on a leg.
pub fn drain(leg: &mut CallLeg) -> Vec<Output> {
    let mut v = vec![];
    while let Some(o) = leg.poll_output() {
        v.push(o);
    }
    v
}

/// What a [`FakeRtp`] has been told.
#[derive(Debug, Default)]
pub struct RtpLog {
    pub dtls: Option<DtlsContext>,
    pub sdes: Option<SdesKeyPair>,
    pub decrypt_in_use: Option<SdesKey>,
    pub new_ssrc: usize,
    pub disabled: usize,
}

#[derive(Debug, Clone)]
pub struct FakeRtp {
    pub log: Arc<Mutex<RtpLog>>,
    pub local: MediaTransports,
}

impl FakeRtp {
    pub fn new(port: u16) -> Self {
        FakeRtp {
            log: Arc::default(),
            local: transports(port),
        }
    }
}

impl RtpSession for FakeRtp {
    fn local_addresses(&self) -> Option<MediaTransports> {
        Some(self.local)
    }

    fn set_dtls_context(&mut self, ctx: Option<DtlsContext>) {
        self.log.lock().unwrap().dtls = ctx;
    }

    fn set_sdes_keys(&mut self, keys: SdesKeyPair) {
        let mut log = self.log.lock().unwrap();
        log.decrypt_in_use = Some(keys.decrypt.clone());
        log.sdes = Some(keys);
    }

    fn decrypt_key_changed(&self, key: &SdesKey) -> bool {
        match &self.log.lock().unwrap().decrypt_in_use {
            Some(k) => k != key,
            None => false,
        }
    }

    fn new_ssrc(&mut self) {
        self.log.lock().unwrap().new_ssrc += 1;
    }

    fn disable_encryption(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.sdes = None;
        log.decrypt_in_use = None;
        log.disabled += 1;
    }

    fn encryption_state(&self) -> EncryptionState {
        let log = self.log.lock().unwrap();
        if log.sdes.is_some() || log.dtls.is_some() {
            EncryptionState::Pending
        } else {
            EncryptionState::Unencrypted
        }
    }

    fn key_exchange_method(&self) -> KeyExchangeMethod {
        let log = self.log.lock().unwrap();
        if log.dtls.is_some() {
            KeyExchangeMethod::DtlsSrtp
        } else if log.sdes.is_some() {
            KeyExchangeMethod::Sdes
        } else {
            KeyExchangeMethod::None
        }
    }
}

/// Shared state of a [`FakeIce`] agent and its sessions.
#[derive(Debug)]
pub struct IceLog {
    /// Returned from `start_session` and `sdp_received`.
    pub support: IceSupport,
    pub fail_start: Option<IceError>,
    pub started: Vec<IceRole>,
    pub state: IceState,
    pub received: usize,
    pub updated: usize,
    pub proceeded: usize,
    pub ended: usize,
    pub local: PerKind<Option<MediaTransports>>,
    pub remote: PerKind<Option<MediaTransports>>,
}

impl Default for IceLog {
    fn default() -> Self {
        IceLog {
            support: IceSupport::Supported,
            fail_start: None,
            started: vec![],
            state: IceState::Gathering,
            received: 0,
            updated: 0,
            proceeded: 0,
            ended: 0,
            local: PerKind {
                audio: Some(transports(40000)),
                video: Some(transports(40002)),
                text: Some(transports(40004)),
            },
            remote: PerKind::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeIce {
    pub log: Arc<Mutex<IceLog>>,
}

impl IceAgent for FakeIce {
    fn start_session(
        &self,
        role: IceRole,
        _sdp: &Sdp,
    ) -> Result<(Box<dyn IceSession>, IceSupport), IceError> {
        let mut log = self.log.lock().unwrap();
        if let Some(e) = log.fail_start.clone() {
            return Err(e);
        }
        log.started.push(role);
        log.state = IceState::Gathering;
        let support = log.support;
        Ok((
            Box::new(FakeIceSession {
                role,
                log: self.log.clone(),
            }),
            support,
        ))
    }
}

#[derive(Debug)]
pub struct FakeIceSession {
    role: IceRole,
    log: Arc<Mutex<IceLog>>,
}

impl IceSession for FakeIceSession {
    fn role(&self) -> IceRole {
        self.role
    }

    fn state(&self) -> IceState {
        self.log.lock().unwrap().state
    }

    fn complete(&mut self) {
        self.log.lock().unwrap().state = IceState::Complete;
    }

    fn sdp_received(&mut self, _sdp: &Sdp) -> IceSupport {
        let mut log = self.log.lock().unwrap();
        log.received += 1;
        log.support
    }

    fn sdp_update(&mut self, sdp: &mut Sdp) -> Result<(), IceError> {
        self.log.lock().unwrap().updated += 1;
        sdp.attrs.push(SessionAttribute::IceUfrag("loc1".into()));
        sdp.attrs.push(SessionAttribute::IcePwd("localpassword0123456789".into()));
        for line in sdp.media_lines.iter_mut().filter(|l| !l.is_disabled()) {
            line.attrs.push(MediaAttribute::Candidate(format!(
                "1 1 UDP 2130706431 {} {} typ host",
                LOCAL_IP, line.port
            )));
        }
        Ok(())
    }

    fn local_addresses(&self) -> Result<PerKind<Option<MediaTransports>>, IceError> {
        Ok(self.log.lock().unwrap().local.clone())
    }

    fn nominations(&self) -> Result<IceNominations, IceError> {
        let log = self.log.lock().unwrap();
        Ok(IceNominations {
            local: log.local.clone(),
            remote: log.remote.clone(),
            attributes: IceAttributes::default(),
        })
    }

    fn proceed(&mut self) -> Result<(), IceError> {
        let mut log = self.log.lock().unwrap();
        log.proceeded += 1;
        log.state = IceState::Nominating;
        Ok(())
    }

    fn end(&mut self) {
        self.log.lock().unwrap().ended += 1;
    }
}

/// Media sessions installed on a call, by kind.
pub struct Sessions {
    pub audio: FakeRtp,
    pub video: FakeRtp,
    pub text: FakeRtp,
}

/// A call with a local address and media sessions for every kind.
pub fn new_call(calls: &mut Calls) -> (CallId, Sessions) {
    let mut call = Call::new(CallId::new());
    call.local_ip = Some(IpAddr::V4(LOCAL_IP));
    call.dial_string = "+18015551234".into();

    let sessions = Sessions {
        audio: FakeRtp::new(30000),
        video: FakeRtp::new(30002),
        text: FakeRtp::new(30004),
    };
    call.sessions = PerKind {
        audio: Some(Box::new(sessions.audio.clone())),
        video: Some(Box::new(sessions.video.clone())),
        text: Some(Box::new(sessions.text.clone())),
    };
    call.default_addrs = PerKind {
        audio: Some(transports(30000)),
        video: Some(transports(30002)),
        text: Some(transports(30004)),
    };

    (calls.insert(call), sessions)
}

/// A leg without ICE.
pub fn plain_leg(calls: &mut Calls, config: NegotiationConfig) -> (CallLeg, Sessions) {
    let (id, sessions) = new_call(calls);
    let leg = CallLeg::new(calls, id, config).unwrap();
    (leg, sessions)
}

/// A leg with a fake ICE agent.
pub fn ice_leg(calls: &mut Calls, config: NegotiationConfig) -> (CallLeg, Sessions, FakeIce) {
    let (id, sessions) = new_call(calls);
    let ice = FakeIce::default();
    let leg = CallLeg::new(calls, id, config)
        .unwrap()
        .with_ice_agent(Arc::new(ice.clone()));
    (leg, sessions, ice)
}
