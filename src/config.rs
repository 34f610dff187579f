#![allow(missing_docs)]

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::crypto::SdesSuite;
use crate::format::CodecPreferences;

/// How hard we push for encrypted media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecureCallMode {
    /// Never offer encryption. Still accept it when the peer insists.
    Disabled,
    /// Offer encryption, fall back to clear media.
    #[default]
    Preferred,
    /// Fail calls without encryption.
    Required,
}

/// Who we signal an RTCP feedback mechanism to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalingSupport {
    Disabled,
    /// Only to our own devices.
    #[default]
    SorensonOnly,
    Everyone,
}

impl SignalingSupport {
    /// Whether to use the mechanism with a peer.
    pub fn allows(&self, own_device: bool) -> bool {
        match self {
            SignalingSupport::Disabled => false,
            SignalingSupport::SorensonOnly => own_device,
            SignalingSupport::Everyone => true,
        }
    }
}

/// Configuration of the negotiation engine.
///
/// ```
/// use sdpneg::{NegotiationConfig, SecureCallMode};
///
/// let config = NegotiationConfig::new()
///     .set_secure_call_mode(SecureCallMode::Required)
///     .set_use_ice(false);
///
/// assert!(!config.use_ice());
/// ```
///
/// Configs implement [`Clone`] to share them between call legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    pub(crate) max_send_speed: u32,
    pub(crate) max_recv_speed: u32,
    pub(crate) max_ptime: u32,
    pub(crate) audio_rate: u32,
    pub(crate) use_ice: bool,
    pub(crate) nat_traversal: bool,
    pub(crate) secure_call_mode: SecureCallMode,
    pub(crate) disable_dtls: bool,
    pub(crate) encryption_excluded_hosts: Vec<String>,
    pub(crate) tmmbr: SignalingSupport,
    pub(crate) nack_rtx: SignalingSupport,
    pub(crate) fir: bool,
    pub(crate) pli: bool,
    pub(crate) legacy_auto_speed: bool,
    pub(crate) sdes_suites: Vec<SdesSuite>,
    pub(crate) product_name: String,
    pub(crate) product_version: String,
    pub(crate) media_server: bool,
    pub(crate) public_ipv4: Option<Ipv4Addr>,
    pub(crate) display_size: Option<(u32, u32)>,
    pub(crate) system_info: Option<String>,
    pub(crate) codecs: CodecPreferences,
}

impl NegotiationConfig {
    /// Creates a new default config.
    pub fn new() -> Self {
        NegotiationConfig::default()
    }

    /// Max send speed in bps.
    pub fn max_send_speed(&self) -> u32 {
        self.max_send_speed
    }

    /// Set the max send speed in bps. Signaled peer bandwidth is clamped to this.
    pub fn set_max_send_speed(mut self, bps: u32) -> Self {
        self.max_send_speed = bps;
        self
    }

    /// Max receive speed in bps.
    pub fn max_recv_speed(&self) -> u32 {
        self.max_recv_speed
    }

    /// Set the max receive speed in bps. Used for `b=AS` before media
    /// channels exist.
    pub fn set_max_recv_speed(mut self, bps: u32) -> Self {
        self.max_recv_speed = bps;
        self
    }

    /// Largest packet time in ms we record audio with.
    pub fn max_ptime(&self) -> u32 {
        self.max_ptime
    }

    pub fn set_max_ptime(mut self, ms: u32) -> Self {
        self.max_ptime = ms;
        self
    }

    /// Audio bandwidth in bps before an audio channel exists.
    pub fn audio_rate(&self) -> u32 {
        self.audio_rate
    }

    pub fn set_audio_rate(mut self, bps: u32) -> Self {
        self.audio_rate = bps;
        self
    }

    /// Whether calls use ICE.
    pub fn use_ice(&self) -> bool {
        self.use_ice
    }

    pub fn set_use_ice(mut self, enabled: bool) -> Self {
        self.use_ice = enabled;
        self
    }

    /// Whether NAT traversal (server reflexive and relay transports) is on.
    pub fn nat_traversal(&self) -> bool {
        self.nat_traversal
    }

    pub fn set_nat_traversal(mut self, enabled: bool) -> Self {
        self.nat_traversal = enabled;
        self
    }

    pub fn secure_call_mode(&self) -> SecureCallMode {
        self.secure_call_mode
    }

    pub fn set_secure_call_mode(mut self, mode: SecureCallMode) -> Self {
        self.secure_call_mode = mode;
        self
    }

    /// Whether DTLS-SRTP is turned off, leaving SDES as the only key exchange.
    pub fn disable_dtls(&self) -> bool {
        self.disable_dtls
    }

    pub fn set_disable_dtls(mut self, disabled: bool) -> Self {
        self.disable_dtls = disabled;
        self
    }

    /// Hosts known to break on encryption attributes. A call whose routing
    /// address contains one of these is offered clear media.
    pub fn set_encryption_excluded_hosts(mut self, hosts: &[&str]) -> Self {
        self.encryption_excluded_hosts = hosts.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn set_tmmbr(mut self, support: SignalingSupport) -> Self {
        self.tmmbr = support;
        self
    }

    pub fn set_nack_rtx(mut self, support: SignalingSupport) -> Self {
        self.nack_rtx = support;
        self
    }

    pub fn set_fir(mut self, enabled: bool) -> Self {
        self.fir = enabled;
        self
    }

    pub fn set_pli(mut self, enabled: bool) -> Self {
        self.pli = enabled;
        self
    }

    /// The legacy auto speed mode can't handle TMMBR.
    pub fn set_legacy_auto_speed(mut self, legacy: bool) -> Self {
        self.legacy_auto_speed = legacy;
        self
    }

    /// SDES suites in order of preference.
    pub fn sdes_suites(&self) -> &[SdesSuite] {
        &self.sdes_suites
    }

    pub fn set_sdes_suites(mut self, suites: &[SdesSuite]) -> Self {
        self.sdes_suites = suites.to_vec();
        self
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn set_product(mut self, name: &str, version: &str) -> Self {
        self.product_name = name.to_string();
        self.product_version = version.to_string();
        self
    }

    /// We are a video mail server. Announces `x-mail` instead of `x-sinfo`.
    pub fn set_media_server(mut self, media_server: bool) -> Self {
        self.media_server = media_server;
        self
    }

    /// Address announced in `o=` and `c=`. Without one the call's local
    /// address is used.
    pub fn set_public_ipv4(mut self, addr: Option<Ipv4Addr>) -> Self {
        self.public_ipv4 = addr;
        self
    }

    /// Display size announced in `x-displaysize`.
    pub fn set_display_size(mut self, size: Option<(u32, u32)>) -> Self {
        self.display_size = size;
        self
    }

    /// Serialized system info announced in `x-sinfo`.
    pub fn set_system_info(mut self, sinfo: Option<String>) -> Self {
        self.system_info = sinfo;
        self
    }

    pub fn codecs(&self) -> &CodecPreferences {
        &self.codecs
    }

    /// Lower level access to the codec preference lists.
    pub fn codecs_mut(&mut self) -> &mut CodecPreferences {
        &mut self.codecs
    }

    pub(crate) fn max_send_kbps(&self) -> u32 {
        self.max_send_speed / 1000
    }

    pub(crate) fn max_recv_kbps(&self) -> u32 {
        self.max_recv_speed / 1000
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        NegotiationConfig {
            max_send_speed: 1_500_000,
            max_recv_speed: 1_500_000,
            max_ptime: 30,
            audio_rate: 64_000,
            use_ice: true,
            nat_traversal: true,
            secure_call_mode: SecureCallMode::default(),
            disable_dtls: false,
            encryption_excluded_hosts: vec![],
            tmmbr: SignalingSupport::default(),
            nack_rtx: SignalingSupport::default(),
            fir: true,
            pli: true,
            legacy_auto_speed: false,
            sdes_suites: SdesSuite::DEFAULT.to_vec(),
            product_name: "Sorenson Videophone".into(),
            product_version: env!("CARGO_PKG_VERSION").into(),
            media_server: false,
            public_ipv4: None,
            display_size: None,
            system_info: None,
            codecs: CodecPreferences::default(),
        }
    }
}
