use crate::call::{Call, RtpSession};
use crate::crypto::{generate_keys, media_keys, SdesKey, SdesSuite};
use crate::sdp::Setup;
use crate::stream::{LocalStream, MediaKind, SdpStream};

use super::CallLeg;

impl CallLeg {
    /// Choose DTLS, SDES or clear media for every remote stream with a media
    /// session, and hand the outcome to the session.
    ///
    /// Calling it again with the same remote streams changes nothing.
    pub(crate) fn local_streams_from_remote_streams_update(&mut self, call: &mut Call) {
        let include = self.include_encryption_attributes(call);
        let dtls_enabled = !self.config.disable_dtls;
        let suites = self.config.sdes_suites.clone();

        let mut seen = Vec::with_capacity(MediaKind::SUPPORTED.len());

        // The first enabled line of a kind drives its session.
        for stream in self.streams.iter().filter(|s| s.is_enabled()) {
            let kind = stream.kind;
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);

            let Some(session) = call.session_mut(kind) else {
                continue;
            };
            let Some(local) = self.local.get_mut(kind) else {
                continue;
            };
            let secure = stream.proto.is_savp() || include;

            let dtls = self.dtls.as_ref().filter(|_| dtls_enabled);
            if let Some(ctx) = dtls.filter(|_| secure && select_dtls(stream)) {
                debug!("{} uses DTLS-SRTP", kind);
                local.sdes_keys.clear();
                let setup = Setup::answer_to(stream.setup.unwrap_or_default());
                local.fingerprint = Some(ctx.local_fingerprint());
                local.setup = Some(setup);
                ctx.set_local_setup(setup);
                session.set_dtls_context(Some(ctx.clone()));
                continue;
            }

            if let Some(suite) = select_sdes(stream, &suites).filter(|_| secure) {
                debug!("{} uses SDES {}", kind, suite);
                local.clear_dtls();
                session.set_dtls_context(None);
                if sdes_apply(local, &stream.sdes_keys, suite, &mut *session) {
                    continue;
                }
                debug!("{} has no SDES key pair", kind);
            }

            trace!("{} unencrypted", kind);
            local.clear();
            session.disable_encryption();
        }
    }

    /// Security attributes of our initial offer.
    pub(crate) fn encryption_attributes_add(&mut self, call: &Call) {
        let include = self.include_encryption_attributes(call);
        let dtls = self.dtls.clone().filter(|_| !self.config.disable_dtls);

        for kind in MediaKind::SUPPORTED {
            let Some(local) = self.local.get_mut(kind) else {
                continue;
            };
            local.clear();
            if !include {
                continue;
            }
            local.sdes_keys = generate_keys(&self.config.sdes_suites);
            if let Some(ctx) = &dtls {
                local.fingerprint = Some(ctx.local_fingerprint());
                local.setup = Some(Setup::Active);
                ctx.set_local_setup(Setup::Active);
            }
        }
    }
}

/// Hand the session the key pair for `suite`. A changed remote key gets a
/// new SSRC and a fresh local key. False if no pair matches.
fn sdes_apply(
    local: &mut LocalStream,
    remote: &[SdesKey],
    suite: SdesSuite,
    session: &mut dyn RtpSession,
) -> bool {
    if !local.sdes_keys.iter().any(|k| k.suite() == suite) {
        local.sdes_keys.push(SdesKey::generate(suite));
    }

    let Some(mut keys) = media_keys(&local.sdes_keys, remote) else {
        return false;
    };

    if session.decrypt_key_changed(&keys.decrypt) {
        debug!("Remote key changed, new SSRC and key");
        session.new_ssrc();
        let ours = keys.encrypt.suite();
        if let Some(k) = local.sdes_keys.iter_mut().find(|k| k.suite() == ours) {
            *k = SdesKey::generate(ours);
        }
        match media_keys(&local.sdes_keys, remote) {
            Some(k) => keys = k,
            None => return false,
        }
    }

    session.set_sdes_keys(keys);
    true
}

/// The peer offered everything DTLS needs.
fn select_dtls(stream: &SdpStream) -> bool {
    let usable = stream
        .fingerprint
        .as_ref()
        .map(|f| f.is_usable())
        .unwrap_or(false);
    usable && stream.setup.is_some() && stream.is_enabled()
}

/// First suite in our order the peer has a key for.
fn select_sdes(stream: &SdpStream, suites: &[SdesSuite]) -> Option<SdesSuite> {
    suites
        .iter()
        .find(|s| stream.sdes_keys.iter().any(|k| k.suite() == **s))
        .copied()
}
