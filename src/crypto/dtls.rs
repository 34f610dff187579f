use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::sdp::Setup;

use super::Fingerprint;

/// DTLS parameters shared between the call leg and the media sessions.
///
/// The certificate and handshake belong to the embedding application. The
/// negotiation engine only records what has been agreed in SDP: our
/// fingerprint and role, and the peer's fingerprint and role. Cloning the
/// context shares it.
#[derive(Debug, Clone)]
pub struct DtlsContext {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug)]
struct Inner {
    local_fingerprint: Fingerprint,
    local_setup: Option<Setup>,
    remote_fingerprint: Option<Fingerprint>,
    remote_setup: Option<Setup>,
    negotiated: bool,
}

impl DtlsContext {
    /// Context for a local certificate with the given fingerprint.
    pub fn new(local_fingerprint: Fingerprint) -> Self {
        DtlsContext {
            inner: Arc::new(RwLock::new(Inner {
                local_fingerprint,
                local_setup: None,
                remote_fingerprint: None,
                remote_setup: None,
                negotiated: false,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fingerprint of our certificate.
    pub fn local_fingerprint(&self) -> Fingerprint {
        self.read().local_fingerprint.clone()
    }

    /// Role we announced in our last SDP.
    pub fn local_setup(&self) -> Option<Setup> {
        self.read().local_setup
    }

    pub(crate) fn set_local_setup(&self, setup: Setup) {
        self.write().local_setup = Some(setup);
    }

    /// Fingerprint the peer announced.
    pub fn remote_fingerprint(&self) -> Option<Fingerprint> {
        self.read().remote_fingerprint.clone()
    }

    /// Role the peer announced.
    pub fn remote_setup(&self) -> Option<Setup> {
        self.read().remote_setup
    }

    pub(crate) fn set_remote(&self, fingerprint: Fingerprint, setup: Option<Setup>) {
        let mut inner = self.write();
        inner.remote_fingerprint = Some(fingerprint);
        inner.remote_setup = setup;
    }

    /// Whether the handshake agreed on keys.
    pub fn is_negotiated(&self) -> bool {
        self.read().negotiated
    }

    /// Called by the DTLS engine once the handshake completed, or with
    /// `false` when it has to be redone.
    pub fn set_negotiated(&self, negotiated: bool) {
        self.write().negotiated = negotiated;
    }

    /// Whether two handles share the same context.
    pub fn same(&self, other: &DtlsContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
