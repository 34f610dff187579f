//! Media encryption parameters: DTLS fingerprints and SDES keys.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

mod finger;
pub use finger::{Fingerprint, HashFunc};

mod sdes;
pub use sdes::{generate_keys, media_keys, SdesKey, SdesKeyPair, SdesSuite};

mod dtls;
pub use dtls::DtlsContext;

/// How keys for a media session were exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyExchangeMethod {
    /// No key exchange, media is in the clear.
    #[default]
    None,
    /// Keys exchanged in SDP `a=crypto` lines.
    Sdes,
    /// Keys derived from a DTLS handshake.
    DtlsSrtp,
}

/// Encryption state a media session reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptionState {
    /// Sending and receiving in the clear.
    #[default]
    Unencrypted,
    /// Keys are agreed but not yet in use, e.g. DTLS handshake running.
    Pending,
    /// SRTP is active.
    Encrypted,
}
