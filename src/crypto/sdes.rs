//! SDES (RFC 4568) key material carried in `a=crypto` attributes.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::sdp::{Crypto, KeyParam, SdpError};

/// SRTP crypto suites we know how to key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum SdesSuite {
    /// `AES_256_CM_HMAC_SHA1_80`
    Aes256CmHmacSha1_80,
    /// `AES_256_CM_HMAC_SHA1_32`
    Aes256CmHmacSha1_32,
    /// `AES_CM_128_HMAC_SHA1_80`
    AesCm128HmacSha1_80,
    /// `AES_CM_128_HMAC_SHA1_32`
    AesCm128HmacSha1_32,
}

impl SdesSuite {
    /// Suites offered by default, in preference order.
    pub const DEFAULT: &'static [SdesSuite] =
        &[SdesSuite::Aes256CmHmacSha1_80, SdesSuite::AesCm128HmacSha1_80];

    /// Length of the master key in bytes.
    pub fn master_key_len(&self) -> usize {
        match self {
            SdesSuite::Aes256CmHmacSha1_80 | SdesSuite::Aes256CmHmacSha1_32 => 32,
            SdesSuite::AesCm128HmacSha1_80 | SdesSuite::AesCm128HmacSha1_32 => 16,
        }
    }

    /// Length of the master salt in bytes.
    pub fn master_salt_len(&self) -> usize {
        14
    }

    /// Name as used in `a=crypto`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SdesSuite::Aes256CmHmacSha1_80 => "AES_256_CM_HMAC_SHA1_80",
            SdesSuite::Aes256CmHmacSha1_32 => "AES_256_CM_HMAC_SHA1_32",
            SdesSuite::AesCm128HmacSha1_80 => "AES_CM_128_HMAC_SHA1_80",
            SdesSuite::AesCm128HmacSha1_32 => "AES_CM_128_HMAC_SHA1_32",
        }
    }

    fn material_len(&self) -> usize {
        self.master_key_len() + self.master_salt_len()
    }
}

impl FromStr for SdesSuite {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use SdesSuite::*;
        Ok(match s {
            "AES_256_CM_HMAC_SHA1_80" => Aes256CmHmacSha1_80,
            "AES_256_CM_HMAC_SHA1_32" => Aes256CmHmacSha1_32,
            "AES_CM_128_HMAC_SHA1_80" => AesCm128HmacSha1_80,
            "AES_CM_128_HMAC_SHA1_32" => AesCm128HmacSha1_32,
            _ => return Err(SdpError::Parse(format!("unsupported crypto suite: {}", s))),
        })
    }
}

impl fmt::Display for SdesSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One SRTP master key and salt for a suite.
#[derive(Clone, PartialEq, Eq)]
pub struct SdesKey {
    suite: SdesSuite,
    material: Vec<u8>,
    lifetime: Option<String>,
    mki: Option<String>,
}

impl SdesKey {
    /// Fresh random key material for `suite`.
    pub fn generate(suite: SdesSuite) -> Self {
        let mut material = vec![0; suite.material_len()];
        rand::rng().fill_bytes(&mut material);
        SdesKey {
            suite,
            material,
            lifetime: None,
            mki: None,
        }
    }

    /// Decode the `<key||salt>[|lifetime][|mki:length]` part of an inline key.
    pub fn decode(suite: SdesSuite, key_info: &str) -> Result<Self, SdpError> {
        let mut parts = key_info.split('|');

        let encoded = parts.next().unwrap_or_default();
        let material = STANDARD
            .decode(encoded)
            .or_else(|_| STANDARD_NO_PAD.decode(encoded))
            .map_err(|e| SdpError::Parse(format!("crypto key: {}", e)))?;

        if material.len() != suite.material_len() {
            return Err(SdpError::Parse(format!(
                "crypto key length {} for {}",
                material.len(),
                suite
            )));
        }

        let mut lifetime = None;
        let mut mki = None;
        for p in parts {
            if p.contains(':') {
                mki = Some(p.to_string());
            } else {
                lifetime = Some(p.to_string());
            }
        }

        Ok(SdesKey {
            suite,
            material,
            lifetime,
            mki,
        })
    }

    /// Read a key from a parsed `a=crypto` attribute.
    ///
    /// Only a single `inline` key parameter is accepted.
    pub fn from_crypto(c: &Crypto) -> Result<Self, SdpError> {
        let suite: SdesSuite = c.suite.parse()?;

        let [param] = c.key_params.as_slice() else {
            return Err(SdpError::Parse(format!(
                "expected one key parameter, got {}",
                c.key_params.len()
            )));
        };

        if !param.method.eq_ignore_ascii_case("inline") {
            return Err(SdpError::Parse(format!("key method: {}", param.method)));
        }

        SdesKey::decode(suite, &param.info)
    }

    /// Express as an `a=crypto` attribute with the given tag.
    pub fn to_crypto(&self, tag: u32) -> Crypto {
        Crypto {
            tag,
            suite: self.suite.as_str().to_string(),
            key_params: vec![KeyParam {
                method: "inline".to_string(),
                info: self.inline(),
            }],
            session_params: vec![],
        }
    }

    /// The inline key info, base64 of key and salt plus lifetime and mki.
    pub fn inline(&self) -> String {
        let mut s = STANDARD.encode(&self.material);
        if let Some(l) = &self.lifetime {
            s.push('|');
            s.push_str(l);
        }
        if let Some(m) = &self.mki {
            s.push('|');
            s.push_str(m);
        }
        s
    }

    /// The suite this key is for.
    pub fn suite(&self) -> SdesSuite {
        self.suite
    }

    /// Master key followed by master salt.
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for SdesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log key material.
        f.debug_struct("SdesKey")
            .field("suite", &self.suite)
            .field("len", &self.material.len())
            .finish()
    }
}

/// Generate one fresh key per suite.
pub fn generate_keys(suites: &[SdesSuite]) -> Vec<SdesKey> {
    suites.iter().map(|s| SdesKey::generate(*s)).collect()
}

/// The pair of keys used to protect a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesKeyPair {
    /// Our key, used for what we send.
    pub encrypt: SdesKey,
    /// The remote key, used for what we receive.
    pub decrypt: SdesKey,
}

/// Find the first local key whose suite is also among the remote keys.
pub fn media_keys(local: &[SdesKey], remote: &[SdesKey]) -> Option<SdesKeyPair> {
    local.iter().find_map(|l| {
        remote
            .iter()
            .find(|r| r.suite == l.suite)
            .map(|r| SdesKeyPair {
                encrypt: l.clone(),
                decrypt: r.clone(),
            })
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generate_lengths() {
        let k = SdesKey::generate(SdesSuite::Aes256CmHmacSha1_80);
        assert_eq!(k.material().len(), 46);
        let k = SdesKey::generate(SdesSuite::AesCm128HmacSha1_80);
        assert_eq!(k.material().len(), 30);
    }

    #[test]
    fn inline_decodes_back() {
        let k = SdesKey::generate(SdesSuite::AesCm128HmacSha1_80);
        let d = SdesKey::decode(k.suite(), &k.inline()).unwrap();
        assert_eq!(k, d);
    }

    #[test]
    fn decode_with_lifetime_and_mki() {
        let k = SdesKey::generate(SdesSuite::AesCm128HmacSha1_80);
        let info = format!("{}|2^20|1:4", k.inline());
        let d = SdesKey::decode(k.suite(), &info).unwrap();
        assert_eq!(d.material(), k.material());
        assert_eq!(d.inline(), info);
    }

    #[test]
    fn decode_wrong_length() {
        let short = STANDARD.encode([0_u8; 10]);
        assert!(SdesKey::decode(SdesSuite::AesCm128HmacSha1_80, &short).is_err());
    }

    #[test]
    fn from_crypto_rejects_multiple_keys() {
        let k = SdesKey::generate(SdesSuite::AesCm128HmacSha1_80);
        let mut c = k.to_crypto(1);
        c.key_params.push(c.key_params[0].clone());
        assert!(SdesKey::from_crypto(&c).is_err());
    }

    #[test]
    fn from_crypto_rejects_non_inline() {
        let k = SdesKey::generate(SdesSuite::AesCm128HmacSha1_80);
        let mut c = k.to_crypto(1);
        c.key_params[0].method = "uri".to_string();
        assert!(SdesKey::from_crypto(&c).is_err());
    }

    #[test]
    fn media_keys_follow_local_order() {
        let local = generate_keys(SdesSuite::DEFAULT);
        let remote = generate_keys(&[SdesSuite::AesCm128HmacSha1_80]);

        let pair = media_keys(&local, &remote).unwrap();
        assert_eq!(pair.encrypt.suite(), SdesSuite::AesCm128HmacSha1_80);
        assert_eq!(pair.decrypt, remote[0]);

        assert!(media_keys(&local, &[]).is_none());
    }
}
