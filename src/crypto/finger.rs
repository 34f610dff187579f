use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sdp::SdpError;

/// Hash function named in an `a=fingerprint` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashFunc {
    /// `sha-1`
    Sha1,
    /// `sha-224`
    Sha224,
    /// `sha-256`
    Sha256,
    /// `sha-384`
    Sha384,
    /// `sha-512`
    Sha512,
    /// `md5`
    Md5,
    /// `md2`
    Md2,
    /// A hash function we don't recognize. Treated as undefined.
    Unknown(String),
}

impl HashFunc {
    /// Whether this names a hash function we can pass on to the DTLS layer.
    pub fn is_defined(&self) -> bool {
        !matches!(self, HashFunc::Unknown(_))
    }
}

impl From<&str> for HashFunc {
    fn from(v: &str) -> Self {
        use HashFunc::*;
        match v.to_ascii_lowercase().as_str() {
            "sha-1" => Sha1,
            "sha-224" => Sha224,
            "sha-256" => Sha256,
            "sha-384" => Sha384,
            "sha-512" => Sha512,
            "md5" => Md5,
            "md2" => Md2,
            _ => Unknown(v.to_string()),
        }
    }
}

impl fmt::Display for HashFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use HashFunc::*;
        let x = match self {
            Sha1 => "sha-1",
            Sha224 => "sha-224",
            Sha256 => "sha-256",
            Sha384 => "sha-384",
            Sha512 => "sha-512",
            Md5 => "md5",
            Md2 => "md2",
            Unknown(v) => v,
        };
        write!(f, "{}", x)
    }
}

/// Certificate fingerprint.
///
/// DTLS-SRTP uses self signed certificates, and the fingerprint is
/// communicated via SDP to let the remote peer verify who is connecting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hash function used to produce the `bytes`.
    pub hash_func: HashFunc,

    /// Digest of the certificate by the algorithm in `hash_func`.
    pub bytes: Vec<u8>,
}

impl Fingerprint {
    /// A fingerprint is usable when it carries a digest and a known hash.
    pub fn is_usable(&self) -> bool {
        !self.bytes.is_empty() && self.hash_func.is_defined()
    }

    /// The colon separated upper case hex digest.
    pub fn hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for Fingerprint {
    /// Formats like the value of an `a=fingerprint` attribute.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hash_func, self.hex())
    }
}

impl FromStr for Fingerprint {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash_func, hex_with_colons) = s
            .split_once(' ')
            .ok_or_else(|| SdpError::Parse(format!("fingerprint without hash: {}", s)))?;

        let mut bytes = Vec::new();
        for hex in hex_with_colons.trim().split(':') {
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|e| SdpError::Parse(format!("fingerprint digest: {}", e)))?;
            bytes.push(byte);
        }

        Ok(Self {
            hash_func: hash_func.into(),
            bytes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_format() {
        let f: Fingerprint = "sha-256 45:AD:5C:82".parse().unwrap();
        assert_eq!(f.hash_func, HashFunc::Sha256);
        assert_eq!(f.bytes, vec![0x45, 0xad, 0x5c, 0x82]);
        assert_eq!(f.to_string(), "sha-256 45:AD:5C:82");
    }

    #[test]
    fn unknown_hash_not_usable() {
        let f: Fingerprint = "blake3 01:02".parse().unwrap();
        assert!(!f.hash_func.is_defined());
        assert!(!f.is_usable());
    }

    #[test]
    fn empty_digest_not_usable() {
        let f = Fingerprint {
            hash_func: HashFunc::Sha1,
            bytes: vec![],
        };
        assert!(!f.is_usable());
    }

    #[test]
    fn bad_hex() {
        assert!("sha-1 zz:01".parse::<Fingerprint>().is_err());
        assert!("sha-1".parse::<Fingerprint>().is_err());
    }
}
