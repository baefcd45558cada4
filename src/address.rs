//! Key-scheme tagged addresses.
//!
//! An address is one scheme byte followed by the blake3 digest of the public
//! key. Its text form is lowercase hex. Only `AddressScheme::Threshold`
//! addresses may anchor a committee chain.

use core::fmt;
use core::str::FromStr;
use curve25519_dalek::ristretto::RistrettoPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of the binary address form.
pub const ADDRESS_LEN: usize = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressScheme {
    /// Single-signer key.
    Single,
    /// T-of-N threshold key produced by the key generation.
    Threshold,
}

impl AddressScheme {
    pub fn to_byte(self) -> u8 {
        match self {
            AddressScheme::Single => 0x01,
            AddressScheme::Threshold => 0x02,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(AddressScheme::Single),
            0x02 => Some(AddressScheme::Threshold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is not valid hex")]
    InvalidHex,
    #[error("address must be 33 bytes, got {0}")]
    InvalidLength(usize),
    #[error("unknown address scheme 0x{0:02x}")]
    UnknownScheme(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyAddress {
    scheme: AddressScheme,
    digest: [u8; 32],
}

impl KeyAddress {
    pub fn new(scheme: AddressScheme, digest: [u8; 32]) -> Self {
        Self { scheme, digest }
    }

    /// Address of a threshold master public key.
    pub fn from_threshold_key(master: &RistrettoPoint) -> Self {
        let digest = blake3::hash(master.compress().as_bytes());
        Self::new(AddressScheme::Threshold, *digest.as_bytes())
    }

    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        out[0] = self.scheme.to_byte();
        out[1..].copy_from_slice(&self.digest);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let scheme = AddressScheme::from_byte(bytes[0]).ok_or(AddressError::UnknownScheme(bytes[0]))?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[1..]);
        Ok(Self { scheme, digest })
    }
}

impl fmt::Display for KeyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for KeyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyAddress({})", self)
    }
}

impl FromStr for KeyAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| AddressError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for KeyAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
