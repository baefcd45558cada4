//! Secret Share Definition.
//!
//! A share is a point $(x, y)$ on the polynomial used to hide the secret.
//! - $x$ (identifier): A non-zero evaluation point unique to each participant.
//! - $y$ (value): The evaluation of the polynomial at $x$, a Ristretto scalar.
//!
//! The same type carries both a single dealer's fragment for one recipient and
//! the recipient's aggregated private share.
//!
//! # Security
//! - Implements `Zeroize` and `ZeroizeOnDrop` to wipe sensitive data from memory.
//! - `Debug` implementation redacts the actual value.

use core::fmt;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};
use super::MpcError;

/// A share of a secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// The x-coordinate (1..=n).
    /// Public information (who owns the share).
    #[zeroize(skip)]
    pub identifier: u64,

    /// The y-coordinate.
    /// Highly sensitive information.
    pub value: Scalar,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("identifier", &self.identifier)
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

impl Share {
    /// Creates a new share with validation.
    ///
    /// # Errors
    /// * `MpcError::InvalidShareIndex` if `identifier` is zero.
    pub fn new(identifier: u64, value: Scalar) -> Result<Self, MpcError> {
        if identifier == 0 {
            return Err(MpcError::InvalidShareIndex);
        }
        Ok(Self { identifier, value })
    }

    /// Decodes a share value from its hex wire form.
    ///
    /// Only canonical scalar encodings are accepted.
    pub fn from_hex(identifier: u64, encoded: &str) -> Result<Self, MpcError> {
        let bytes = Zeroizing::new(hex::decode(encoded).map_err(|_| MpcError::MalformedEncoding)?);
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| MpcError::MalformedEncoding)?;
        let value: Option<Scalar> = Scalar::from_canonical_bytes(raw).into();
        Self::new(identifier, value.ok_or(MpcError::MalformedEncoding)?)
    }

    /// Encodes the share value as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.value.as_bytes())
    }

    /// The public counterpart `value·G`.
    pub fn public(&self) -> RistrettoPoint {
        RistrettoPoint::mul_base(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_creation() {
        let s = Share::new(1, Scalar::from(10u64)).unwrap();
        assert_eq!(s.identifier, 1);
        assert_eq!(s.value, Scalar::from(10u64));
    }

    #[test]
    fn test_share_validation() {
        assert_eq!(Share::new(0, Scalar::ONE), Err(MpcError::InvalidShareIndex));
    }

    #[test]
    fn test_hex_encoding() {
        let s = Share::new(3, Scalar::from(0xdead_beefu64)).unwrap();
        let decoded = Share::from_hex(3, &s.to_hex()).unwrap();
        assert_eq!(decoded, s);

        assert_eq!(Share::from_hex(3, "zz"), Err(MpcError::MalformedEncoding));
        assert_eq!(Share::from_hex(3, "00ff"), Err(MpcError::MalformedEncoding));
        // Non-canonical: all bits set is above the group order.
        assert_eq!(Share::from_hex(3, &"ff".repeat(32)), Err(MpcError::MalformedEncoding));
    }

    #[test]
    fn test_debug_redaction() {
        let s = Share::new(5, Scalar::from(255u64)).unwrap();
        let debug_str = format!("{:?}", s);
        assert!(debug_str.contains("identifier: 5"));
        assert!(debug_str.contains("***SENSITIVE***"));
        assert!(!debug_str.contains("255"));
    }
}
