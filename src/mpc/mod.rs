//! Multi-Party Computation (MPC) and Secret Sharing.
//!
//! This module implements the threshold primitives used by the distributed key
//! generation: Shamir sharing over the scalar field of the Ristretto group, so
//! that public shares can be checked and combined "in the exponent".
//!
//! # Components
//! - `share`: Definition of a secret share (fragment or aggregated private share).
//! - `polynomial`: Random polynomial generation and evaluation.
//! - `quorum`: Dealing one fragment per recipient for a `t`-of-`n` sharing.
//! - `reconstruct`: Lagrange interpolation at zero, for scalars and points.
//! - `aggregate`: Summing fragments into a private share.
//!
//! # Security
//! - **Zeroization**: Shares and polynomial coefficients are zeroized on drop.
//! - **Redaction**: `Debug` output never shows share values.

pub mod share;
pub mod quorum;
pub mod reconstruct;
pub mod aggregate;
pub(crate) mod polynomial;

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};

use thiserror::Error;

/// Errors for MPC operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MpcError {
    /// Invalid share index (must be 1..=n).
    #[error("invalid share index")]
    InvalidShareIndex,
    /// Threshold configuration error (t > n or t == 0).
    #[error("invalid threshold")]
    InvalidThreshold,
    /// Not enough shares to reconstruct.
    #[error("insufficient shares")]
    InsufficientShares,
    /// Duplicate share indices provided.
    #[error("duplicate share index")]
    DuplicateShareIndex,
    /// Encoded share or point could not be decoded.
    #[error("malformed encoding")]
    MalformedEncoding,
    /// Public shares do not lie on a single polynomial of the expected degree.
    #[error("public shares are inconsistent")]
    InconsistentShares,
}

/// Maps a zero-based participant position to its evaluation point.
///
/// Evaluation point zero is reserved for the secret.
pub fn evaluation_point(index: usize) -> u64 {
    index as u64 + 1
}

/// Hex text form of a compressed group element.
pub fn encode_point(point: &RistrettoPoint) -> String {
    hex::encode(point.compress().as_bytes())
}

/// Parses the output of `encode_point`. Rejects non-canonical encodings.
pub fn decode_point(encoded: &str) -> Result<RistrettoPoint, MpcError> {
    let bytes = hex::decode(encoded).map_err(|_| MpcError::MalformedEncoding)?;
    CompressedRistretto::from_slice(&bytes)
        .map_err(|_| MpcError::MalformedEncoding)?
        .decompress()
        .ok_or(MpcError::MalformedEncoding)
}
