//! Quorum logic for Shamir sharing over the Ristretto scalar field.
//!
//! A dealer draws a random polynomial of degree `t - 1` and evaluates it once
//! per recipient. Each evaluation is one fragment; on its own a fragment says
//! nothing about the dealer's intercept, and any `t` of them determine it.
//!
//! # Security
//! - **Zeroization**: Polynomial coefficients are zeroized after use.
//! - **Validation**: Checks threshold parameters (`1 <= t <= n`).

use curve25519_dalek::scalar::Scalar;
use rand_core::CryptoRngCore;
use crate::mpc::{evaluation_point, MpcError, share::Share};
use crate::mpc::polynomial::Polynomial;

/// Checks `1 <= t <= n`.
pub fn validate_threshold(t: usize, n: usize) -> Result<(), MpcError> {
    if t == 0 || t > n {
        return Err(MpcError::InvalidThreshold);
    }
    Ok(())
}

/// Deals `n` fragments of a fresh random secret, any `t` of which reconstruct it.
///
/// Fragment `c` (zero-based) is addressed to the recipient at position `c` and
/// carries evaluation point `c + 1`.
pub fn deal_fragments<R: CryptoRngCore + ?Sized>(
    t: usize,
    n: usize,
    rng: &mut R,
) -> Result<Vec<Share>, MpcError> {
    validate_threshold(t, n)?;

    let poly = Polynomial::random(t - 1, rng);
    (0..n)
        .map(|c| {
            let x = evaluation_point(c);
            Share::new(x, poly.evaluate(Scalar::from(x)))
        })
        .collect()
}
