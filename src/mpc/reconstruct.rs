//! Secret reconstruction from shares.
//!
//! Lagrange interpolation at x=0, both over scalars (recovering a secret from
//! private shares) and over group elements (recovering a public key from public
//! shares without ever touching the secret).
//!
//! # Security
//! - **Validation**: Checks for duplicate and zero indices.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use crate::mpc::{MpcError, share::Share};

/// Lagrange coefficients at zero for the evaluation points `xs`.
///
/// lambda_j = product_{m != j} (x_m / (x_m - x_j))
pub fn lagrange_at_zero(xs: &[u64]) -> Result<Vec<Scalar>, MpcError> {
    if xs.is_empty() {
        return Err(MpcError::InsufficientShares);
    }
    for (i, x) in xs.iter().enumerate() {
        if *x == 0 {
            return Err(MpcError::InvalidShareIndex);
        }
        if xs[i + 1..].contains(x) {
            return Err(MpcError::DuplicateShareIndex);
        }
    }

    let lambdas = xs
        .iter()
        .map(|&xj| {
            let xj = Scalar::from(xj);
            let mut numerator = Scalar::ONE;
            let mut denominator = Scalar::ONE;
            for &xm in xs {
                let xm = Scalar::from(xm);
                if xm == xj {
                    continue;
                }
                numerator *= xm;
                denominator *= xm - xj;
            }
            numerator * denominator.invert()
        })
        .collect();
    Ok(lambdas)
}

/// Reconstructs the secret from a list of shares.
///
/// The caller is responsible for supplying at least `t` shares; with fewer the
/// result is a value unrelated to the secret.
pub fn reconstruct_secret(shares: &[Share]) -> Result<Scalar, MpcError> {
    let xs: Vec<u64> = shares.iter().map(|s| s.identifier).collect();
    let lambdas = lagrange_at_zero(&xs)?;
    Ok(shares
        .iter()
        .zip(lambdas.iter())
        .map(|(share, lambda)| share.value * lambda)
        .sum())
}

/// Interpolates the public key `f(0)·G` from public shares `(x, f(x)·G)`.
pub fn interpolate_public(points: &[(u64, RistrettoPoint)]) -> Result<RistrettoPoint, MpcError> {
    let xs: Vec<u64> = points.iter().map(|(x, _)| *x).collect();
    let lambdas = lagrange_at_zero(&xs)?;
    Ok(points
        .iter()
        .zip(lambdas.iter())
        .fold(RistrettoPoint::identity(), |acc, ((_, p), lambda)| acc + p * lambda))
}

/// Interpolates the public polynomial through `points` and evaluates it at `x`.
pub fn interpolate_public_at(
    points: &[(u64, RistrettoPoint)],
    x: u64,
) -> Result<RistrettoPoint, MpcError> {
    let xs: Vec<u64> = points.iter().map(|(xi, _)| *xi).collect();
    lagrange_at_zero(&xs)?;
    if xs.contains(&x) {
        return points
            .iter()
            .find(|(xi, _)| *xi == x)
            .map(|(_, p)| *p)
            .ok_or(MpcError::InvalidShareIndex);
    }
    let target = Scalar::from(x);
    let mut acc = RistrettoPoint::identity();
    for (j, (xj, pj)) in points.iter().enumerate() {
        let xj = Scalar::from(*xj);
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (m, (xm, _)) in points.iter().enumerate() {
            if m == j {
                continue;
            }
            let xm = Scalar::from(*xm);
            numerator *= target - xm;
            denominator *= xj - xm;
        }
        acc += pj * (numerator * denominator.invert());
    }
    Ok(acc)
}

/// Checks that every public share lies on the polynomial fixed by the first `t`.
pub fn verify_public_shares(points: &[(u64, RistrettoPoint)], t: usize) -> Result<(), MpcError> {
    if t == 0 || points.len() < t {
        return Err(MpcError::InsufficientShares);
    }
    let (basis, rest) = points.split_at(t);
    for (x, p) in rest {
        if interpolate_public_at(basis, *x)? != *p {
            return Err(MpcError::InconsistentShares);
        }
    }
    Ok(())
}
