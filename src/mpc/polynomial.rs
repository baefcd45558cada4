//! Secret polynomials over the Ristretto scalar field.

use curve25519_dalek::scalar::Scalar;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// f(x) = c[0] + c[1]*x + ... + c[t-1]*x^(t-1), with c[0] the secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Polynomial {
    coeffs: Vec<Scalar>,
}

impl Polynomial {
    /// Draws a random polynomial of degree `degree`, including a random intercept.
    pub(crate) fn random<R: CryptoRngCore + ?Sized>(degree: usize, rng: &mut R) -> Self {
        let coeffs = (0..=degree).map(|_| random_scalar(rng)).collect();
        Self { coeffs }
    }

    #[cfg(test)]
    pub(crate) fn from_coefficients(coeffs: Vec<Scalar>) -> Self {
        Self { coeffs }
    }

    #[cfg(test)]
    pub(crate) fn intercept(&self) -> Scalar {
        self.coeffs.first().copied().unwrap_or(Scalar::ZERO)
    }

    /// Evaluates at `x` using Horner's method.
    pub(crate) fn evaluate(&self, x: Scalar) -> Scalar {
        self.coeffs
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coeff| acc * x + coeff)
    }
}

fn random_scalar<R: CryptoRngCore + ?Sized>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}
