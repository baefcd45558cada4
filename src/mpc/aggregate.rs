//! Operations on shares.
//!
//! Shamir sharing is additively homomorphic: summing the fragments every dealer
//! produced for one recipient yields that recipient's share of the sum of all
//! dealers' secrets. This is how a private share is formed in the key generation.

use curve25519_dalek::scalar::Scalar;
use crate::mpc::{MpcError, share::Share};

/// Sums the fragments addressed to one recipient into its private share.
///
/// Every fragment must carry the recipient's evaluation point.
pub fn aggregate_fragments(identifier: u64, fragments: &[Share]) -> Result<Share, MpcError> {
    if fragments.is_empty() {
        return Err(MpcError::InsufficientShares);
    }
    if fragments.iter().any(|f| f.identifier != identifier) {
        return Err(MpcError::InvalidShareIndex);
    }
    let value: Scalar = fragments.iter().map(|f| f.value).sum();
    Share::new(identifier, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::quorum::deal_fragments;
    use crate::mpc::reconstruct::reconstruct_secret;
    use rand_core::OsRng;

    #[test]
    fn test_aggregate_columns() {
        let n = 4;
        let t = 3;
        let dealt: Vec<Vec<Share>> = (0..n).map(|_| deal_fragments(t, n, &mut OsRng).unwrap()).collect();
        let joint: Scalar = dealt.iter().map(|row| reconstruct_secret(row).unwrap()).sum();

        let private: Vec<Share> = (0..n)
            .map(|c| {
                let column: Vec<Share> = dealt.iter().map(|row| row[c].clone()).collect();
                aggregate_fragments((c + 1) as u64, &column).unwrap()
            })
            .collect();

        assert_eq!(reconstruct_secret(&private[1..]).unwrap(), joint);
    }

    #[test]
    fn test_aggregate_rejects_foreign_fragment() {
        let a = Share::new(1, Scalar::ONE).unwrap();
        let b = Share::new(2, Scalar::ONE).unwrap();
        assert_eq!(aggregate_fragments(1, &[a, b]), Err(MpcError::InvalidShareIndex));
        assert_eq!(aggregate_fragments(1, &[]), Err(MpcError::InsufficientShares));
    }
}
