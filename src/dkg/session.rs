//! Ephemeral state of one key generation run.
//!
//! The fragment matrix is written one row per dealer after round 1 and read
//! one column per recipient in round 2. It is wiped when the session drops.

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::DkgError;
use crate::address::KeyAddress;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DkgSession {
    /// Collision avoidance only.
    #[zeroize(skip)]
    id: u64,
    #[zeroize(skip)]
    n: usize,
    #[zeroize(skip)]
    t: usize,
    /// `fragments[dealer][recipient]`, opaque encoded fragments.
    fragments: Vec<Vec<String>>,
    #[zeroize(skip)]
    pub_shares: Vec<String>,
    #[zeroize(skip)]
    address: Option<KeyAddress>,
}

impl DkgSession {
    /// Opens a session with a fresh random id. Requires `1 <= t <= n`.
    pub fn new(n: usize, t: usize) -> Result<Self, DkgError> {
        if n == 0 || t == 0 || t > n || n > u16::MAX as usize {
            return Err(DkgError::InvalidParameters { n, t });
        }
        Ok(Self {
            id: OsRng.next_u64(),
            n,
            t,
            fragments: Vec::new(),
            pub_shares: Vec::new(),
            address: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn t(&self) -> usize {
        self.t
    }

    /// Stores round 1 output, one row per dealer in dealer order.
    pub(crate) fn set_fragments(&mut self, rows: Vec<Vec<String>>) {
        debug_assert!(rows.len() == self.n && rows.iter().all(|r| r.len() == self.n));
        self.fragments = rows;
    }

    /// Fragments addressed to `recipient`, one from each dealer.
    pub(crate) fn column(&self, recipient: usize) -> Vec<String> {
        self.fragments
            .iter()
            .map(|row| row.get(recipient).cloned().unwrap_or_default())
            .collect()
    }

    /// Round 2 output, and the point after which fragments are no longer needed.
    pub(crate) fn set_pub_shares(&mut self, pub_shares: Vec<String>) {
        self.fragments.zeroize();
        self.pub_shares = pub_shares;
    }

    pub fn pub_shares(&self) -> &[String] {
        &self.pub_shares
    }

    pub(crate) fn set_address(&mut self, address: KeyAddress) {
        self.address = Some(address);
    }

    /// Set only once every node committed to the same address.
    pub fn address(&self) -> Option<KeyAddress> {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_validation() {
        assert!(DkgSession::new(4, 3).is_ok());
        assert!(DkgSession::new(1, 1).is_ok());
        assert_eq!(DkgSession::new(3, 4).err(), Some(DkgError::InvalidParameters { n: 3, t: 4 }));
        assert_eq!(DkgSession::new(3, 0).err(), Some(DkgError::InvalidParameters { n: 3, t: 0 }));
        assert_eq!(DkgSession::new(0, 0).err(), Some(DkgError::InvalidParameters { n: 0, t: 0 }));
    }

    #[test]
    fn test_columns() {
        let mut session = DkgSession::new(2, 1).unwrap();
        session.set_fragments(vec![
            vec!["a0".into(), "a1".into()],
            vec!["b0".into(), "b1".into()],
        ]);
        assert_eq!(session.column(1), vec!["a1".to_string(), "b1".to_string()]);

        session.set_pub_shares(vec!["p0".into(), "p1".into()]);
        assert!(session.fragments.is_empty());
        assert_eq!(session.pub_shares().len(), 2);
    }

    #[test]
    fn test_session_ids_differ() {
        let a = DkgSession::new(2, 2).unwrap();
        let b = DkgSession::new(2, 2).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
