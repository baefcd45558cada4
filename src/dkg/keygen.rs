//! Node-side key generation.
//!
//! Answers the three DKG rounds for one node and keeps the resulting share
//! keyed by the committee address. Sessions live only until commit; a session
//! whose aggregation or commit fails is dropped.

use std::collections::HashMap;

use curve25519_dalek::ristretto::RistrettoPoint;
use parking_lot::Mutex;
use rand_core::OsRng;
use thiserror::Error;

use crate::address::KeyAddress;
use crate::committee::PublicKeyInfo;
use crate::mpc::aggregate::aggregate_fragments;
use crate::mpc::quorum::{deal_fragments, validate_threshold};
use crate::mpc::reconstruct::{interpolate_public, verify_public_shares};
use crate::mpc::share::Share;
use crate::mpc::{decode_point, encode_point, evaluation_point, MpcError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyGenError {
    #[error("session {0} already exists")]
    DuplicateSession(u64),
    #[error("unknown session {0}")]
    UnknownSession(u64),
    #[error("invalid parameters: index={index}, N={n}, T={t}")]
    InvalidParameters { index: usize, n: usize, t: usize },
    #[error("session {session} is for index {expected}, got {got}")]
    IndexMismatch { session: u64, expected: usize, got: usize },
    #[error("expected {expected} entries, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("session {0} has not been aggregated")]
    NotAggregated(u64),
    #[error("own public share does not match the committed vector")]
    OwnShareMismatch,
    #[error("unknown key {0}")]
    UnknownKey(String),
    #[error(transparent)]
    Mpc(#[from] MpcError),
}

struct PendingSession {
    index: usize,
    n: usize,
    t: usize,
    share: Option<Share>,
}

/// A committed threshold key, as held by one participant.
struct StoredKey {
    master: RistrettoPoint,
    n: usize,
    t: usize,
    index: usize,
    pub_keys: Vec<RistrettoPoint>,
    share: Share,
}

#[derive(Default)]
pub struct KeyGenerator {
    sessions: Mutex<HashMap<u64, PendingSession>>,
    keys: Mutex<HashMap<KeyAddress, StoredKey>>,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round 1: deals `n` fragments of a fresh secret, one per recipient.
    pub fn new_key(&self, session: u64, index: usize, n: usize, t: usize) -> Result<Vec<String>, KeyGenError> {
        if index >= n || validate_threshold(t, n).is_err() {
            return Err(KeyGenError::InvalidParameters { index, n, t });
        }
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session) {
            return Err(KeyGenError::DuplicateSession(session));
        }
        let fragments = deal_fragments(t, n, &mut OsRng)?;
        sessions.insert(session, PendingSession { index, n, t, share: None });
        Ok(fragments.iter().map(Share::to_hex).collect())
    }

    /// Round 2: sums the fragments addressed to this node and returns the
    /// resulting public share.
    ///
    /// Repeating the call with the same fragments returns the same answer.
    pub fn aggregate_key(&self, session: u64, index: usize, fragments: &[String]) -> Result<String, KeyGenError> {
        let mut sessions = self.sessions.lock();
        let pending = sessions.get_mut(&session).ok_or(KeyGenError::UnknownSession(session))?;
        let aggregated = aggregate_pending(pending, session, index, fragments);
        if aggregated.is_err() {
            sessions.remove(&session);
        }
        aggregated
    }

    /// Round 3: checks the full public share vector and derives the address.
    ///
    /// Every public share must lie on the degree `t - 1` polynomial fixed by the
    /// first `t`, and this node's own entry must match what it reported in round 2.
    pub fn commit_key(&self, session: u64, pub_shares: &[String]) -> Result<KeyAddress, KeyGenError> {
        // A commit attempt consumes the session whatever its outcome.
        let pending = self
            .sessions
            .lock()
            .remove(&session)
            .ok_or(KeyGenError::UnknownSession(session))?;
        let PendingSession { index, n, t, share } = pending;
        let share = share.ok_or(KeyGenError::NotAggregated(session))?;
        if pub_shares.len() != n {
            return Err(KeyGenError::WrongLength { expected: n, got: pub_shares.len() });
        }

        let pub_keys = pub_shares
            .iter()
            .map(|p| decode_point(p))
            .collect::<Result<Vec<_>, _>>()?;
        if pub_keys[index] != share.public() {
            return Err(KeyGenError::OwnShareMismatch);
        }

        let points: Vec<(u64, RistrettoPoint)> = pub_keys
            .iter()
            .enumerate()
            .map(|(i, p)| (evaluation_point(i), *p))
            .collect();
        verify_public_shares(&points, t)?;
        let master = interpolate_public(&points[..t])?;
        let address = KeyAddress::from_threshold_key(&master);

        log::debug!("session {} committed to {}", session, address);
        self.keys.lock().insert(
            address,
            StoredKey { master, n, t, index, pub_keys, share },
        );
        Ok(address)
    }

    pub fn has_key(&self, address: &KeyAddress) -> bool {
        self.keys.lock().contains_key(address)
    }

    pub fn pub_key_info(&self, address: &KeyAddress) -> Result<PublicKeyInfo, KeyGenError> {
        let keys = self.keys.lock();
        let key = keys
            .get(address)
            .ok_or_else(|| KeyGenError::UnknownKey(address.to_string()))?;
        Ok(PublicKeyInfo {
            address: address.to_string(),
            master_pub_key: encode_point(&key.master),
            n: key.n as u16,
            t: key.t as u16,
            index: key.index as u16,
            pub_keys: key.pub_keys.iter().map(encode_point).collect(),
        })
    }

    /// This node's aggregated private share of `address`.
    pub fn private_share(&self, address: &KeyAddress) -> Option<Share> {
        self.keys.lock().get(address).map(|k| k.share.clone())
    }
}

fn aggregate_pending(
    pending: &mut PendingSession,
    session: u64,
    index: usize,
    fragments: &[String],
) -> Result<String, KeyGenError> {
    if pending.index != index {
        return Err(KeyGenError::IndexMismatch { session, expected: pending.index, got: index });
    }
    if fragments.len() != pending.n {
        return Err(KeyGenError::WrongLength { expected: pending.n, got: fragments.len() });
    }

    let x = evaluation_point(index);
    let decoded = fragments
        .iter()
        .map(|f| Share::from_hex(x, f))
        .collect::<Result<Vec<_>, _>>()?;
    let share = aggregate_fragments(x, &decoded)?;
    let public = encode_point(&share.public());
    pending.share = Some(share);
    Ok(public)
}
