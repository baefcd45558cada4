//! Distributed Key Generation.
//!
//! Three strictly sequential rounds, each a full fan-out to all `N` nodes:
//! 1. share generation (`/newkey`): every node deals one fragment per recipient;
//! 2. aggregation (`/aggregatekey`): each recipient sums its column into a
//!    private share and returns the public share;
//! 3. commit (`/commitkey`): every node derives the address from the full
//!    public share vector; all answers must be byte-identical.
//!
//! The orchestrator only relays opaque fragments. Nodes run `KeyGenerator`.
//! Any failure in any round discards the session.

pub mod keygen;
pub mod orchestrator;
pub mod session;

pub use keygen::{KeyGenError, KeyGenerator};
pub use orchestrator::DkgOrchestrator;
pub use session::DkgSession;

use core::fmt;
use thiserror::Error;

use crate::fanout::PartialFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkgRound {
    ShareGeneration,
    Aggregation,
    Commit,
}

impl fmt::Display for DkgRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DkgRound::ShareGeneration => write!(f, "round 1 (share generation)"),
            DkgRound::Aggregation => write!(f, "round 2 (aggregation)"),
            DkgRound::Commit => write!(f, "round 3 (commit)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkgError {
    #[error("invalid key generation parameters: N={n}, T={t}")]
    InvalidParameters { n: usize, t: usize },

    /// One or more nodes failed to answer a round.
    #[error("{round} failed: {failures}")]
    RoundFailed {
        round: DkgRound,
        failures: PartialFailure,
    },

    /// A node answered with something that cannot be trusted.
    #[error("protocol violation in {round} by node {node}: {reason}")]
    ProtocolViolation {
        round: DkgRound,
        node: usize,
        reason: String,
    },
}

impl DkgError {
    /// Committee indices implicated in the failure.
    pub fn failed_nodes(&self) -> Vec<usize> {
        match self {
            DkgError::InvalidParameters { .. } => Vec::new(),
            DkgError::RoundFailed { failures, .. } => failures.failures.iter().map(|f| f.index).collect(),
            DkgError::ProtocolViolation { node, .. } => vec![*node],
        }
    }
}
