//! Chain Bootstrap.
//!
//! Brings a new chain into operation with a freshly generated committee key:
//! key generation, ledger anchoring, configuration replication, activation and
//! confirmation, in that order (see `stages`).
//!
//! A failure reports the last state reached together with the progress made
//! so far. Key generation cannot be cheaply redone, so a failed bootstrap is
//! continued with `ChainBootstrap::resume` rather than started over.

pub mod orchestrator;
pub mod stages;

pub use orchestrator::ChainBootstrap;
pub use stages::BootstrapState;

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::KeyAddress;
use crate::committee::CommitteeRecord;
use crate::dkg::DkgError;
use crate::events::EventError;
use crate::fanout::PartialFailure;
use crate::ledger::{AnchorReceipt, LedgerError, RequestArgs};
use crate::registry::NodeRole;

/// What to bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapParams {
    /// Owner recorded on the ledger and in the committee record.
    pub owner: String,
    /// Signing threshold `T` of the committee key.
    pub threshold: usize,
    #[serde(default)]
    pub description: String,
    /// Extra arguments for the anchoring transaction.
    #[serde(default)]
    pub args: RequestArgs,
}

impl BootstrapParams {
    pub fn new(owner: impl Into<String>, threshold: usize) -> Self {
        Self {
            owner: owner.into(),
            threshold,
            description: String::new(),
            args: RequestArgs::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_args(mut self, args: RequestArgs) -> Self {
        self.args = self.args.merge(args);
        self
    }
}

/// How far a bootstrap got, and what it produced on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapProgress {
    pub state: BootstrapState,
    pub address: Option<KeyAddress>,
    pub anchor: Option<AnchorReceipt>,
    pub record: Option<CommitteeRecord>,
}

impl Default for BootstrapProgress {
    fn default() -> Self {
        Self {
            state: BootstrapState::Idle,
            address: None,
            anchor: None,
            record: None,
        }
    }
}

/// A confirmed chain.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub address: KeyAddress,
    pub anchor: AnchorReceipt,
    pub record: CommitteeRecord,
    /// Access nodes that did not take the record. Not fatal.
    pub access_failures: Option<PartialFailure>,
}

#[derive(Debug, Error)]
pub enum BootstrapFailure {
    #[error("key generation failed: {0}")]
    Dkg(#[from] DkgError),

    #[error("ledger anchoring failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("committee nodes failed: {0}")]
    Nodes(PartialFailure),

    #[error("event subscription failed: {0}")]
    Subscription(#[from] EventError),

    /// The confirmation wait ran out; `silent` nodes never reported.
    #[error("activation not confirmed by committee node(s) {silent:?}")]
    ConfirmationTimeout { silent: Vec<usize> },

    /// Resumed with progress that lacks what its state implies.
    #[error("inconsistent progress: {0}")]
    InvalidProgress(&'static str),
}

impl BootstrapFailure {
    /// Committee indices the failure is attributed to.
    pub fn failed_nodes(&self) -> Vec<usize> {
        match self {
            BootstrapFailure::Dkg(e) => e.failed_nodes(),
            BootstrapFailure::Nodes(f) => f.failed_indices(NodeRole::Committee),
            BootstrapFailure::ConfirmationTimeout { silent } => silent.clone(),
            _ => Vec::new(),
        }
    }
}

/// A bootstrap stopped on its way from `progress.state` to `target`.
#[derive(Debug)]
pub struct BootstrapError {
    pub progress: BootstrapProgress,
    pub target: BootstrapState,
    pub failure: BootstrapFailure,
}

impl BootstrapError {
    /// Last state fully reached.
    pub fn last_state(&self) -> BootstrapState {
        self.progress.state
    }

    pub fn failed_nodes(&self) -> Vec<usize> {
        self.failure.failed_nodes()
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bootstrap failed at {} -> {}: {}",
            self.progress.state, self.target, self.failure
        )
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}
