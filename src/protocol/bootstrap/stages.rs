//! Bootstrap States.
//!
//! The states a chain bootstrap moves through, strictly in order. There is no
//! branching and no rollback: a failure leaves the bootstrap in the last state
//! it fully reached.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The ordered states of a chain bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BootstrapState {
    /// 0. Nothing done yet.
    Idle,
    /// 1. Committee key generated; every node agrees on the address.
    KeysGenerated,
    /// 2. Chain anchored on the ledger and confirmed.
    LedgerAnchored,
    /// 3. Committee record stored on every committee node.
    ConfigReplicated,
    /// 4. Every committee node accepted the activation call.
    Activated,
    /// 5. Every committee node reported the chain's first state.
    Confirmed,
}

impl BootstrapState {
    /// Returns the next state, or `None` once confirmed.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::KeysGenerated),
            Self::KeysGenerated => Some(Self::LedgerAnchored),
            Self::LedgerAnchored => Some(Self::ConfigReplicated),
            Self::ConfigReplicated => Some(Self::Activated),
            Self::Activated => Some(Self::Confirmed),
            Self::Confirmed => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == Self::Confirmed
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::KeysGenerated => "KeysGenerated",
            Self::LedgerAnchored => "LedgerAnchored",
            Self::ConfigReplicated => "ConfigReplicated",
            Self::Activated => "Activated",
            Self::Confirmed => "Confirmed",
        };
        f.write_str(name)
    }
}
