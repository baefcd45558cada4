//! Ledger anchoring.
//!
//! The bootstrap records a freshly generated committee on the ledger before
//! any node is configured. How the transaction is built and confirmed is the
//! ledger client's business; the bootstrap only needs a transaction id and the
//! color minted for the chain.

pub mod args;
pub mod memory;

pub use args::{ArgValue, RequestArgs};
pub use memory::MemoryLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::KeyAddress;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
    #[error("ledger did not confirm in time")]
    Timeout,
}

/// Request to anchor a new chain controlled by `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub address: KeyAddress,
    pub owner: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub args: RequestArgs,
}

/// What the ledger reports for an accepted anchoring transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_id: String,
    /// Token color derived for the new chain.
    pub color: String,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Builds and posts the anchoring transaction.
    async fn post_anchor(&self, req: AnchorRequest) -> Result<AnchorReceipt, LedgerError>;

    /// Returns once the transaction is confirmed.
    async fn await_confirmation(&self, tx_id: &str) -> Result<(), LedgerError>;
}
