//! In-memory ledger for local committees and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{AnchorReceipt, AnchorRequest, LedgerClient, LedgerError};
use crate::address::{AddressScheme, KeyAddress};

const COLOR_CONTEXT: &str = "committee-bootstrap 2024 chain color";

struct Anchored {
    request: AnchorRequest,
    receipt: AnchorReceipt,
    confirmed_at: Instant,
}

/// Anchors chains in a process-local table.
///
/// Transactions confirm `confirmation_delay` after they are posted. Posting the
/// same request twice returns the original receipt.
pub struct MemoryLedger {
    confirmation_delay: Duration,
    reject: AtomicBool,
    anchors: Mutex<HashMap<KeyAddress, Anchored>>,
    by_tx: Mutex<HashMap<String, KeyAddress>>,
}

impl MemoryLedger {
    pub fn new(confirmation_delay: Duration) -> Self {
        Self {
            confirmation_delay,
            reject: AtomicBool::new(false),
            anchors: Mutex::new(HashMap::new()),
            by_tx: Mutex::new(HashMap::new()),
        }
    }

    /// While set, every post is rejected.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn anchored(&self, address: &KeyAddress) -> Option<AnchorReceipt> {
        self.anchors.lock().get(address).map(|a| a.receipt.clone())
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.lock().len()
    }

    fn receipt_for(req: &AnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let body = serde_json::to_vec(req).map_err(|e| LedgerError::Rejected(e.to_string()))?;
        let tx_id = blake3::hash(&body).to_hex().to_string();

        let mut hasher = blake3::Hasher::new_derive_key(COLOR_CONTEXT);
        hasher.update(&req.address.to_bytes());
        hasher.update(tx_id.as_bytes());
        let color = hasher.finalize().to_hex().to_string();

        Ok(AnchorReceipt { tx_id, color })
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn post_anchor(&self, req: AnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("ledger is rejecting transactions".into()));
        }
        if req.address.scheme() != AddressScheme::Threshold {
            return Err(LedgerError::Rejected(format!("{} is not a threshold address", req.address)));
        }

        let mut anchors = self.anchors.lock();
        if let Some(existing) = anchors.get(&req.address) {
            if existing.request == req {
                return Ok(existing.receipt.clone());
            }
            return Err(LedgerError::Rejected(format!("{} is already anchored", req.address)));
        }

        let receipt = Self::receipt_for(&req)?;
        log::debug!("anchoring {} in tx {}", req.address, receipt.tx_id);
        self.by_tx.lock().insert(receipt.tx_id.clone(), req.address);
        anchors.insert(
            req.address,
            Anchored {
                request: req,
                receipt: receipt.clone(),
                confirmed_at: Instant::now() + self.confirmation_delay,
            },
        );
        Ok(receipt)
    }

    async fn await_confirmation(&self, tx_id: &str) -> Result<(), LedgerError> {
        let confirmed_at = {
            let address = self
                .by_tx
                .lock()
                .get(tx_id)
                .copied()
                .ok_or_else(|| LedgerError::Rejected(format!("unknown transaction {}", tx_id)))?;
            self.anchors
                .lock()
                .get(&address)
                .map(|a| a.confirmed_at)
                .ok_or_else(|| LedgerError::Rejected(format!("unknown transaction {}", tx_id)))?
        };
        tokio::time::sleep_until(confirmed_at).await;
        Ok(())
    }
}
