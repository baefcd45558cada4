//! Committee configuration records and public key descriptions.
//!
//! A `CommitteeRecord` is created once per chain by the bootstrap and replicated
//! to every committee and access node. `consistency` decides whether two copies
//! obtained from different nodes agree on what matters.

pub mod consistency;

pub use consistency::{consistent_key_info, consistent_records, key_info_differences, record_differences};

use serde::{Deserialize, Serialize};

use crate::address::{AddressError, KeyAddress};

/// Per-node description of a chain and the committee operating it.
///
/// The chain is identified by the committee's threshold address, so
/// `chain_id` is the text form of the derived key address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeRecord {
    pub chain_id: String,
    pub owner: String,
    /// Token color minted by the anchoring transaction.
    pub derived_color: String,
    /// API addresses of the committee nodes, in committee index order.
    pub committee_nodes: Vec<String>,
    /// Read-only replicas. Allowed to differ between copies.
    #[serde(default)]
    pub access_nodes: Vec<String>,
}

impl CommitteeRecord {
    /// Parses `chain_id` as the committee address.
    pub fn address(&self) -> Result<KeyAddress, AddressError> {
        self.chain_id.parse()
    }
}

/// What a node reports about a threshold key it holds a share of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyInfo {
    pub address: String,
    pub master_pub_key: String,
    #[serde(rename = "N")]
    pub n: u16,
    #[serde(rename = "T")]
    pub t: u16,
    /// Position of the reporting node; differs between nodes.
    pub index: u16,
    pub pub_keys: Vec<String>,
}
