//! Consistency verification between copies of the same result.
//!
//! Pure functions. Load-bearing fields must match exactly; access node lists
//! are ignored because replicas legitimately differ in them.

use super::{CommitteeRecord, PublicKeyInfo};

/// Names of the load-bearing record fields on which `a` and `b` differ.
pub fn record_differences(a: &CommitteeRecord, b: &CommitteeRecord) -> Vec<&'static str> {
    let mut diff = Vec::new();
    if a.chain_id != b.chain_id {
        diff.push("chainId");
    }
    if a.owner != b.owner {
        diff.push("owner");
    }
    if a.derived_color != b.derived_color {
        diff.push("derivedColor");
    }
    // Order-sensitive: position is committee identity.
    if a.committee_nodes != b.committee_nodes {
        diff.push("committeeNodes");
    }
    diff
}

pub fn consistent_records(a: &CommitteeRecord, b: &CommitteeRecord) -> bool {
    record_differences(a, b).is_empty()
}

/// Names of the key-info fields on which `a` and `b` differ.
///
/// `index` is per node and is never compared.
pub fn key_info_differences(a: &PublicKeyInfo, b: &PublicKeyInfo) -> Vec<&'static str> {
    let mut diff = Vec::new();
    if a.master_pub_key != b.master_pub_key {
        diff.push("masterPubKey");
    }
    if a.n != b.n {
        diff.push("N");
    }
    if a.t != b.t {
        diff.push("T");
    }
    if a.pub_keys != b.pub_keys {
        diff.push("pubKeys");
    }
    diff
}

pub fn consistent_key_info(a: &PublicKeyInfo, b: &PublicKeyInfo) -> bool {
    key_info_differences(a, b).is_empty()
}
