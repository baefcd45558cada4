//! Committee audit.
//!
//! Queries every node for its view of a key or a chain and compares each
//! answer against the first one obtained. The result is a report, never an
//! error: a node that cannot be reached is listed but does not fail the check
//! on its own; a node that answers differently does.

use core::fmt;
use std::time::Duration;

use crate::address::KeyAddress;
use crate::committee::{key_info_differences, record_differences, CommitteeRecord, PublicKeyInfo};
use crate::fanout::{self, FanOutOutcome};
use crate::registry::{CommitteeRegistry, NodeRole, RegisteredNode};
use crate::rpc::types::GetPubKeyInfoRequest;
use crate::rpc::NodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// First reachable node; the others are compared against it.
    Reference,
    Consistent,
    Inconsistent { differing: Vec<&'static str> },
    /// Reachable, but refused or garbled the query.
    Failed(NodeError),
    Unreachable(NodeError),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Reference | Verdict::Consistent | Verdict::Unreachable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub role: NodeRole,
    pub index: usize,
    pub address: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeReport {
    pub entries: Vec<AuditEntry>,
    /// At least one node answered and no reachable node disagreed.
    pub passed: bool,
}

impl CommitteeReport {
    /// Nodes that failed the check.
    pub fn failed(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| !e.verdict.passed())
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.verdict, Verdict::Unreachable(_)))
    }
}

impl fmt::Display for CommitteeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "audit {}", if self.passed { "passed" } else { "FAILED" })?;
        for e in &self.entries {
            writeln!(f, "  {} #{} {}: {:?}", e.role, e.index, e.address, e.verdict)?;
        }
        Ok(())
    }
}

/// Compares every committee node's description of the key behind `address`.
pub async fn check_committee(registry: &CommitteeRegistry, address: &KeyAddress, timeout: Duration) -> CommitteeReport {
    let nodes = registry.committee();
    let address = address.to_string();
    let outcome = fanout::for_nodes(nodes, timeout, |node| {
        let api = node.api.clone();
        let req = GetPubKeyInfoRequest { address: address.clone() };
        async move { api.get_pub_key_info(req).await }
    })
    .await;

    let answers = collect(NodeRole::Committee, nodes, outcome);
    compare(answers, |a: &PublicKeyInfo, b: &PublicKeyInfo| key_info_differences(a, b))
}

/// Compares the committee record for `chain_id` across committee and access nodes.
pub async fn check_records(registry: &CommitteeRegistry, chain_id: &str, timeout: Duration) -> CommitteeReport {
    let query = |node: &RegisteredNode| {
        let api = node.api.clone();
        let chain_id = chain_id.to_string();
        async move { api.get_committee_record(chain_id).await }
    };
    let (committee, access) = futures::join!(
        fanout::for_nodes(registry.committee(), timeout, query),
        fanout::for_nodes(registry.access_nodes(), timeout, query),
    );

    let mut answers = collect(NodeRole::Committee, registry.committee(), committee);
    answers.extend(collect(NodeRole::Access, registry.access_nodes(), access));
    compare(answers, |a: &CommitteeRecord, b: &CommitteeRecord| record_differences(a, b))
}

type Answer<T> = (NodeRole, usize, String, Result<T, NodeError>);

fn collect<T>(role: NodeRole, nodes: &[RegisteredNode], outcome: FanOutOutcome<T>) -> Vec<Answer<T>> {
    outcome
        .results
        .into_iter()
        .map(|r| {
            let address = nodes
                .get(r.index)
                .map(|n| n.node.api_address.clone())
                .unwrap_or_default();
            (role, r.index, address, r.result)
        })
        .collect()
}

fn compare<T, F>(answers: Vec<Answer<T>>, differences: F) -> CommitteeReport
where
    F: Fn(&T, &T) -> Vec<&'static str>,
{
    let mut reference: Option<T> = None;
    let mut entries = Vec::with_capacity(answers.len());

    for (role, index, address, result) in answers {
        let verdict = match result {
            Err(e) if e.is_transient() => Verdict::Unreachable(e),
            Err(e) => Verdict::Failed(e),
            Ok(value) => match &reference {
                None => {
                    reference = Some(value);
                    Verdict::Reference
                }
                Some(expected) => {
                    let differing = differences(expected, &value);
                    if differing.is_empty() {
                        Verdict::Consistent
                    } else {
                        Verdict::Inconsistent { differing }
                    }
                }
            },
        };
        entries.push(AuditEntry { role, index, address, verdict });
    }

    let passed = reference.is_some() && entries.iter().all(|e| e.verdict.passed());
    let report = CommitteeReport { entries, passed };
    if report.passed {
        log::info!("audit passed ({} node(s))", report.entries.len());
    } else {
        log::warn!("{}", report);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::{
        ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
        CommitKeyResponse, NewKeyRequest, NewKeyResponse,
    };
    use crate::rpc::NodeApi;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Answers record queries only.
    struct RecordHolder(Result<CommitteeRecord, NodeError>);

    #[async_trait]
    impl NodeApi for RecordHolder {
        async fn new_key(&self, _: NewKeyRequest) -> Result<NewKeyResponse, NodeError> {
            unimplemented!()
        }
        async fn aggregate_key(&self, _: AggregateKeyRequest) -> Result<AggregateKeyResponse, NodeError> {
            unimplemented!()
        }
        async fn commit_key(&self, _: CommitKeyRequest) -> Result<CommitKeyResponse, NodeError> {
            unimplemented!()
        }
        async fn get_pub_key_info(&self, _: GetPubKeyInfoRequest) -> Result<PublicKeyInfo, NodeError> {
            Err(NodeError::Rejected("no keys".into()))
        }
        async fn put_committee_record(&self, _: CommitteeRecord) -> Result<(), NodeError> {
            Ok(())
        }
        async fn get_committee_record(&self, _: String) -> Result<CommitteeRecord, NodeError> {
            self.0.clone()
        }
        async fn activate(&self, _: ActivateRequest) -> Result<(), NodeError> {
            Ok(())
        }
    }

    fn record() -> CommitteeRecord {
        CommitteeRecord {
            chain_id: "02aa".into(),
            owner: "owner".into(),
            derived_color: "c0".into(),
            committee_nodes: vec!["n0".into(), "n1".into(), "n2".into()],
            access_nodes: vec![],
        }
    }

    fn registry(answers: Vec<Result<CommitteeRecord, NodeError>>, access: Vec<Result<CommitteeRecord, NodeError>>) -> CommitteeRegistry {
        let mut registry = CommitteeRegistry::new();
        for (i, answer) in answers.into_iter().enumerate() {
            registry = registry.with_committee_node(format!("n{}", i), "", Arc::new(RecordHolder(answer)));
        }
        for (i, answer) in access.into_iter().enumerate() {
            registry = registry.with_access_node(format!("a{}", i), "", Arc::new(RecordHolder(answer)));
        }
        registry
    }

    #[tokio::test]
    async fn test_unreachable_node_does_not_fail() {
        let registry = registry(
            vec![Err(NodeError::Unreachable("down".into())), Ok(record()), Ok(record())],
            vec![],
        );
        let report = check_records(&registry, "02aa", Duration::from_secs(1)).await;
        assert!(report.passed);
        assert_eq!(report.entries[1].verdict, Verdict::Reference);
        assert_eq!(report.entries[2].verdict, Verdict::Consistent);
        assert_eq!(report.unreachable().count(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_node_fails() {
        let mut other = record();
        other.derived_color = "c1".into();
        let mut replica = record();
        replica.access_nodes = vec!["a0".into()];
        let registry = registry(vec![Ok(record()), Ok(other), Ok(record())], vec![Ok(replica)]);

        let report = check_records(&registry, "02aa", Duration::from_secs(1)).await;
        assert!(!report.passed);
        let failed: Vec<_> = report.failed().map(|e| (e.role, e.index)).collect();
        assert_eq!(failed, vec![(NodeRole::Committee, 1)]);
        assert_eq!(
            report.entries[1].verdict,
            Verdict::Inconsistent { differing: vec!["derivedColor"] }
        );
        assert_eq!(report.entries[3].verdict, Verdict::Consistent);
    }

    #[tokio::test]
    async fn test_nothing_reachable_fails() {
        let registry = registry(vec![Err(NodeError::Timeout), Err(NodeError::Unreachable("x".into()))], vec![]);
        let report = check_records(&registry, "02aa", Duration::from_secs(1)).await;
        assert!(!report.passed);
        assert_eq!(report.failed().count(), 0);
    }

    #[tokio::test]
    async fn test_rejecting_node_fails_key_check() {
        let registry = registry(vec![Ok(record())], vec![]);
        let address: KeyAddress = format!("02{}", "11".repeat(32)).parse().unwrap();
        let report = check_committee(&registry, &address, Duration::from_secs(1)).await;
        assert!(!report.passed);
        assert!(matches!(report.entries[0].verdict, Verdict::Failed(NodeError::Rejected(_))));
    }
}
