use std::sync::Arc;
use std::time::Duration;

use super::{DkgError, DkgRound, DkgSession};
use crate::address::{AddressScheme, KeyAddress};
use crate::fanout;
use crate::mpc::share::Share;
use crate::mpc::{decode_point, evaluation_point};
use crate::registry::{CommitteeRegistry, NodeRole};
use crate::rpc::types::{AggregateKeyRequest, CommitKeyRequest, NewKeyRequest};

/// Drives the three key generation rounds across the committee.
pub struct DkgOrchestrator {
    registry: Arc<CommitteeRegistry>,
    timeout: Duration,
}

impl DkgOrchestrator {
    /// `timeout` bounds each round as a whole.
    pub fn new(registry: Arc<CommitteeRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Runs a fresh session over every committee node and returns the
    /// address all of them committed to.
    pub async fn run_dkg(&self, threshold: usize) -> Result<KeyAddress, DkgError> {
        let mut session = DkgSession::new(self.registry.size(), threshold)?;
        log::info!(
            "starting key generation session {:016x}: N={}, T={}",
            session.id(),
            session.n(),
            session.t()
        );

        self.share_generation(&mut session).await?;
        self.aggregation(&mut session).await?;
        self.commit(&mut session).await?;

        // commit() only returns Ok after setting the address.
        session.address().ok_or(DkgError::ProtocolViolation {
            round: DkgRound::Commit,
            node: 0,
            reason: "no address committed".into(),
        })
    }

    async fn share_generation(&self, session: &mut DkgSession) -> Result<(), DkgError> {
        let round = DkgRound::ShareGeneration;
        log::info!("{} started", round);
        let nodes = self.registry.committee();
        let (id, n, t) = (session.id(), session.n() as u16, session.t() as u16);

        let outcome = fanout::for_nodes(nodes, self.timeout, |node| {
            let api = node.api.clone();
            let req = NewKeyRequest { session_id: id, index: node.node.index as u16, n, t };
            async move { api.new_key(req).await }
        })
        .await;
        let responses = outcome
            .into_values(NodeRole::Committee, nodes)
            .map_err(|failures| DkgError::RoundFailed { round, failures })?;

        let mut rows = Vec::with_capacity(responses.len());
        for (node, resp) in responses.into_iter().enumerate() {
            if resp.pri_shares.len() != session.n() {
                return Err(DkgError::ProtocolViolation {
                    round,
                    node,
                    reason: format!("expected {} fragments, got {}", session.n(), resp.pri_shares.len()),
                });
            }
            // Decoded only to check the encoding; dropping zeroizes the value.
            for (recipient, fragment) in resp.pri_shares.iter().enumerate() {
                if let Err(e) = Share::from_hex(evaluation_point(recipient), fragment) {
                    return Err(DkgError::ProtocolViolation {
                        round,
                        node,
                        reason: format!("fragment for node {} is malformed: {}", recipient, e),
                    });
                }
            }
            rows.push(resp.pri_shares);
        }
        session.set_fragments(rows);
        log::info!("{} complete", round);
        Ok(())
    }

    async fn aggregation(&self, session: &mut DkgSession) -> Result<(), DkgError> {
        let round = DkgRound::Aggregation;
        log::info!("{} started", round);
        let nodes = self.registry.committee();
        let id = session.id();

        let outcome = fanout::for_nodes(nodes, self.timeout, |node| {
            let api = node.api.clone();
            let req = AggregateKeyRequest {
                session_id: id,
                index: node.node.index as u16,
                pri_shares: session.column(node.node.index),
            };
            async move { api.aggregate_key(req).await }
        })
        .await;
        let responses = outcome
            .into_values(NodeRole::Committee, nodes)
            .map_err(|failures| DkgError::RoundFailed { round, failures })?;

        for (node, resp) in responses.iter().enumerate() {
            if resp.pub_share.is_empty() {
                return Err(DkgError::ProtocolViolation { round, node, reason: "empty public share".into() });
            }
            if let Err(e) = decode_point(&resp.pub_share) {
                return Err(DkgError::ProtocolViolation {
                    round,
                    node,
                    reason: format!("public share {:?} is not a group element: {}", resp.pub_share, e),
                });
            }
        }
        session.set_pub_shares(responses.into_iter().map(|r| r.pub_share).collect());
        log::info!("{} complete", round);
        Ok(())
    }

    async fn commit(&self, session: &mut DkgSession) -> Result<(), DkgError> {
        let round = DkgRound::Commit;
        log::info!("{} started", round);
        let nodes = self.registry.committee();
        let id = session.id();
        let pub_shares = session.pub_shares().to_vec();

        let outcome = fanout::for_nodes(nodes, self.timeout, |node| {
            let api = node.api.clone();
            let req = CommitKeyRequest { session_id: id, pub_shares: pub_shares.clone() };
            async move { api.commit_key(req).await }
        })
        .await;
        let responses = outcome
            .into_values(NodeRole::Committee, nodes)
            .map_err(|failures| DkgError::RoundFailed { round, failures })?;

        let mut agreed: Option<KeyAddress> = None;
        for (node, resp) in responses.iter().enumerate() {
            let address: KeyAddress = resp.address.parse().map_err(|e| DkgError::ProtocolViolation {
                round,
                node,
                reason: format!("unparseable address {:?}: {}", resp.address, e),
            })?;
            if resp.address != address.to_string() {
                return Err(DkgError::ProtocolViolation {
                    round,
                    node,
                    reason: format!("address {:?} is not in canonical form", resp.address),
                });
            }
            if address.scheme() != AddressScheme::Threshold {
                return Err(DkgError::ProtocolViolation {
                    round,
                    node,
                    reason: format!("address {} is not a threshold key", address),
                });
            }
            match agreed {
                None => agreed = Some(address),
                Some(expected) if expected != address => {
                    return Err(DkgError::ProtocolViolation {
                        round,
                        node,
                        reason: format!("address {} differs from {}", address, expected),
                    });
                }
                Some(_) => {}
            }
        }

        let address = agreed.ok_or(DkgError::InvalidParameters { n: 0, t: session.t() })?;
        session.set_address(address);
        log::info!("{} complete: committee address {}", round, address);
        Ok(())
    }
}
