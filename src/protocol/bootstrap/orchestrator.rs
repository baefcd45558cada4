//! Bootstrap Orchestrator.
//!
//! Drives a chain bootstrap through its states, one transition at a time.

use std::sync::Arc;

use super::{
    BootstrapError, BootstrapFailure, BootstrapOutcome, BootstrapParams, BootstrapProgress,
    BootstrapState,
};
use crate::address::KeyAddress;
use crate::committee::CommitteeRecord;
use crate::config::BootstrapConfig;
use crate::dkg::DkgOrchestrator;
use crate::events::{EventError, EventPattern, Subscription, TOPIC_ACTIVE_COMMITTEE, TOPIC_STATE};
use crate::fanout::{self, PartialFailure};
use crate::ledger::{AnchorReceipt, AnchorRequest, LedgerClient, LedgerError};
use crate::registry::{CommitteeRegistry, NodeRole, RegisteredNode};
use crate::rpc::types::ActivateRequest;

pub struct ChainBootstrap {
    registry: Arc<CommitteeRegistry>,
    ledger: Arc<dyn LedgerClient>,
    config: BootstrapConfig,
}

/// State carried between transitions of one run.
#[derive(Default)]
struct Run {
    subscription: Option<Subscription>,
    access_failures: Option<PartialFailure>,
}

impl ChainBootstrap {
    pub fn new(registry: Arc<CommitteeRegistry>, ledger: Arc<dyn LedgerClient>, config: BootstrapConfig) -> Self {
        Self { registry, ledger, config }
    }

    /// Bootstraps a new chain from scratch.
    pub async fn bootstrap(&self, params: &BootstrapParams) -> Result<BootstrapOutcome, BootstrapError> {
        self.resume(params, BootstrapProgress::default()).await
    }

    /// Continues a bootstrap from `progress`, typically taken from a
    /// `BootstrapError`. Completed states are not repeated.
    pub async fn resume(
        &self,
        params: &BootstrapParams,
        mut progress: BootstrapProgress,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        if progress.state != BootstrapState::Idle {
            log::info!("resuming bootstrap from {}", progress.state);
        }
        let mut run = Run::default();

        while let Some(target) = progress.state.next() {
            log::info!("bootstrap: {} -> {}", progress.state, target);
            let step = match target {
                BootstrapState::Idle => Ok(()),
                BootstrapState::KeysGenerated => self.generate_keys(params, &mut progress).await,
                BootstrapState::LedgerAnchored => self.anchor(params, &mut progress).await,
                BootstrapState::ConfigReplicated => self.replicate(params, &mut progress, &mut run).await,
                BootstrapState::Activated => self.activate(&progress, &mut run).await,
                BootstrapState::Confirmed => self.confirm(&progress, &mut run).await,
            };
            if let Err(failure) = step {
                if let Some(sub) = run.subscription.take() {
                    sub.close();
                }
                let err = BootstrapError { progress, target, failure };
                log::warn!("{}", err);
                return Err(err);
            }
            progress.state = target;
            log::info!("bootstrap reached {}", target);
        }

        match (progress.address, progress.anchor, progress.record) {
            (Some(address), Some(anchor), Some(record)) => Ok(BootstrapOutcome {
                address,
                anchor,
                record,
                access_failures: run.access_failures,
            }),
            (address, anchor, record) => Err(BootstrapError {
                progress: BootstrapProgress { state: BootstrapState::Confirmed, address, anchor, record },
                target: BootstrapState::Confirmed,
                failure: BootstrapFailure::InvalidProgress("confirmed without address, anchor and record"),
            }),
        }
    }

    async fn generate_keys(&self, params: &BootstrapParams, progress: &mut BootstrapProgress) -> Result<(), BootstrapFailure> {
        let dkg = DkgOrchestrator::new(self.registry.clone(), self.config.rpc_timeout());
        progress.address = Some(dkg.run_dkg(params.threshold).await?);
        Ok(())
    }

    async fn anchor(&self, params: &BootstrapParams, progress: &mut BootstrapProgress) -> Result<(), BootstrapFailure> {
        let address = require_address(progress)?;
        let req = AnchorRequest {
            address,
            owner: params.owner.clone(),
            description: params.description.clone(),
            args: params.args.clone(),
        };

        let ledger = self.ledger.clone();
        let posted = tokio::time::timeout(self.config.ledger_timeout(), async move {
            let receipt = ledger.post_anchor(req).await?;
            log::info!("anchoring transaction {} posted, awaiting confirmation", receipt.tx_id);
            ledger.await_confirmation(&receipt.tx_id).await?;
            Ok::<_, LedgerError>(receipt)
        })
        .await
        .map_err(|_| LedgerError::Timeout)??;

        log::info!("chain {} anchored with color {}", address, posted.color);
        progress.anchor = Some(posted);
        Ok(())
    }

    async fn replicate(
        &self,
        params: &BootstrapParams,
        progress: &mut BootstrapProgress,
        run: &mut Run,
    ) -> Result<(), BootstrapFailure> {
        let address = require_address(progress)?;
        let anchor = require_anchor(progress)?;
        let record = CommitteeRecord {
            chain_id: address.to_string(),
            owner: params.owner.clone(),
            derived_color: anchor.color,
            committee_nodes: self.registry.committee_api_addresses(),
            access_nodes: self.registry.access_api_addresses(),
        };

        let timeout = self.config.rpc_timeout();
        let push = |node: &RegisteredNode| {
            let api = node.api.clone();
            let record = record.clone();
            async move { api.put_committee_record(record).await }
        };
        let (committee, access) = futures::join!(
            fanout::for_nodes(self.registry.committee(), timeout, push),
            fanout::for_nodes(self.registry.access_nodes(), timeout, push),
        );

        if let Some(failure) = access.partial_failure(NodeRole::Access, self.registry.access_nodes()) {
            log::warn!("access node replication incomplete: {}", failure);
            run.access_failures = Some(failure);
        }
        if let Some(failure) = committee.partial_failure(NodeRole::Committee, self.registry.committee()) {
            return Err(BootstrapFailure::Nodes(failure));
        }

        progress.record = Some(record);
        Ok(())
    }

    /// Subscribes, then activates every committee node.
    ///
    /// Frames are not replayed: an event published before a node's stream is
    /// attached on its side is lost, and the node then shows up as silent in
    /// the confirmation report. A resume from `Activated` asks again.
    async fn activate(&self, progress: &BootstrapProgress, run: &mut Run) -> Result<(), BootstrapFailure> {
        let address = require_address(progress)?;
        let subscription = self.subscribe().await?;
        run.subscription = Some(subscription);
        self.send_activate(&address).await
    }

    async fn confirm(&self, progress: &BootstrapProgress, run: &mut Run) -> Result<(), BootstrapFailure> {
        let address = require_address(progress)?;
        let subscription = match run.subscription.take() {
            Some(subscription) => subscription,
            None => {
                // Resumed after activation: the events may already be gone, so
                // ask again. Activation is idempotent.
                let subscription = self.subscribe().await?;
                self.send_activate(&address).await?;
                subscription
            }
        };

        let chain_id = address.to_string();
        let index = self.config.first_state_index.to_string();
        let pattern = EventPattern::new([TOPIC_STATE, chain_id.as_str(), index.as_str()]);
        let report = subscription
            .wait_report(&[pattern], self.config.event_timeout(), self.config.confirm_mode)
            .await;
        subscription.close();

        if !report.satisfied {
            return Err(BootstrapFailure::ConfirmationTimeout { silent: report.silent_nodes() });
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, BootstrapFailure> {
        let nodes = self.registry.committee_event_addresses();
        let subscription =
            Subscription::subscribe(&nodes, &[TOPIC_STATE, TOPIC_ACTIVE_COMMITTEE], &self.config.dial).await;
        let unreachable = subscription.unreachable();
        if !nodes.is_empty() && unreachable.len() == nodes.len() {
            return Err(EventError::NoConnections.into());
        }
        if !unreachable.is_empty() {
            log::warn!("event streams of committee node(s) {:?} unreachable", unreachable);
        }
        Ok(subscription)
    }

    async fn send_activate(&self, address: &KeyAddress) -> Result<(), BootstrapFailure> {
        let chain_id = address.to_string();
        let outcome = fanout::for_nodes(self.registry.committee(), self.config.rpc_timeout(), |node| {
            let api = node.api.clone();
            let req = ActivateRequest { chain_id: chain_id.clone() };
            async move { api.activate(req).await }
        })
        .await;
        match outcome.partial_failure(NodeRole::Committee, self.registry.committee()) {
            Some(failure) => Err(BootstrapFailure::Nodes(failure)),
            None => Ok(()),
        }
    }
}

fn require_address(progress: &BootstrapProgress) -> Result<KeyAddress, BootstrapFailure> {
    progress
        .address
        .ok_or(BootstrapFailure::InvalidProgress("no committee address"))
}

fn require_anchor(progress: &BootstrapProgress) -> Result<AnchorReceipt, BootstrapFailure> {
    progress
        .anchor
        .clone()
        .ok_or(BootstrapFailure::InvalidProgress("no ledger anchor"))
}
