//! In-process committee node.
//!
//! `LocalNode` answers the node control operations itself: it takes part in
//! key generation, stores replicated committee records, activates chains and
//! publishes the resulting events. `http` serves it over the wire format and
//! `faults` wraps any node to inject failures.

pub mod events;
pub mod faults;
pub mod http;
pub mod store;

pub use events::EventPublisher;
pub use faults::{FaultyNode, Method};
pub use store::{PutOutcome, RecordStore, StoreError};

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::address::KeyAddress;
use crate::committee::{CommitteeRecord, PublicKeyInfo};
use crate::dkg::KeyGenerator;
use crate::events::{EventError, TOPIC_ACTIVE_COMMITTEE, TOPIC_DISMISSED_COMMITTEE, TOPIC_STATE};
use crate::rpc::types::{
    ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
    CommitKeyResponse, GetPubKeyInfoRequest, NewKeyRequest, NewKeyResponse,
};
use crate::rpc::{NodeApi, NodeError};

const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_millis(50);

pub struct LocalNode {
    keys: KeyGenerator,
    records: RecordStore,
    publisher: Arc<EventPublisher>,
    active: Mutex<HashSet<String>>,
    first_state_index: u64,
    activation_delay: Duration,
}

impl LocalNode {
    /// Creates a node whose event stream listens on `event_addr`.
    pub async fn bind(event_addr: &str, records: RecordStore) -> Result<Self, EventError> {
        let publisher = EventPublisher::bind(event_addr).await?;
        Ok(Self {
            keys: KeyGenerator::new(),
            records,
            publisher: Arc::new(publisher),
            active: Mutex::new(HashSet::new()),
            first_state_index: 1,
            activation_delay: DEFAULT_ACTIVATION_DELAY,
        })
    }

    pub fn with_first_state_index(mut self, index: u64) -> Self {
        self.first_state_index = index;
        self
    }

    /// Time between accepting an activation and announcing it.
    pub fn with_activation_delay(mut self, delay: Duration) -> Self {
        self.activation_delay = delay;
        self
    }

    pub fn event_addr(&self) -> SocketAddr {
        self.publisher.local_addr()
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    pub fn record(&self, chain_id: &str) -> Option<CommitteeRecord> {
        self.records.get(chain_id)
    }

    pub fn is_active(&self, chain_id: &str) -> bool {
        self.active.lock().contains(chain_id)
    }

    /// Stops operating `chain_id`. Returns whether it was active.
    pub fn dismiss(&self, chain_id: &str) -> bool {
        if !self.active.lock().remove(chain_id) {
            return false;
        }
        log::info!("dismissed committee {}", chain_id);
        self.publisher.publish(&[TOPIC_DISMISSED_COMMITTEE, chain_id]);
        true
    }

    fn announce_activation(&self, chain_id: String) {
        let publisher = self.publisher.clone();
        let delay = self.activation_delay;
        let index = self.first_state_index.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            publisher.publish(&[TOPIC_ACTIVE_COMMITTEE, chain_id.as_str()]);
            publisher.publish(&[TOPIC_STATE, chain_id.as_str(), index.as_str()]);
        });
    }
}

fn rejected(err: impl std::fmt::Display) -> NodeError {
    NodeError::Rejected(err.to_string())
}

#[async_trait]
impl NodeApi for LocalNode {
    async fn new_key(&self, req: NewKeyRequest) -> Result<NewKeyResponse, NodeError> {
        let pri_shares = self
            .keys
            .new_key(req.session_id, req.index as usize, req.n as usize, req.t as usize)
            .map_err(rejected)?;
        Ok(NewKeyResponse { pri_shares })
    }

    async fn aggregate_key(&self, req: AggregateKeyRequest) -> Result<AggregateKeyResponse, NodeError> {
        let pub_share = self
            .keys
            .aggregate_key(req.session_id, req.index as usize, &req.pri_shares)
            .map_err(rejected)?;
        Ok(AggregateKeyResponse { pub_share })
    }

    async fn commit_key(&self, req: CommitKeyRequest) -> Result<CommitKeyResponse, NodeError> {
        let address = self.keys.commit_key(req.session_id, &req.pub_shares).map_err(rejected)?;
        Ok(CommitKeyResponse { address: address.to_string() })
    }

    async fn get_pub_key_info(&self, req: GetPubKeyInfoRequest) -> Result<PublicKeyInfo, NodeError> {
        let address: KeyAddress = req.address.parse().map_err(rejected)?;
        self.keys.pub_key_info(&address).map_err(rejected)
    }

    async fn put_committee_record(&self, record: CommitteeRecord) -> Result<(), NodeError> {
        let chain_id = record.chain_id.clone();
        match self.records.put(record).map_err(rejected)? {
            PutOutcome::Stored => log::info!("stored committee record for {}", chain_id),
            PutOutcome::AccessNodesUpdated => log::info!("updated access nodes for {}", chain_id),
            PutOutcome::Unchanged => log::debug!("committee record for {} unchanged", chain_id),
        }
        Ok(())
    }

    async fn get_committee_record(&self, chain_id: String) -> Result<CommitteeRecord, NodeError> {
        self.records
            .get(&chain_id)
            .ok_or_else(|| NodeError::Rejected(format!("unknown chain {}", chain_id)))
    }

    async fn activate(&self, req: ActivateRequest) -> Result<(), NodeError> {
        let record = self
            .records
            .get(&req.chain_id)
            .ok_or_else(|| NodeError::Rejected(format!("unknown chain {}", req.chain_id)))?;
        let address = record.address().map_err(rejected)?;
        if !self.keys.has_key(&address) {
            return Err(NodeError::Rejected(format!("no key share for {}", address)));
        }

        if self.active.lock().insert(req.chain_id.clone()) {
            log::info!("activated committee {}", req.chain_id);
        } else {
            log::debug!("committee {} already active", req.chain_id);
        }
        // Announced on every call so a repeated activation can still be confirmed.
        self.announce_activation(req.chain_id);
        Ok(())
    }
}
