//! Fault injection.
//!
//! `FaultyNode` forwards to any `NodeApi` and can be told, at runtime, to
//! misbehave: drop off the network, answer slowly, fail one operation or lie
//! about the committed address.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::committee::{CommitteeRecord, PublicKeyInfo};
use crate::rpc::types::{
    ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
    CommitKeyResponse, GetPubKeyInfoRequest, NewKeyRequest, NewKeyResponse,
};
use crate::rpc::{NodeApi, NodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    NewKey,
    AggregateKey,
    CommitKey,
    GetPubKeyInfo,
    PutCommitteeRecord,
    GetCommitteeRecord,
    Activate,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    unreachable: bool,
    delay: Option<Duration>,
    failing: Vec<(Method, NodeError)>,
    commit_address: Option<String>,
}

pub struct FaultyNode {
    inner: Arc<dyn NodeApi>,
    faults: Mutex<Faults>,
}

impl FaultyNode {
    pub fn new(inner: Arc<dyn NodeApi>) -> Self {
        Self { inner, faults: Mutex::new(Faults::default()) }
    }

    /// Every call fails as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.lock().unreachable = unreachable;
    }

    /// Every call waits `delay` before being forwarded.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.faults.lock().delay = delay;
    }

    /// Calls to `method` are rejected without being forwarded.
    pub fn fail(&self, method: Method) {
        self.fail_with(method, NodeError::Rejected(format!("{:?} failed (injected)", method)));
    }

    /// Calls to `method` fail with `error` without being forwarded.
    pub fn fail_with(&self, method: Method, error: NodeError) {
        self.faults.lock().failing.push((method, error));
    }

    /// Commits go through, but the reply carries `address` instead.
    pub fn override_commit_address(&self, address: impl Into<String>) {
        self.faults.lock().commit_address = Some(address.into());
    }

    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    async fn before(&self, method: Method) -> Result<(), NodeError> {
        let faults = self.faults.lock().clone();
        if let Some(delay) = faults.delay {
            tokio::time::sleep(delay).await;
        }
        if faults.unreachable {
            return Err(NodeError::Unreachable("connection refused (injected)".into()));
        }
        if let Some((_, error)) = faults.failing.into_iter().find(|(m, _)| *m == method) {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl NodeApi for FaultyNode {
    async fn new_key(&self, req: NewKeyRequest) -> Result<NewKeyResponse, NodeError> {
        self.before(Method::NewKey).await?;
        self.inner.new_key(req).await
    }

    async fn aggregate_key(&self, req: AggregateKeyRequest) -> Result<AggregateKeyResponse, NodeError> {
        self.before(Method::AggregateKey).await?;
        self.inner.aggregate_key(req).await
    }

    async fn commit_key(&self, req: CommitKeyRequest) -> Result<CommitKeyResponse, NodeError> {
        self.before(Method::CommitKey).await?;
        let mut resp = self.inner.commit_key(req).await?;
        let overridden = self.faults.lock().commit_address.clone();
        if let Some(address) = overridden {
            resp.address = address;
        }
        Ok(resp)
    }

    async fn get_pub_key_info(&self, req: GetPubKeyInfoRequest) -> Result<PublicKeyInfo, NodeError> {
        self.before(Method::GetPubKeyInfo).await?;
        self.inner.get_pub_key_info(req).await
    }

    async fn put_committee_record(&self, record: CommitteeRecord) -> Result<(), NodeError> {
        self.before(Method::PutCommitteeRecord).await?;
        self.inner.put_committee_record(record).await
    }

    async fn get_committee_record(&self, chain_id: String) -> Result<CommitteeRecord, NodeError> {
        self.before(Method::GetCommitteeRecord).await?;
        self.inner.get_committee_record(chain_id).await
    }

    async fn activate(&self, req: ActivateRequest) -> Result<(), NodeError> {
        self.before(Method::Activate).await?;
        self.inner.activate(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{LocalNode, RecordStore};

    #[tokio::test]
    async fn test_injected_faults() {
        let inner = LocalNode::bind("127.0.0.1:0", RecordStore::in_memory()).await.unwrap();
        let node = FaultyNode::new(Arc::new(inner));
        let req = NewKeyRequest { session_id: 1, index: 0, n: 1, t: 1 };

        node.set_unreachable(true);
        assert!(node.new_key(req.clone()).await.unwrap_err().is_transient());

        node.heal();
        node.fail(Method::NewKey);
        assert!(matches!(node.new_key(req.clone()).await, Err(NodeError::Rejected(_))));

        node.heal();
        node.fail_with(Method::Activate, NodeError::Timeout);
        assert_eq!(node.new_key(req).await.unwrap().pri_shares.len(), 1);
        let err = node.activate(ActivateRequest { chain_id: "02aa".into() }).await.unwrap_err();
        assert_eq!(err, NodeError::Timeout);
    }
}
