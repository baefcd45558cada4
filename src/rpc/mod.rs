//! Node control RPC.
//!
//! `NodeApi` is the seam between the orchestration logic and a committee node.
//! The HTTP client in `client` speaks the JSON wire shapes in `types` to remote
//! nodes; `crate::node::LocalNode` implements the same trait in-process.

pub mod client;
pub mod types;

pub use client::HttpNodeClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::committee::{CommitteeRecord, PublicKeyInfo};
use types::{
    ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
    CommitKeyResponse, GetPubKeyInfoRequest, NewKeyRequest, NewKeyResponse,
};

/// Errors from a single call to a single node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The node could not be reached (dial or transport failure).
    #[error("node unreachable: {0}")]
    Unreachable(String),
    /// No answer before the deadline.
    #[error("call timed out")]
    Timeout,
    /// The node answered with an application error.
    #[error("node rejected request: {0}")]
    Rejected(String),
    /// The answer could not be decoded or had the wrong shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl NodeError {
    /// Unreachable and timed-out nodes may answer on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, NodeError::Unreachable(_) | NodeError::Timeout)
    }
}

/// Control operations every committee node answers.
///
/// All operations must be idempotent: a fanned-out call that missed its
/// deadline may still complete after the caller has moved on.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// `POST /newkey`: deal one private-share fragment per participant.
    async fn new_key(&self, req: NewKeyRequest) -> Result<NewKeyResponse, NodeError>;

    /// `POST /aggregatekey`: sum the fragments addressed to this node.
    async fn aggregate_key(&self, req: AggregateKeyRequest) -> Result<AggregateKeyResponse, NodeError>;

    /// `POST /commitkey`: derive and store the committee address.
    async fn commit_key(&self, req: CommitKeyRequest) -> Result<CommitKeyResponse, NodeError>;

    /// `POST /getpubkeyinfo`
    async fn get_pub_key_info(&self, req: GetPubKeyInfoRequest) -> Result<PublicKeyInfo, NodeError>;

    /// `POST /putcommitteerecord`
    async fn put_committee_record(&self, record: CommitteeRecord) -> Result<(), NodeError>;

    /// `POST /getcommitteerecord`
    async fn get_committee_record(&self, chain_id: String) -> Result<CommitteeRecord, NodeError>;

    /// `POST /activate`
    async fn activate(&self, req: ActivateRequest) -> Result<(), NodeError>;
}
