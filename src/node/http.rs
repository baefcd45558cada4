//! HTTP surface of a node.
//!
//! Serves `NodeApi` over the JSON wire shapes in `rpc::types`. Application
//! errors are answered with `400` and an `{"error": ...}` body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::committee::{CommitteeRecord, PublicKeyInfo};
use crate::rpc::types::{
    Ack, ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
    CommitKeyResponse, GetCommitteeRecordRequest, GetPubKeyInfoRequest, NewKeyRequest,
    NewKeyResponse,
};
use crate::rpc::{NodeApi, NodeError};

type NodeState = Arc<dyn NodeApi>;

struct ApiError(NodeError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            NodeError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            NodeError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            NodeError::Rejected(_) | NodeError::Malformed(_) => StatusCode::BAD_REQUEST,
        };
        let msg = match self.0 {
            NodeError::Rejected(msg) => msg,
            other => other.to_string(),
        };
        (status, Json(Ack::err(msg))).into_response()
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        ApiError(err)
    }
}

pub fn router(node: NodeState) -> Router {
    Router::new()
        .route("/newkey", post(new_key))
        .route("/aggregatekey", post(aggregate_key))
        .route("/commitkey", post(commit_key))
        .route("/getpubkeyinfo", post(get_pub_key_info))
        .route("/putcommitteerecord", post(put_committee_record))
        .route("/getcommitteerecord", post(get_committee_record))
        .route("/activate", post(activate))
        .with_state(node)
}

/// Serves `node` on `listener` until the task is aborted.
pub fn serve(listener: TcpListener, node: NodeState) -> JoinHandle<()> {
    let app = router(node);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::warn!("node API server stopped: {}", e);
        }
    })
}

/// Binds `addr` and serves `node` on it. Returns the bound address.
pub async fn bind(addr: &str, node: NodeState) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    log::info!("node API listening on {}", local);
    Ok((local, serve(listener, node)))
}

async fn new_key(
    State(node): State<NodeState>,
    Json(req): Json<NewKeyRequest>,
) -> Result<Json<NewKeyResponse>, ApiError> {
    Ok(Json(node.new_key(req).await?))
}

async fn aggregate_key(
    State(node): State<NodeState>,
    Json(req): Json<AggregateKeyRequest>,
) -> Result<Json<AggregateKeyResponse>, ApiError> {
    Ok(Json(node.aggregate_key(req).await?))
}

async fn commit_key(
    State(node): State<NodeState>,
    Json(req): Json<CommitKeyRequest>,
) -> Result<Json<CommitKeyResponse>, ApiError> {
    Ok(Json(node.commit_key(req).await?))
}

async fn get_pub_key_info(
    State(node): State<NodeState>,
    Json(req): Json<GetPubKeyInfoRequest>,
) -> Result<Json<PublicKeyInfo>, ApiError> {
    Ok(Json(node.get_pub_key_info(req).await?))
}

async fn put_committee_record(
    State(node): State<NodeState>,
    Json(record): Json<CommitteeRecord>,
) -> Result<Json<Ack>, ApiError> {
    node.put_committee_record(record).await?;
    Ok(Json(Ack::ok()))
}

async fn get_committee_record(
    State(node): State<NodeState>,
    Json(req): Json<GetCommitteeRecordRequest>,
) -> Result<Json<CommitteeRecord>, ApiError> {
    Ok(Json(node.get_committee_record(req.chain_id).await?))
}

async fn activate(
    State(node): State<NodeState>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<Ack>, ApiError> {
    node.activate(req).await?;
    Ok(Json(Ack::ok()))
}
