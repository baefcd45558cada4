use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::types::{
    Ack, ActivateRequest, AggregateKeyRequest, AggregateKeyResponse, CommitKeyRequest,
    CommitKeyResponse, GetCommitteeRecordRequest, GetPubKeyInfoRequest, NewKeyRequest,
    NewKeyResponse,
};
use super::{NodeApi, NodeError};
use crate::committee::{CommitteeRecord, PublicKeyInfo};

/// Talks to one remote node over HTTP+JSON.
#[derive(Clone)]
pub struct HttpNodeClient {
    base_url: String,
    client: Client,
}

impl HttpNodeClient {
    /// `base_url` is the node's API root, e.g. `http://10.0.0.5:9090`.
    ///
    /// Fails only if the HTTP client cannot be initialised (TLS backend).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, NodeError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(classify)?;

        if !status.is_success() {
            let msg = serde_json::from_slice::<Ack>(&bytes)
                .ok()
                .and_then(|ack| ack.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(NodeError::Rejected(msg));
        }

        // Some peers report application errors in a 200 body.
        if let Ok(Ack { error: Some(msg) }) = serde_json::from_slice::<Ack>(&bytes) {
            return Err(NodeError::Rejected(msg));
        }

        serde_json::from_slice(&bytes).map_err(|e| NodeError::Malformed(format!("{}: {}", path, e)))
    }
}

fn classify(err: reqwest::Error) -> NodeError {
    if err.is_timeout() {
        NodeError::Timeout
    } else if err.is_decode() || err.is_body() {
        NodeError::Malformed(err.to_string())
    } else {
        NodeError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn new_key(&self, req: NewKeyRequest) -> Result<NewKeyResponse, NodeError> {
        self.post("newkey", &req).await
    }

    async fn aggregate_key(&self, req: AggregateKeyRequest) -> Result<AggregateKeyResponse, NodeError> {
        self.post("aggregatekey", &req).await
    }

    async fn commit_key(&self, req: CommitKeyRequest) -> Result<CommitKeyResponse, NodeError> {
        self.post("commitkey", &req).await
    }

    async fn get_pub_key_info(&self, req: GetPubKeyInfoRequest) -> Result<PublicKeyInfo, NodeError> {
        self.post("getpubkeyinfo", &req).await
    }

    async fn put_committee_record(&self, record: CommitteeRecord) -> Result<(), NodeError> {
        let _: Ack = self.post("putcommitteerecord", &record).await?;
        Ok(())
    }

    async fn get_committee_record(&self, chain_id: String) -> Result<CommitteeRecord, NodeError> {
        self.post("getcommitteerecord", &GetCommitteeRecordRequest { chain_id }).await
    }

    async fn activate(&self, req: ActivateRequest) -> Result<(), NodeError> {
        let _: Ack = self.post("activate", &req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = HttpNodeClient::new("http://127.0.0.1:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9090");
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        // Bind and immediately drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpNodeClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client
            .activate(ActivateRequest { chain_id: "x".into() })
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
