//! Committee registry.
//!
//! The set of nodes a bootstrap or audit operates on, passed explicitly into
//! every orchestrator and verifier. Identity is positional: a node's index is
//! its position in the committee (or access) list.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CommitteeConfig;
use crate::rpc::{HttpNodeClient, NodeApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Holds a key share and operates the chain.
    Committee,
    /// Read-only replica of the committee configuration.
    Access,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Committee => write!(f, "committee"),
            NodeRole::Access => write!(f, "access"),
        }
    }
}

/// A network-addressable peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeNode {
    pub index: usize,
    /// Address used for control calls.
    pub api_address: String,
    /// `host:port` of the node's event stream.
    pub event_address: String,
}

/// A node together with the handle used to call it.
#[derive(Clone)]
pub struct RegisteredNode {
    pub node: CommitteeNode,
    pub api: Arc<dyn NodeApi>,
}

impl fmt::Debug for RegisteredNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredNode").field("node", &self.node).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitteeRegistry {
    committee: Vec<RegisteredNode>,
    access: Vec<RegisteredNode>,
}

impl CommitteeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committee node; its index is the next free position.
    pub fn with_committee_node(
        mut self,
        api_address: impl Into<String>,
        event_address: impl Into<String>,
        api: Arc<dyn NodeApi>,
    ) -> Self {
        let node = CommitteeNode {
            index: self.committee.len(),
            api_address: api_address.into(),
            event_address: event_address.into(),
        };
        self.committee.push(RegisteredNode { node, api });
        self
    }

    pub fn with_access_node(
        mut self,
        api_address: impl Into<String>,
        event_address: impl Into<String>,
        api: Arc<dyn NodeApi>,
    ) -> Self {
        let node = CommitteeNode {
            index: self.access.len(),
            api_address: api_address.into(),
            event_address: event_address.into(),
        };
        self.access.push(RegisteredNode { node, api });
        self
    }

    /// Builds a registry of HTTP clients from configuration.
    pub fn connect_http(config: &CommitteeConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut registry = Self::new();
        for endpoint in &config.nodes {
            let client = Arc::new(HttpNodeClient::new(&endpoint.api, timeout)?);
            registry = registry.with_committee_node(endpoint.api.clone(), endpoint.events.clone(), client);
        }
        for endpoint in &config.access_nodes {
            let client = Arc::new(HttpNodeClient::new(&endpoint.api, timeout)?);
            registry = registry.with_access_node(endpoint.api.clone(), endpoint.events.clone(), client);
        }
        Ok(registry)
    }

    pub fn committee(&self) -> &[RegisteredNode] {
        &self.committee
    }

    pub fn access_nodes(&self) -> &[RegisteredNode] {
        &self.access
    }

    pub fn nodes(&self, role: NodeRole) -> &[RegisteredNode] {
        match role {
            NodeRole::Committee => &self.committee,
            NodeRole::Access => &self.access,
        }
    }

    /// Committee size `N`.
    pub fn size(&self) -> usize {
        self.committee.len()
    }

    pub fn committee_api_addresses(&self) -> Vec<String> {
        self.committee.iter().map(|n| n.node.api_address.clone()).collect()
    }

    pub fn access_api_addresses(&self) -> Vec<String> {
        self.access.iter().map(|n| n.node.api_address.clone()).collect()
    }

    pub fn committee_event_addresses(&self) -> Vec<String> {
        self.committee.iter().map(|n| n.node.event_address.clone()).collect()
    }
}
