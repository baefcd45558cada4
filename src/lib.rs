//! Committee bootstrap.
//!
//! Generates a threshold key across a committee of nodes, anchors the new
//! chain on a ledger, replicates the committee configuration and activates
//! the committee, confirming the result from the nodes' own event streams.
//!
//! The entry point is `protocol::bootstrap::ChainBootstrap`. Nodes are
//! reached through the `rpc::NodeApi` seam; `node::LocalNode` is an
//! in-process implementation of it.

pub mod address;
pub mod audit;
pub mod committee;
pub mod config;
pub mod dkg;
pub mod events;
pub mod fanout;
pub mod ledger;
pub mod mpc;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod rpc;
pub mod storage;

pub use address::{AddressScheme, KeyAddress};
pub use config::{BootstrapConfig, CommitteeConfig, Config};
pub use protocol::bootstrap::{
    BootstrapError, BootstrapOutcome, BootstrapParams, BootstrapProgress, BootstrapState, ChainBootstrap,
};
pub use registry::CommitteeRegistry;
