//! Event streams and pattern waits.
//!
//! Nodes publish space-delimited text frames, one per line, on a TCP stream:
//! `<topic> <chainOrAddress> [extra...]`. A `Subscription` holds one connection
//! per node and blocks callers until a set of `EventPattern`s has been observed.

pub mod pattern;
pub mod subscription;

pub use pattern::{parse_frame, EventMessage, EventPattern};
pub use subscription::{Subscription, WaitReport};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOPIC_STATE: &str = "state";
pub const TOPIC_ACTIVE_COMMITTEE: &str = "active_committee";
pub const TOPIC_DISMISSED_COMMITTEE: &str = "dismissed_committee";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to bind event publisher on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no subscribed node is reachable")]
    NoConnections,
}

/// How many subscribed nodes must report a pattern before it counts as seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// At least one node.
    Any,
    /// A strict majority of the subscribed nodes.
    Quorum,
    /// Every subscribed node.
    #[default]
    All,
}

impl WaitMode {
    pub fn required(self, subscribed: usize) -> usize {
        match self {
            WaitMode::Any => 1,
            WaitMode::Quorum => subscribed / 2 + 1,
            WaitMode::All => subscribed.max(1),
        }
    }
}
