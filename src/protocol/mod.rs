//! Protocol Layer.
//!
//! High-level orchestration built on the node control RPCs:
//! - Chain bootstrap (key generation through confirmed activation).

pub mod bootstrap;
