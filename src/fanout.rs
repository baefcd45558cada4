//! Fan-out execution.
//!
//! Runs independent calls concurrently under one overall deadline and reports
//! per-call outcomes. The result vector always has one entry per call; a call
//! that has not returned by the deadline is reported as `NodeError::Timeout`.
//! Stragglers keep running on the runtime and are drained in the background.
//!
//! No retries happen here. Callers decide which failures are fatal.

use core::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::registry::{NodeRole, RegisteredNode};
use crate::rpc::NodeError;

/// One unit of work, tagged with the index of the node it targets.
pub struct FanOutCall<T> {
    pub index: usize,
    call: BoxFuture<'static, Result<T, NodeError>>,
}

impl<T> FanOutCall<T> {
    pub fn new<F>(index: usize, call: F) -> Self
    where
        F: Future<Output = Result<T, NodeError>> + Send + 'static,
    {
        Self { index, call: call.boxed() }
    }
}

#[derive(Debug)]
pub struct FanOutResult<T> {
    pub index: usize,
    pub result: Result<T, NodeError>,
}

#[derive(Debug)]
pub struct FanOutOutcome<T> {
    /// Same length and order as the submitted calls.
    pub results: Vec<FanOutResult<T>>,
    pub all_succeeded: bool,
}

impl<T> FanOutOutcome<T> {
    pub fn failures(&self) -> impl Iterator<Item = (usize, &NodeError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.index, e)))
    }

    /// Collects per-node failures, resolving indices against `nodes`.
    pub fn partial_failure(&self, role: NodeRole, nodes: &[RegisteredNode]) -> Option<PartialFailure> {
        if self.all_succeeded {
            return None;
        }
        let failures = self
            .failures()
            .map(|(index, error)| NodeFailure {
                role,
                index,
                address: nodes
                    .get(index)
                    .map(|n| n.node.api_address.clone())
                    .unwrap_or_default(),
                error: error.clone(),
            })
            .collect();
        Some(PartialFailure { failures })
    }

    /// All values in call order, or the per-node failures if any call failed.
    pub fn into_values(self, role: NodeRole, nodes: &[RegisteredNode]) -> Result<Vec<T>, PartialFailure> {
        if let Some(failure) = self.partial_failure(role, nodes) {
            return Err(failure);
        }
        Ok(self
            .results
            .into_iter()
            .filter_map(|r| r.result.ok())
            .collect())
    }
}

/// One node that failed within a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub role: NodeRole,
    pub index: usize,
    pub address: String,
    pub error: NodeError,
}

/// Some (possibly all) fanned-out calls failed; one entry per failed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub failures: Vec<NodeFailure>,
}

impl PartialFailure {
    pub fn failed_indices(&self, role: NodeRole) -> Vec<usize> {
        self.failures
            .iter()
            .filter(|f| f.role == role)
            .map(|f| f.index)
            .collect()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(
                f,
                " [{} #{} {}: {}]",
                failure.role, failure.index, failure.address, failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

/// Runs `calls` concurrently and returns once all finished or `timeout` elapsed.
pub async fn run<T: Send + 'static>(calls: Vec<FanOutCall<T>>, timeout: Duration) -> FanOutOutcome<T> {
    let deadline = Instant::now() + timeout;
    let total = calls.len();

    let mut results: Vec<FanOutResult<T>> = calls
        .iter()
        .map(|c| FanOutResult { index: c.index, result: Err(NodeError::Timeout) })
        .collect();

    // Capacity equals the number of senders, so a finishing task never blocks.
    let (tx, mut rx) = mpsc::channel(total.max(1));
    let mut handles = Vec::with_capacity(total);
    for (slot, call) in calls.into_iter().enumerate() {
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let result = call.call.await;
            let _ = tx.send((slot, result)).await;
        }));
    }
    drop(tx);

    let mut pending = total;
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    while pending > 0 {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Some((slot, result)) => {
                    results[slot].result = result;
                    pending -= 1;
                }
                None => break,
            },
            _ = &mut sleep => {
                log::warn!("fan-out deadline of {:?} reached with {} of {} calls outstanding", timeout, pending, total);
                break;
            }
        }
    }

    if pending > 0 {
        tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    log::debug!("fan-out straggler ended abnormally: {}", e);
                }
            }
            log::debug!("fan-out stragglers drained");
        });
    }

    let all_succeeded = results.iter().all(|r| r.result.is_ok());
    FanOutOutcome { results, all_succeeded }
}

/// Fans `make_call` out to every node in `nodes`.
pub async fn for_nodes<T, F, Fut>(nodes: &[RegisteredNode], timeout: Duration, make_call: F) -> FanOutOutcome<T>
where
    T: Send + 'static,
    F: Fn(&RegisteredNode) -> Fut,
    Fut: Future<Output = Result<T, NodeError>> + Send + 'static,
{
    let calls = nodes
        .iter()
        .map(|node| FanOutCall::new(node.node.index, make_call(node)))
        .collect();
    run(calls, timeout).await
}
