//! Subscriptions to node event streams.
//!
//! One reader task per node funnels parsed frames into a single channel; the
//! waiting caller is the only consumer, so pattern bookkeeping needs no lock.
//!
//! Dialing is retried with bounded exponential backoff because nodes start at
//! slightly different times. A stream lost after the initial dial is not
//! re-dialled: the wait simply runs into its deadline.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::pattern::{parse_frame, EventMessage, EventPattern};
use super::WaitMode;
use crate::config::DialConfig;

const CHANNEL_CAPACITY: usize = 1024;

/// Result of a pattern wait with per-node detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReport {
    pub satisfied: bool,
    /// `seen[p][node]` is true once `node` reported pattern `p`.
    pub seen: Vec<Vec<bool>>,
}

impl WaitReport {
    /// Nodes that did not report every pattern.
    pub fn silent_nodes(&self) -> Vec<usize> {
        let nodes = self.seen.first().map(Vec::len).unwrap_or(0);
        (0..nodes)
            .filter(|&node| self.seen.iter().any(|per_node| !per_node[node]))
            .collect()
    }
}

pub struct Subscription {
    nodes: Vec<String>,
    connected: Vec<bool>,
    rx: Mutex<mpsc::Receiver<EventMessage>>,
    readers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Subscription {
    /// Connects to every node in `nodes` (`host:port`), keeping frames whose
    /// topic is in `topics`. An empty topic list keeps everything.
    ///
    /// Nodes that stay unreachable after all dial attempts are reported by
    /// `unreachable()`; the subscription is still usable for the others.
    pub async fn subscribe(nodes: &[String], topics: &[&str], dial: &DialConfig) -> Self {
        let topics: Arc<Vec<String>> = Arc::new(topics.iter().map(|t| t.to_string()).collect());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let streams = join_all(nodes.iter().map(|addr| dial_with_backoff(addr, dial))).await;

        let mut connected = Vec::with_capacity(nodes.len());
        let mut readers = Vec::with_capacity(nodes.len());
        for (sender, stream) in streams.into_iter().enumerate() {
            match stream {
                Some(stream) => {
                    connected.push(true);
                    readers.push(tokio::spawn(read_frames(
                        sender,
                        nodes[sender].clone(),
                        stream,
                        topics.clone(),
                        tx.clone(),
                    )));
                }
                None => connected.push(false),
            }
        }
        log::info!(
            "subscribed to {}/{} event streams, topics {:?}",
            readers.len(),
            nodes.len(),
            topics
        );

        Self {
            nodes: nodes.to_vec(),
            connected,
            rx: Mutex::new(rx),
            readers: parking_lot::Mutex::new(readers),
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Positions of nodes whose initial dial never succeeded.
    pub fn unreachable(&self) -> Vec<usize> {
        self.connected
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(i, _)| i)
            .collect()
    }

    /// Blocks until every pattern is satisfied under `mode` or `timeout` elapses.
    pub async fn wait_for_patterns(&self, patterns: &[EventPattern], timeout: Duration, mode: WaitMode) -> bool {
        self.wait_report(patterns, timeout, mode).await.satisfied
    }

    pub async fn wait_for_pattern(&self, pattern: &EventPattern, timeout: Duration) -> bool {
        self.wait_for_patterns(core::slice::from_ref(pattern), timeout, WaitMode::Any).await
    }

    /// Like `wait_for_patterns`, also reporting which node reported which pattern.
    pub async fn wait_report(&self, patterns: &[EventPattern], timeout: Duration, mode: WaitMode) -> WaitReport {
        let deadline = Instant::now() + timeout;
        let required = mode.required(self.nodes.len());
        let mut seen = vec![vec![false; self.nodes.len()]; patterns.len()];

        let satisfied = |seen: &[Vec<bool>]| {
            seen.iter()
                .all(|per_node| per_node.iter().filter(|s| **s).count() >= required)
        };

        let mut rx = self.rx.lock().await;
        loop {
            if satisfied(&seen) {
                return WaitReport { satisfied: true, seen };
            }
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        for (p, pattern) in patterns.iter().enumerate() {
                            if pattern.matches(&msg.fields) {
                                if let Some(slot) = seen[p].get_mut(msg.sender) {
                                    *slot = true;
                                }
                            }
                        }
                    }
                    None => {
                        // Every stream is gone; nothing more can arrive.
                        tokio::time::sleep_until(deadline).await;
                        return WaitReport { satisfied: false, seen };
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    log::warn!("pattern wait timed out after {:?}", timeout);
                    return WaitReport { satisfied: false, seen };
                }
            }
        }
    }

    /// Closes every per-node connection. Safe to call more than once.
    pub fn close(&self) {
        let readers: Vec<JoinHandle<()>> = self.readers.lock().drain(..).collect();
        if !readers.is_empty() {
            log::debug!("closing {} event streams", readers.len());
        }
        for reader in readers {
            reader.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

async fn dial_with_backoff(addr: &str, dial: &DialConfig) -> Option<TcpStream> {
    let attempts = dial.max_attempts.max(1);
    let mut backoff = dial.initial_backoff();

    for attempt in 1..=attempts {
        let err = match tokio::time::timeout(dial.connect_timeout(), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Some(stream),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "connect timed out".to_string(),
        };
        if attempt == attempts {
            log::warn!("giving up on event stream {} after {} attempts: {}", addr, attempts, err);
            break;
        }
        log::warn!(
            "dial {} failed (attempt {}/{}): {}; retrying in {:?}",
            addr,
            attempt,
            attempts,
            err,
            backoff
        );
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(dial.max_backoff());
    }
    None
}

async fn read_frames(
    sender: usize,
    addr: String,
    stream: TcpStream,
    topics: Arc<Vec<String>>,
    tx: mpsc::Sender<EventMessage>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(fields) = parse_frame(&line) else {
                    continue;
                };
                if !topics.is_empty() && !topics.iter().any(|t| *t == fields[0]) {
                    log::debug!("dropping frame from {} with topic {}", addr, fields[0]);
                    continue;
                }
                if tx.send(EventMessage { sender, fields }).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                log::warn!("event stream from {} closed", addr);
                return;
            }
            Err(e) => {
                log::warn!("event stream from {} failed: {}", addr, e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn fast_dial() -> DialConfig {
        DialConfig {
            max_attempts: 3,
            initial_backoff_ms: 20,
            max_backoff_ms: 50,
            connect_timeout_ms: 500,
        }
    }

    /// Accepts one connection and writes `frames` to it, then holds it open.
    async fn feeding_node(frames: Vec<&'static str>, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(delay).await;
            for frame in frames {
                socket.write_all(format!("{}\n", frame).as_bytes()).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_pattern_satisfied_before_timeout() {
        let addr = feeding_node(vec!["state X 1 extra"], Duration::from_millis(20)).await;
        let sub = Subscription::subscribe(&[addr], &["state"], &fast_dial()).await;

        let started = Instant::now();
        let ok = sub
            .wait_for_patterns(&[EventPattern::new(["state", "X", "1"])], Duration::from_secs(5), WaitMode::All)
            .await;
        assert!(ok);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_times_out_at_deadline() {
        let addr = feeding_node(vec!["state X 0"], Duration::ZERO).await;
        let sub = Subscription::subscribe(&[addr], &["state"], &fast_dial()).await;

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let ok = sub
            .wait_for_patterns(&[EventPattern::new(["state", "X", "1"])], timeout, WaitMode::Any)
            .await;
        let elapsed = started.elapsed();

        assert!(!ok);
        assert!(elapsed >= timeout, "returned early: {:?}", elapsed);
        assert!(elapsed < timeout + Duration::from_millis(250), "returned late: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_topic_filter_and_quorum() {
        let a = feeding_node(vec!["other X 1", "state X 1"], Duration::from_millis(10)).await;
        let b = feeding_node(vec!["state X 1"], Duration::from_millis(10)).await;
        let c = feeding_node(vec![], Duration::ZERO).await;
        let sub = Subscription::subscribe(&[a, b, c], &["state"], &fast_dial()).await;

        let patterns = [EventPattern::new(["state", "X", "1"])];
        assert!(sub.wait_for_patterns(&patterns, Duration::from_secs(5), WaitMode::Quorum).await);

        let report = sub.wait_report(&patterns, Duration::from_millis(100), WaitMode::All).await;
        assert!(!report.satisfied);
    }

    #[tokio::test]
    async fn test_unreachable_node_reported() {
        let live = feeding_node(vec!["state X 1"], Duration::from_millis(10)).await;
        let dead = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().to_string()
        };
        let sub = Subscription::subscribe(&[live, dead], &[], &fast_dial()).await;
        assert_eq!(sub.unreachable(), vec![1]);

        let report = sub
            .wait_report(&[EventPattern::new(["state", "X"])], Duration::from_millis(300), WaitMode::All)
            .await;
        assert!(!report.satisfied);
        assert_eq!(report.silent_nodes(), vec![1]);
    }

    #[tokio::test]
    async fn test_dial_retries_until_node_starts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"active_committee X\n").await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let dial = DialConfig { max_attempts: 10, ..fast_dial() };
        let sub = Subscription::subscribe(&[addr.to_string()], &[], &dial).await;
        assert!(sub.unreachable().is_empty());
        assert!(
            sub.wait_for_pattern(&EventPattern::new(["active_committee", "X"]), Duration::from_secs(5))
                .await
        );
        late.abort();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let addr = feeding_node(vec![], Duration::ZERO).await;
        let sub = Subscription::subscribe(&[addr], &[], &fast_dial()).await;
        sub.close();
        sub.close();
        assert!(
            !sub.wait_for_pattern(&EventPattern::new(["state"]), Duration::from_millis(50))
                .await
        );
    }
}
