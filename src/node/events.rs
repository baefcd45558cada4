//! Event stream publisher.
//!
//! Every accepted connection receives every frame published after it was
//! accepted, one line per frame. Nothing is replayed.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::EventError;

const BACKLOG: usize = 256;

pub struct EventPublisher {
    local_addr: SocketAddr,
    tx: broadcast::Sender<String>,
    acceptor: JoinHandle<()>,
    writers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EventPublisher {
    /// Listens on `addr` (`host:port`, port 0 picks a free one).
    pub async fn bind(addr: &str) -> Result<Self, EventError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| EventError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| EventError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let (tx, _) = broadcast::channel(BACKLOG);
        let writers = Arc::new(Mutex::new(Vec::new()));
        let acceptor = tokio::spawn(accept_loop(listener, tx.clone(), writers.clone()));
        log::info!("event publisher listening on {}", local_addr);

        Ok(Self { local_addr, tx, acceptor, writers })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends one frame to every connected subscriber. Returns how many there were.
    pub fn publish(&self, fields: &[&str]) -> usize {
        let frame = fields.join(" ");
        log::debug!("publishing {:?}", frame);
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Drops every current connection. New connections are still accepted.
    pub fn disconnect_all(&self) {
        for writer in self.writers.lock().drain(..) {
            writer.abort();
        }
    }
}

impl Drop for EventPublisher {
    fn drop(&mut self) {
        self.acceptor.abort();
        self.disconnect_all();
    }
}

async fn accept_loop(listener: TcpListener, tx: broadcast::Sender<String>, writers: Arc<Mutex<Vec<JoinHandle<()>>>>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                log::debug!("event subscriber {} connected", peer);
                let rx = tx.subscribe();
                let mut writers = writers.lock();
                writers.retain(|w| !w.is_finished());
                writers.push(tokio::spawn(write_frames(socket, peer, rx)));
            }
            Err(e) => {
                log::warn!("event publisher accept failed: {}", e);
            }
        }
    }
}

async fn write_frames(mut socket: TcpStream, peer: SocketAddr, mut rx: broadcast::Receiver<String>) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                let line = format!("{}\n", frame);
                if let Err(e) = socket.write_all(line.as_bytes()).await {
                    log::debug!("event subscriber {} gone: {}", peer, e);
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("event subscriber {} lagged, {} frame(s) dropped", peer, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
