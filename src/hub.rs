//! The live-observer connection hub.
//!
//! The hub owns the registry of currently connected observers and fans a
//! broadcast message out to all of them with best-effort semantics: no
//! delivery guarantee, no retry, no cross-observer ordering. Failure
//! isolation is per connection — a dead or stalled observer is removed
//! from the registry without affecting delivery to the rest.
//!
//! Each connection's lifecycle is `Connecting -> Open -> Closed`, with
//! `Closed` terminal: a connection leaves the registry on peer close, on
//! send failure, or through an explicit [`ConnectionHub::disconnect`].

use metrics::counter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Default capacity of the per-connection outbound queue.
///
/// The queue decouples broadcast fan-out from the socket write loop; a
/// connection whose queue is full counts as failed and is removed.
const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// One live observer connection, handed to the transport task at connect
/// time. Dropping the handle closes the outbound queue, which the next
/// broadcast observes as a send failure.
pub struct ConnectionHandle {
    id: u64,
    outbound: mpsc::Receiver<String>,
}

impl ConnectionHandle {
    /// The registry identifier assigned at connect time.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receives the next broadcast message, or `None` once the connection
    /// has been removed from the registry.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }
}

/// Registry of live observer connections.
///
/// `connect`, `disconnect`, and `broadcast` may be called concurrently
/// from independent tasks. Registry mutation happens under a write lock;
/// broadcast snapshots the registry under a read lock and performs every
/// enqueue outside of it, so no lock is ever held across a send.
pub struct ConnectionHub {
    connections: RwLock<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl ConnectionHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates an empty hub with a custom per-connection queue capacity.
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity,
        }
    }

    /// Registers a new observer and returns its handle.
    pub async fn connect(&self) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.connections.write().await.insert(id, tx);
        counter!("hub_connections_total").increment(1);
        debug!(conn_id = id, "observer connected");
        ConnectionHandle { id, outbound: rx }
    }

    /// Removes a connection from the registry.
    ///
    /// Idempotent: disconnecting an id that was already removed (or never
    /// existed) is a no-op.
    pub async fn disconnect(&self, id: u64) {
        if self.connections.write().await.remove(&id).is_some() {
            debug!(conn_id = id, "observer disconnected");
        }
    }

    /// Sends `message` to every currently registered connection.
    ///
    /// A connection whose enqueue fails (peer gone, or queue full because
    /// the observer stopped draining) is removed from the registry; the
    /// remaining connections still get their delivery attempt. Returns the
    /// number of connections the message was handed to.
    pub async fn broadcast(&self, message: &str) -> usize {
        let snapshot: Vec<(u64, mpsc::Sender<String>)> = {
            let conns = self.connections.read().await;
            conns.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in &snapshot {
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    counter!("hub_broadcast_drops_total").increment(1);
                    warn!(conn_id = id, error = %e, "dropping observer after failed send");
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut conns = self.connections.write().await;
            for id in dead {
                conns.remove(&id);
            }
        }

        debug!(recipients = delivered, "broadcast delivered");
        delivered
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}
