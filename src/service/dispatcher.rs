//! # Connection Dispatcher
//!
//! Accepts inbound TCP connections and distributes them across a fixed pool
//! of worker slots in round-robin order.
//!
//! ## Scheduling Model
//! - One persistent worker task per pool slot, each running an event loop
//!   over the connections bound to it. Assignment is one-shot: a connection
//!   never migrates, so exactly one execution context touches its socket and
//!   read buffer, and no per-connection locking exists.
//! - The accept loop is the sole owner of the active-connection set and the
//!   round-robin cursor. Completion notifications flow back from worker
//!   slots over an mpsc channel: queued hand-off, never foreign-context
//!   mutation. Removal is idempotent.
//! - `stop` prevents new work, lets every in-flight connection run to
//!   natural completion, and joins the pool. Nothing is preempted.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::connection::{Connection, ConnectionId};
use crate::protocol::handler::Handler;
use crate::utils::metrics::global_metrics;

/// Cyclic next-slot cursor. Advances modulo the pool size, preserving
/// acceptance order: slot `i` receives connection numbers `i, i+P, i+2P, …`.
#[derive(Debug)]
pub(crate) struct SlotCursor {
    next: usize,
    slots: usize,
}

impl SlotCursor {
    pub(crate) fn new(slots: usize) -> Self {
        assert!(slots >= 1, "worker pool cannot be empty");
        Self { next: 0, slots }
    }

    /// Return the slot for the next assignment and advance the cursor.
    pub(crate) fn advance(&mut self) -> usize {
        let idx = self.next;
        self.next = (self.next + 1) % self.slots;
        idx
    }
}

/// Set of connections currently owned by the dispatcher.
///
/// Removal is idempotent: a duplicate completion notification for an
/// already-removed connection is a no-op.
#[derive(Debug, Default)]
pub(crate) struct ActiveSet {
    ids: HashSet<ConnectionId>,
}

impl ActiveSet {
    pub(crate) fn insert(&mut self, id: ConnectionId) -> bool {
        self.ids.insert(id)
    }

    /// Returns `false` when the id was not present.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> bool {
        self.ids.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Thread-safe dispatcher counters, readable from any context.
#[derive(Debug)]
pub struct DispatcherStats {
    active: AtomicU64,
    accepted_total: AtomicU64,
    per_slot: Box<[AtomicU64]>,
}

impl DispatcherStats {
    fn new(pool_size: usize) -> Self {
        Self {
            active: AtomicU64::new(0),
            accepted_total: AtomicU64::new(0),
            per_slot: (0..pool_size).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn connection_opened(&self, slot: usize) {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.accepted_total.fetch_add(1, Ordering::Relaxed);
        self.per_slot[slot].fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Connections accepted and not yet completed.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Total connections accepted since start.
    pub fn accepted_total(&self) -> u64 {
        self.accepted_total.load(Ordering::Relaxed)
    }

    /// Per-slot assignment counts, in slot order.
    pub fn slot_assignments(&self) -> Vec<u64> {
        self.per_slot
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    accept_handle: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// Accepts connections and owns the worker-slot pool for their lifetime.
pub struct Dispatcher {
    config: ServerConfig,
    handler: Arc<Handler>,
    pool_size: usize,
    stats: Arc<DispatcherStats>,
    running: Option<Running>,
}

impl Dispatcher {
    /// Build a dispatcher for `config` with the shared handler set.
    ///
    /// A configured worker count of 0 means available hardware parallelism,
    /// minimum 1. The pool size is fixed from here on.
    pub fn new(config: ServerConfig, handler: Handler) -> Self {
        let pool_size = resolve_pool_size(config.worker_threads);
        Self {
            config,
            handler: Arc::new(handler),
            pool_size,
            stats: Arc::new(DispatcherStats::new(pool_size)),
            running: None,
        }
    }

    /// Number of worker slots in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Dispatcher counters (active connections, per-slot assignments).
    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Connections accepted and not yet completed.
    pub fn active_connections(&self) -> u64 {
        self.stats.active()
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Bind the listener and start the worker pool and accept loop.
    ///
    /// The bind is the only start-time failure mode and surfaces as `Err`;
    /// it is fatal to this call, not to the process. Calling `start` on a
    /// dispatcher that is already running is a no-op.
    #[instrument(skip(self), fields(address = %self.config.address, workers = self.pool_size))]
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            warn!("dispatcher already started");
            return Ok(());
        }

        let listener = TcpListener::bind(self.config.address.as_str()).await?;
        let local_addr = listener.local_addr()?;

        let (done_tx, done_rx) = mpsc::unbounded_channel::<ConnectionId>();
        let mut senders = Vec::with_capacity(self.pool_size);
        let mut workers = Vec::with_capacity(self.pool_size);
        for slot in 0..self.pool_size {
            let (tx, rx) = mpsc::unbounded_channel::<Connection>();
            senders.push(tx);
            workers.push(tokio::spawn(worker_loop(slot, rx, done_tx.clone())));
        }
        // The accept loop only receives completions; workers hold the senders.
        drop(done_tx);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let accept_handle = tokio::spawn(accept_loop(
            listener,
            senders,
            done_rx,
            shutdown_rx,
            Arc::clone(&self.handler),
            Arc::clone(&self.stats),
        ));

        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_handle,
            workers,
        });
        info!(address = %local_addr, "listening");
        Ok(())
    }

    /// Stop accepting, drain every worker slot, and join the pool.
    ///
    /// Connections still active are allowed to run to natural completion
    /// before their slots exit. A dispatcher that was never started is a
    /// no-op.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown_tx.send(()).await;
        let _ = running.accept_handle.await;
        for worker in running.workers {
            let _ = worker.await;
        }
        info!("dispatcher stopped");
    }
}

fn resolve_pool_size(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Accept loop: sole owner of the active set and the round-robin cursor.
async fn accept_loop(
    listener: TcpListener,
    senders: Vec<mpsc::UnboundedSender<Connection>>,
    mut done_rx: mpsc::UnboundedReceiver<ConnectionId>,
    mut shutdown_rx: mpsc::Receiver<()>,
    handler: Arc<Handler>,
    stats: Arc<DispatcherStats>,
) {
    let mut active = ActiveSet::default();
    let mut cursor = SlotCursor::new(senders.len());

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(active = active.len(), "draining worker slots");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let conn = Connection::new(stream, Arc::clone(&handler));
                    let id = conn.id();
                    active.insert(id);
                    let slot = cursor.advance();
                    stats.connection_opened(slot);
                    global_metrics().connection_established();
                    debug!(conn = id, peer = %peer, slot, "connection accepted");

                    if senders[slot].send(conn).is_err() {
                        // Slot task died; terminal for this connection only.
                        warn!(conn = id, slot, "worker slot unavailable, dropping connection");
                        if active.remove(id) {
                            stats.connection_closed();
                            global_metrics().connection_closed();
                        }
                    }
                }
                Err(e) => error!(error = %e, "error accepting connection"),
            },

            Some(id) = done_rx.recv() => {
                if active.remove(id) {
                    stats.connection_closed();
                    global_metrics().connection_closed();
                }
            }
        }
    }

    // Dropping the assignment senders tells each slot to finish its
    // in-flight connections and exit; keep consuming completions until the
    // last worker drops its notification sender.
    drop(senders);
    while let Some(id) = done_rx.recv().await {
        if active.remove(id) {
            stats.connection_closed();
            global_metrics().connection_closed();
        }
    }
    drop(listener);
}

/// One worker slot: an event loop over the connections bound to it.
async fn worker_loop(
    slot: usize,
    mut rx: mpsc::UnboundedReceiver<Connection>,
    done_tx: mpsc::UnboundedSender<ConnectionId>,
) {
    let mut inflight = FuturesUnordered::new();
    loop {
        tokio::select! {
            assigned = rx.recv() => match assigned {
                Some(conn) => {
                    debug!(slot, conn = conn.id(), "connection bound");
                    inflight.push(conn.run());
                }
                None => break,
            },

            Some(id) = inflight.next(), if !inflight.is_empty() => {
                let _ = done_tx.send(id);
            }
        }
    }

    // Graceful drain: in-flight exchanges run to natural completion.
    while let Some(id) = inflight.next().await {
        let _ = done_tx.send(id);
    }
    debug!(slot, "worker slot stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_cycles_in_acceptance_order() {
        let mut cursor = SlotCursor::new(3);
        let order: Vec<usize> = (0..7).map(|_| cursor.advance()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn cursor_single_slot() {
        let mut cursor = SlotCursor::new(1);
        assert_eq!(cursor.advance(), 0);
        assert_eq!(cursor.advance(), 0);
    }

    #[test]
    fn active_set_removal_is_idempotent() {
        let mut set = ActiveSet::default();
        assert!(set.insert(7));
        assert_eq!(set.len(), 1);

        assert!(set.remove(7));
        assert_eq!(set.len(), 0);

        // Duplicate completion notification: no-op, no underflow.
        assert!(!set.remove(7));
        assert_eq!(set.len(), 0);

        // Removing an id that was never inserted is also a no-op.
        assert!(!set.remove(99));
    }

    #[test]
    fn pool_size_zero_uses_hardware_parallelism() {
        assert!(resolve_pool_size(0) >= 1);
        assert_eq!(resolve_pool_size(4), 4);
    }
}
