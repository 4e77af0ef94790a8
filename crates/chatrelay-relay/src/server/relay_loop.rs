//! The relay loop.
//!
//! A single task owns the listening socket, the relay ends of the monitor
//! pipes and every client socket. Each cycle waits until one of them is ready
//! (or the tick elapses), then services them with non-blocking calls:
//!
//! 1. a pending connection is accepted into the connection table, or closed
//!    when the table is full;
//! 2. one chunk from the monitor is broadcast to every client;
//! 3. every client slot, in table order, gets one read: end-of-stream or an
//!    error releases the slot, data goes to the monitor and every other client.
//!
//! `WouldBlock` anywhere means "nothing to do yet".
//!
//! A persistent accept failure (out of descriptors, say) pauses accepting for
//! [`ACCEPT_BACKOFF`] while existing clients keep being served.

use std::future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::future::select_all;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use chatrelay_core::RelayConfig;

use crate::error::RelayError;
use crate::monitor::RelayEnd;
use crate::registry::{ConnectionTable, SlotIndex};
use crate::router::{Delivery, PeerSink, deliver, fan_out};

/// Pause after an accept error that is not about a single connection.
pub const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// A connected client.
#[derive(Debug)]
pub struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
}

impl Peer {
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl PeerSink for Peer {
    fn offer(&self, chunk: &[u8]) -> io::Result<usize> {
        self.stream.try_write(chunk)
    }
}

enum Wake {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Ready,
    Tick,
}

/// Readiness-driven dispatcher for the chat relay.
pub struct RelayLoop {
    listener: TcpListener,
    table: ConnectionTable<Peer>,
    monitor: Option<RelayEnd>,
    chunk_size: usize,
    tick: Duration,
    occupancy: watch::Sender<usize>,
    accept_resume: Option<Instant>,
}

impl RelayLoop {
    /// Build a relay over a listening socket. Without a monitor the relay
    /// only forwards between clients.
    pub fn new(listener: TcpListener, monitor: Option<RelayEnd>, config: &RelayConfig) -> Self {
        let (occupancy, _) = watch::channel(0);
        Self {
            listener,
            table: ConnectionTable::new(config.max_clients),
            monitor,
            chunk_size: config.chunk_size.max(1),
            tick: config.tick(),
            occupancy,
            accept_resume: None,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn active_peers(&self) -> usize {
        self.table.len()
    }

    pub const fn monitor_attached(&self) -> bool {
        self.monitor.is_some()
    }

    /// Watch the number of occupied client slots.
    pub fn occupancy(&self) -> watch::Receiver<usize> {
        self.occupancy.subscribe()
    }

    /// Run until a fatal error. Dropping the future (or the loop) closes the
    /// listener, every client and the relay's monitor pipe ends.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            capacity = self.table.capacity(),
            monitor = self.monitor.is_some(),
            "Relay loop started"
        );

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            if let Wake::Accepted(accepted) = self.wait().await? {
                self.admit(accepted).await;
            }
            self.service_monitor(&mut buf);
            self.service_peers(&mut buf);
        }
    }

    async fn wait(&self) -> Result<Wake, RelayError> {
        let monitor_ready = async {
            match &self.monitor {
                Some(monitor) => monitor.from_monitor.readable().await,
                None => future::pending().await,
            }
        };

        let accept = async {
            if let Some(resume) = self.accept_resume {
                tokio::time::sleep_until(resume).await;
            }
            self.listener.accept().await
        };

        tokio::select! {
            accepted = accept => Ok(Wake::Accepted(accepted)),
            ready = monitor_ready => ready.map(|()| Wake::Ready).map_err(RelayError::Wait),
            ready = any_readable(&self.table) => ready.map(|()| Wake::Ready).map_err(RelayError::Wait),
            () = tokio::time::sleep(self.tick) => Ok(Wake::Tick),
        }
    }

    async fn admit(&mut self, accepted: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) if is_connection_error(&e) => {
                debug!(error = %e, "Pending connection failed before accept");
                return;
            }
            Err(e) => {
                warn!(error = %e, backoff = ?ACCEPT_BACKOFF, "Accept failed, pausing accepts");
                self.accept_resume = Some(Instant::now() + ACCEPT_BACKOFF);
                return;
            }
        };
        self.accept_resume = None;

        if self.table.is_full() {
            drop(stream);
            warn!(peer = %addr, capacity = self.table.capacity(), "Connection table full, peer refused");
            return;
        }

        // tokio reports WouldBlock from try_write until the driver has seen the
        // new socket's write readiness, so wait for it before the socket can
        // be a broadcast target.
        match tokio::time::timeout(self.tick, stream.writable()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(peer = %addr, error = %e, "Peer failed before admission");
                return;
            }
            Err(_) => debug!(peer = %addr, "Peer not yet writable, admitting anyway"),
        }

        // Accepted sockets come back from tokio already non-blocking.
        match self.table.acquire(Peer { stream, addr }) {
            Ok(slot) => {
                self.publish_occupancy();
                info!(slot = %slot, peer = %addr, active = self.table.len(), "Peer connected");
            }
            Err(full) => {
                warn!(peer = %addr, capacity = full.capacity, "Connection table full, peer refused");
            }
        }
    }

    fn service_monitor(&mut self, buf: &mut [u8]) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        match monitor.from_monitor.try_read(buf) {
            Ok(0) => self.silence_monitor("monitor hung up"),
            Ok(n) => {
                let report = fan_out(&self.table, &buf[..n], None);
                debug!(
                    bytes = n,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "Broadcast monitor chunk"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!(error = %e, "Reading from monitor failed");
                self.silence_monitor("monitor read failed");
            }
        }
    }

    fn service_peers(&mut self, buf: &mut [u8]) {
        for slot in self.table.active_slots() {
            let Some(peer) = self.table.get(slot) else {
                continue;
            };
            match peer.stream.try_read(buf) {
                Ok(0) => self.disconnect(slot),
                Ok(n) => self.relay_chunk(slot, &buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    debug!(slot = %slot, error = %e, "Reading from peer failed");
                    self.disconnect(slot);
                }
            }
        }
    }

    fn relay_chunk(&mut self, origin: SlotIndex, chunk: &[u8]) {
        self.forward_to_monitor(chunk);
        let report = fan_out(&self.table, chunk, Some(origin));
        debug!(
            slot = %origin,
            bytes = chunk.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Relayed chunk"
        );
    }

    fn forward_to_monitor(&mut self, chunk: &[u8]) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        match deliver(&monitor.to_monitor, chunk) {
            Delivery::Complete => {}
            Delivery::Partial(written) => {
                warn!(written, bytes = chunk.len(), "Partial write to monitor, remainder dropped");
            }
            Delivery::WouldBlock => {
                warn!(bytes = chunk.len(), "Monitor not keeping up, chunk dropped");
            }
            Delivery::Failed(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.silence_monitor("monitor stopped reading");
            }
            Delivery::Failed(e) => {
                warn!(error = %e, "Write to monitor failed");
            }
        }
    }

    fn disconnect(&mut self, slot: SlotIndex) {
        let addr = self.table.get(slot).map(Peer::addr);
        if self.table.release(slot) {
            self.publish_occupancy();
            info!(slot = %slot, peer = ?addr, active = self.table.len(), "Peer disconnected");
        }
    }

    fn silence_monitor(&mut self, reason: &'static str) {
        if self.monitor.take().is_some() {
            info!(reason, "Monitor channel closed, relaying between clients only");
        }
    }

    fn publish_occupancy(&self) {
        self.occupancy.send_replace(self.table.len());
    }
}

/// Resolves once any occupied slot is readable. Never resolves for an empty table.
async fn any_readable(table: &ConnectionTable<Peer>) -> io::Result<()> {
    if table.is_empty() {
        return future::pending().await;
    }
    let waits: Vec<_> = table
        .iter_active()
        .map(|(_, peer)| Box::pin(peer.stream.readable()))
        .collect();
    let (ready, _, _) = select_all(waits).await;
    ready
}

/// Errors that concern one pending connection, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
