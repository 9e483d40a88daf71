//! Connection server: accept loop, per-connection readers, single dispatch actor.
//!
//! Reader tasks only frame bytes into transactions and forward them over a
//! bounded channel. Every callback runs on the task driving [`ConnectionServer::run`],
//! one at a time, so handlers own their state without locks.
//!
//! A peer must write [`CONNECTION_PROBE`] within the socket timeout before it
//! is reported to the handler; peers that don't are dropped silently.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::address::{Address, AddressError, BoxedReader, BoxedWriter, Listener};
use super::connections::{ConnectionPool, OwnedConnectionGuard};
use super::protocol_types::CONNECTION_PROBE;
use super::transaction::{Transaction, TransactionError};
use super::transaction_codec::with_timeout;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Connection {0} is not open")]
    NotConnected(ConnectionId),
}

/// Server-assigned connection handle; never reused within one server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bound on the probe and on each frame read or write; zero disables it.
    pub timeout: Duration,
    pub max_clients: usize,
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_clients: 64,
            channel_capacity: 256,
        }
    }
}

/// Callbacks of a connection server.
#[async_trait]
pub trait ServerHandler: Send {
    /// A probed connection arrived. Returning `false` closes it.
    async fn on_accept(&mut self, _ctx: &mut ServerContext, _id: ConnectionId) -> bool {
        true
    }

    async fn on_receive(&mut self, ctx: &mut ServerContext, id: ConnectionId, transaction: Transaction);

    /// The connection failed or the peer hung up. The server closes it afterwards.
    async fn on_exception(&mut self, ctx: &mut ServerContext, id: ConnectionId, error: &TransactionError);
}

struct Peer {
    writer: BoxedWriter,
    cancel: CancellationToken,
}

/// Connection table and control surface handed to every callback.
pub struct ServerContext {
    peers: HashMap<ConnectionId, Peer>,
    address: Address,
    timeout: Duration,
    stop: bool,
}

impl ServerContext {
    fn new(address: Address, timeout: Duration) -> Self {
        Self { peers: HashMap::new(), address, timeout, stop: false }
    }

    /// Write one transaction to `id` under the socket timeout.
    pub async fn send(&mut self, id: ConnectionId, transaction: &Transaction) -> Result<(), ServerError> {
        let timeout = self.timeout;
        let peer = self.peers.get_mut(&id).ok_or(ServerError::NotConnected(id))?;
        transaction.write_to(&mut peer.writer, timeout).await?;
        Ok(())
    }

    /// Close `id`: stop its reader and drop its writer. Returns `false` if it
    /// was already closed; later events for it are discarded.
    pub fn close_connection(&mut self, id: ConnectionId) -> bool {
        match self.peers.remove(&id) {
            Some(peer) => {
                peer.cancel.cancel();
                drop(peer.writer);
                debug!(connection = %id, "Connection closed");
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.peers.keys().copied()
    }

    /// Stop the server after the current callback returns.
    pub fn shutdown(&mut self) {
        self.stop = true;
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn close_all(&mut self) {
        let ids: Vec<_> = self.peers.keys().copied().collect();
        for id in ids {
            self.close_connection(id);
        }
    }
}

enum Event {
    Opened { id: ConnectionId, writer: BoxedWriter, cancel: CancellationToken },
    Received { id: ConnectionId, transaction: Transaction },
    Failed { id: ConnectionId, error: TransactionError },
}

/// A bound server socket, ready to run.
pub struct ConnectionServer {
    listener: Listener,
    address: Address,
    config: ServerConfig,
}

impl ConnectionServer {
    pub async fn bind(address: &Address, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = Listener::bind(address).await?;
        let address = listener.local_address()?;
        Ok(Self { listener, address, config })
    }

    pub fn local_address(&self) -> &Address {
        &self.address
    }

    /// Serve until a callback calls [`ServerContext::shutdown`] or `shutdown`
    /// changes. Dropping the shutdown sender also stops the server.
    pub async fn run<H: ServerHandler>(
        self,
        handler: &mut H,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let ConnectionServer { listener, address, config } = self;
        let (events_tx, mut events) = mpsc::channel(config.channel_capacity.max(1));
        let stop_accepting = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            ConnectionPool::new(config.max_clients),
            events_tx,
            config.timeout,
            stop_accepting.clone(),
        ));

        info!(address = %address, max_clients = config.max_clients, "Server listening");
        let mut ctx = ServerContext::new(address, config.timeout);

        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("Server shutting down");
                    break;
                }
            };
            dispatch_event(handler, &mut ctx, event).await;
            if ctx.stop {
                info!("Server stopped by handler");
                break;
            }
        }

        stop_accepting.cancel();
        let _ = accept_task.await;
        ctx.close_all();
        Ok(())
    }
}

async fn dispatch_event<H: ServerHandler>(handler: &mut H, ctx: &mut ServerContext, event: Event) {
    match event {
        Event::Opened { id, writer, cancel } => {
            ctx.peers.insert(id, Peer { writer, cancel });
            debug!(connection = %id, "Connection accepted");
            if !handler.on_accept(ctx, id).await {
                ctx.close_connection(id);
            }
        }
        Event::Received { id, transaction } => {
            if ctx.is_open(id) {
                handler.on_receive(ctx, id, transaction).await;
            }
        }
        Event::Failed { id, error } => {
            if ctx.is_open(id) {
                debug!(connection = %id, error = %error, "Connection read failed");
                handler.on_exception(ctx, id, &error).await;
                ctx.close_connection(id);
            }
        }
    }
}

async fn accept_loop(
    listener: Listener,
    pool: ConnectionPool,
    events: mpsc::Sender<Event>,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut next_id: u32 = 1;
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (reader, writer) = match accepted {
            Ok(halves) => halves,
            Err(e) => {
                warn!(error = %e, "Accept error");
                continue;
            }
        };
        let Some(guard) = pool.try_acquire_owned() else {
            warn!(max_clients = pool.max(), "Connection limit reached, rejecting client");
            continue;
        };

        let id = ConnectionId(next_id);
        next_id = next_id.wrapping_add(1);
        counter!("ime_bridge_connections_accepted_total").increment(1);
        tokio::spawn(read_connection(
            id,
            reader,
            writer,
            events.clone(),
            timeout,
            guard,
            cancel.child_token(),
        ));
    }
}

async fn read_connection(
    id: ConnectionId,
    mut reader: BoxedReader,
    writer: BoxedWriter,
    events: mpsc::Sender<Event>,
    timeout: Duration,
    _guard: OwnedConnectionGuard,
    cancel: CancellationToken,
) {
    let mut probe = [0u8; 4];
    let probed = tokio::select! {
        _ = cancel.cancelled() => return,
        probed = with_timeout(timeout, async {
            reader.read_exact(&mut probe).await.map_err(TransactionError::from)
        }) => probed,
    };
    if let Err(e) = probed {
        debug!(connection = %id, error = %e, "No connection probe, dropping");
        return;
    }
    if probe != CONNECTION_PROBE {
        debug!(connection = %id, "Bad connection probe, dropping");
        return;
    }

    let opened = Event::Opened { id, writer, cancel: cancel.clone() };
    if events.send(opened).await.is_err() {
        return;
    }

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = read_transaction(&mut reader, timeout) => result,
        };
        let (event, last) = match result {
            Ok(transaction) => (Event::Received { id, transaction }, false),
            Err(error) => (Event::Failed { id, error }, true),
        };
        if events.send(event).await.is_err() || last {
            return;
        }
    }
}

/// Wait for the next frame without a deadline, then bound the rest of it.
async fn read_transaction(reader: &mut BoxedReader, timeout: Duration) -> Result<Transaction, TransactionError> {
    let mut signature = [0u8; 4];
    reader.read_exact(&mut signature).await?;
    Transaction::read_after_signature(reader, signature, timeout).await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
