//! Peer side of the handshake and of request/reply exchanges.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::address::{self, Address, AddressError, BoxedReader, BoxedWriter};
use super::protocol::{
    request_transaction, HandshakeAccept, InstanceUpdate, OpenConnection, Reply, Request, Role,
    ServerMessage, CONNECTION_PROBE,
};
use super::transaction::{Transaction, TransactionError};
use super::transaction_codec::with_timeout;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Handshake rejected by server")]
    HandshakeRejected,
    #[error("Server role {0} is not acceptable")]
    UnexpectedServerRole(Role),
    #[error("Request failed")]
    RequestFailed,
    #[error("Unexpected response from server")]
    UnexpectedResponse,
    #[error("Reconnect failed after {0} attempts")]
    ReconnectFailed(u32),
}

impl ClientError {
    /// Whether the connection itself is gone, as opposed to a refused request.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Transaction(e) => !e.is_operand_error(),
            _ => false,
        }
    }
}

/// A registered connection to a socket server.
pub struct SocketClient {
    reader: BoxedReader,
    writer: BoxedWriter,
    key: u32,
    server_role: Role,
    timeout: Duration,
    updates: VecDeque<InstanceUpdate>,
}

impl SocketClient {
    /// Connect, probe and register as `role` with a server whose role is in `server_roles`.
    pub async fn connect(
        address: &Address,
        role: Role,
        server_roles: &[Role],
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let (mut reader, mut writer) = address::connect(address).await?;
        with_timeout(timeout, async {
            writer.write_all(&CONNECTION_PROBE).await?;
            Ok(())
        })
        .await?;

        let hello = OpenConnection::new(role, server_roles.to_vec());
        hello.to_transaction().write_to(&mut writer, timeout).await?;
        let reply = match Transaction::read_from(&mut reader, timeout).await {
            Ok(reply) => reply,
            Err(TransactionError::Io(e))
                if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset) =>
            {
                return Err(ClientError::HandshakeRejected);
            }
            Err(e) => return Err(e.into()),
        };
        let accept = HandshakeAccept::from_transaction(&reply)?;
        if !server_roles.contains(&accept.server_role) {
            return Err(ClientError::UnexpectedServerRole(accept.server_role));
        }
        debug!(address = %address, server_role = %accept.server_role, "Connected");

        Ok(Self {
            reader,
            writer,
            key: accept.key,
            server_role: accept.server_role,
            timeout,
            updates: VecDeque::new(),
        })
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn server_role(&self) -> Role {
        self.server_role
    }

    /// Send one batch and wait for its reply. Pushes that arrive first are queued.
    pub async fn call(&mut self, requests: &[Request]) -> Result<Reply, ClientError> {
        self.send(requests).await?;
        loop {
            match self.read_message().await? {
                ServerMessage::Reply(reply) => return Ok(reply),
                ServerMessage::Update(update) => self.updates.push_back(update),
            }
        }
    }

    /// Send one batch without waiting for a reply.
    pub async fn send(&mut self, requests: &[Request]) -> Result<(), ClientError> {
        self.send_raw(&request_transaction(self.key, requests)).await
    }

    pub async fn send_raw(&mut self, transaction: &Transaction) -> Result<(), ClientError> {
        transaction.write_to(&mut self.writer, self.timeout).await?;
        Ok(())
    }

    /// Next push, from the queue or the socket.
    pub async fn next_update(&mut self) -> Result<InstanceUpdate, ClientError> {
        if let Some(update) = self.updates.pop_front() {
            return Ok(update);
        }
        match self.read_message().await? {
            ServerMessage::Update(update) => Ok(update),
            ServerMessage::Reply(_) => Err(ClientError::UnexpectedResponse),
        }
    }

    pub fn take_updates(&mut self) -> Vec<InstanceUpdate> {
        self.updates.drain(..).collect()
    }

    /// Politely close: `CLOSE_CONNECTION` is never answered.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.send(&[Request::CloseConnection]).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<ServerMessage, ClientError> {
        let transaction = Transaction::read_from(&mut self.reader, self.timeout).await?;
        Ok(ServerMessage::decode(&transaction)?)
    }
}
