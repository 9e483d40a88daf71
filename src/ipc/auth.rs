//! Connection handshake and per-request key checks.
//!
//! A probed connection must first send `REQUEST, OPEN_CONNECTION, version,
//! role, acceptable server roles`. On success the server answers with a fresh
//! key; every later request must carry it. Requests with a wrong key are
//! dropped without a reply.

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use super::auth_session::{generate_key, keys_match, ClientInfo, ClientRegistry};
use super::protocol::{read_request_header, HandshakeAccept, OpenConnection, Role, PROTOCOL_VERSION};
use super::server::{ConnectionId, ServerContext, ServerError};
use super::transaction::{Transaction, TransactionError, TransactionReader};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Malformed handshake: {0}")]
    Malformed(#[from] TransactionError),
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("Peer does not accept server role {0}")]
    ServerRoleRefused(Role),
    #[error("Peer role {0} is not accepted")]
    RoleRefused(Role),
    #[error("Connection is not registered")]
    NotRegistered,
    #[error("Connection key mismatch")]
    KeyMismatch,
    #[error("Handshake reply failed: {0}")]
    Reply(#[from] ServerError),
}

/// Which peers a server talks to.
#[derive(Debug, Clone)]
pub struct HandshakePolicy {
    pub server_role: Role,
    pub accepted_roles: Vec<Role>,
}

impl HandshakePolicy {
    pub fn new(server_role: Role, accepted_roles: Vec<Role>) -> Self {
        Self { server_role, accepted_roles }
    }

    pub fn check(&self, hello: &OpenConnection) -> Result<(), AuthError> {
        if hello.version != PROTOCOL_VERSION {
            return Err(AuthError::UnsupportedVersion(hello.version.clone()));
        }
        if !hello.acceptable_server_roles.contains(&self.server_role) {
            return Err(AuthError::ServerRoleRefused(self.server_role));
        }
        if hello.role == Role::Unknown || !self.accepted_roles.contains(&hello.role) {
            return Err(AuthError::RoleRefused(hello.role));
        }
        Ok(())
    }
}

/// Handshake state of every connection of one server.
pub struct ClientAuth {
    policy: HandshakePolicy,
    clients: ClientRegistry,
}

impl ClientAuth {
    pub fn new(policy: HandshakePolicy) -> Self {
        Self { policy, clients: ClientRegistry::new() }
    }

    pub fn policy(&self) -> &HandshakePolicy {
        &self.policy
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.clients.get(id).is_some()
    }

    pub fn client(&self, id: ConnectionId) -> Option<ClientInfo> {
        self.clients.get(id)
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Run the handshake for an unregistered connection and reply on success.
    /// On error the caller closes the connection.
    pub async fn handshake(
        &mut self,
        ctx: &mut ServerContext,
        id: ConnectionId,
        transaction: &Transaction,
    ) -> Result<ClientInfo, AuthError> {
        let result = self.try_handshake(ctx, id, transaction).await;
        let label = if result.is_ok() { "accepted" } else { "rejected" };
        counter!("ime_bridge_handshakes_total", "result" => label).increment(1);
        result
    }

    async fn try_handshake(
        &mut self,
        ctx: &mut ServerContext,
        id: ConnectionId,
        transaction: &Transaction,
    ) -> Result<ClientInfo, AuthError> {
        let hello = OpenConnection::from_transaction(transaction)?;
        self.policy.check(&hello)?;

        let info = ClientInfo { key: generate_key(), role: hello.role };
        let accept = HandshakeAccept { key: info.key, server_role: self.policy.server_role };
        ctx.send(id, &accept.to_transaction()).await?;
        self.clients.insert(id, info);
        info!(connection = %id, role = %info.role, "Client registered");
        Ok(info)
    }

    /// Check the `REQUEST, key` header of a registered client's transaction.
    /// Returns the reader positioned at the first command.
    pub fn authenticate<'a>(
        &self,
        id: ConnectionId,
        transaction: &'a Transaction,
    ) -> Result<(ClientInfo, TransactionReader<'a>), AuthError> {
        let info = self.clients.get(id).ok_or(AuthError::NotRegistered)?;
        let mut reader = transaction.reader();
        let key = read_request_header(&mut reader)?;
        if !keys_match(key, info.key) {
            debug!(connection = %id, "Request with mismatched key dropped");
            counter!("ime_bridge_auth_dropped_total").increment(1);
            return Err(AuthError::KeyMismatch);
        }
        Ok((info, reader))
    }

    pub fn forget(&mut self, id: ConnectionId) -> Option<ClientInfo> {
        self.clients.remove(id)
    }

    #[cfg(test)]
    pub(crate) fn register_for_test(&mut self, id: ConnectionId, info: ClientInfo) {
        self.clients.insert(id, info);
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
