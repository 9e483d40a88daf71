//! HelperManager server: lists installed helpers and launches them on
//! request from panels and frontends.

use std::collections::HashMap;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::ipc::protocol::Outcome;
use crate::ipc::{
    ClientAuth, ConnectionId, HandshakePolicy, Reply, Request, Response, Role, ServerContext, ServerHandler,
    Transaction, TransactionError, TransactionReader,
};

use super::launcher::launch_helper;
use super::registry::HelperRegistry;
use super::HelperError;

/// A helper started on behalf of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub uuid: String,
    pub pid: u32,
}

/// Result of one inbound transaction.
#[derive(Debug)]
pub struct HelperBatch {
    pub reply: Reply,
    pub close_requested: bool,
}

pub struct HelperManager {
    auth: ClientAuth,
    registry: HelperRegistry,
    default_display: String,
    launches: HashMap<ConnectionId, Vec<LaunchRecord>>,
}

impl HelperManager {
    pub fn new(registry: HelperRegistry, default_display: impl Into<String>) -> Self {
        Self {
            auth: ClientAuth::new(Self::handshake_policy()),
            registry,
            default_display: default_display.into(),
            launches: HashMap::new(),
        }
    }

    pub fn handshake_policy() -> HandshakePolicy {
        HandshakePolicy::new(Role::HelperManager, vec![Role::Panel, Role::FrontEnd, Role::HelperManager])
    }

    pub fn registry(&self) -> &HelperRegistry {
        &self.registry
    }

    /// Helpers launched for `connection` and not yet forgotten.
    pub fn launches(&self, connection: ConnectionId) -> &[LaunchRecord] {
        self.launches.get(&connection).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn run_helper(
        &mut self,
        connection: ConnectionId,
        uuid: &str,
        config_name: &str,
        display: &str,
    ) -> Result<u32, HelperError> {
        let helper = self
            .registry
            .get(uuid)
            .ok_or_else(|| HelperError::UnknownHelper(uuid.to_string()))?;
        let display = if display.is_empty() { self.default_display.as_str() } else { display };
        let pid = launch_helper(helper, config_name, display)?;
        self.launches.entry(connection).or_default().push(LaunchRecord {
            uuid: uuid.to_string(),
            pid,
        });
        Ok(pid)
    }

    /// Handle every command of one authenticated transaction. Unknown or
    /// malformed commands are skipped and fail the batch.
    pub fn handle_batch(&mut self, connection: ConnectionId, reader: &mut TransactionReader<'_>) -> HelperBatch {
        let mut responses = Vec::new();
        let mut failed = false;
        let mut close_requested = false;

        while !reader.is_exhausted() {
            let request = match reader.get_command().and_then(|command| Request::decode(command, reader)) {
                Ok(request) => request,
                Err(e) => {
                    debug!(connection = %connection, error = %e, "Skipping unreadable command");
                    failed = true;
                    reader.skip_to_next_command();
                    continue;
                }
            };
            match request {
                Request::CloseConnection => {
                    close_requested = true;
                    break;
                }
                Request::GetHelperList => responses.push(Response::HelperList(self.registry.list())),
                Request::RunHelper { uuid, config_name, display } => {
                    if let Err(e) = self.run_helper(connection, &uuid, &config_name, &display) {
                        warn!(connection = %connection, error = %e, "Helper not started");
                        failed = true;
                    }
                }
                other => {
                    debug!(connection = %connection, command = ?other.command(), "Not a helper manager request");
                    failed = true;
                }
            }
        }

        let outcome = if failed { Outcome::Fail } else { Outcome::Ok };
        HelperBatch {
            reply: Reply { responses, outcome },
            close_requested,
        }
    }

    /// Forget everything about `connection`. Launched helpers keep running.
    pub fn release_connection(&mut self, connection: ConnectionId) {
        let launched = self.launches.remove(&connection).map(|l| l.len()).unwrap_or(0);
        if let Some(client) = self.auth.forget(connection) {
            info!(connection = %connection, role = %client.role, launched, "Helper manager client released");
        }
    }

    fn disconnect(&mut self, ctx: &mut ServerContext, connection: ConnectionId) {
        ctx.close_connection(connection);
        self.release_connection(connection);
    }
}

#[async_trait]
impl ServerHandler for HelperManager {
    async fn on_receive(&mut self, ctx: &mut ServerContext, id: ConnectionId, transaction: Transaction) {
        if !self.auth.is_registered(id) {
            if let Err(e) = self.auth.handshake(ctx, id, &transaction).await {
                info!(connection = %id, error = %e, "Handshake refused");
                ctx.close_connection(id);
            }
            return;
        }

        let Ok((client, mut reader)) = self.auth.authenticate(id, &transaction) else {
            return;
        };
        counter!("ime_bridge_requests_total", "role" => client.role.as_str()).increment(1);

        let batch = self.handle_batch(id, &mut reader);
        if batch.close_requested {
            self.disconnect(ctx, id);
            return;
        }
        if let Err(e) = ctx.send(id, &batch.reply.to_transaction()).await {
            warn!(connection = %id, error = %e, "Reply failed, closing connection");
            self.disconnect(ctx, id);
        }
    }

    async fn on_exception(&mut self, ctx: &mut ServerContext, id: ConnectionId, error: &TransactionError) {
        debug!(connection = %id, error = %error, "Helper manager connection lost");
        self.disconnect(ctx, id);
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
