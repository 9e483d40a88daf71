//! SocketFrontEnd: the request/reply server in front of the engine instances.
//!
//! Runs entirely on the connection server's dispatch actor. Each inbound
//! transaction is authenticated, split into its commands and handled one
//! command at a time; pushes go out before the reply.

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, ConfigBackend};
use crate::engine::{normalize_language, BackEnd, ImEngine};
use crate::instance::InstanceRegistry;
use crate::ipc::{
    AuthError, ClientAuth, ConnectionId, HandshakePolicy, Request, Role, ServerContext, ServerHandler,
    Transaction, TransactionError, TransactionReader,
};

use super::context::RequestContext;
use super::hotkeys::FrontEndHotkeys;

/// Config key prefix of saved per-language default factories.
pub const DEFAULT_FACTORY_PREFIX: &str = "/DefaultIMEngineFactory/";

/// Largest file `LOAD_FILE` returns.
pub const MAX_LOAD_FILE_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FrontEndSettings {
    /// Locale used to pick default factories.
    pub language: String,
    pub stay_resident: bool,
    pub load_file_roots: Vec<PathBuf>,
}

impl Default for FrontEndSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            stay_resident: true,
            load_file_roots: Vec::new(),
        }
    }
}

impl From<&BridgeConfig> for FrontEndSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            language: config.language.clone(),
            stay_resident: config.stay_resident,
            load_file_roots: config.load_file_roots.clone(),
        }
    }
}

pub struct SocketFrontEnd {
    pub(super) auth: ClientAuth,
    pub(super) backend: BackEnd,
    pub(super) instances: InstanceRegistry<Box<dyn ImEngine>>,
    pub(super) store: Box<dyn ConfigBackend>,
    pub(super) hotkeys: FrontEndHotkeys,
    pub(super) settings: FrontEndSettings,
}

impl SocketFrontEnd {
    pub fn new(backend: BackEnd, store: Box<dyn ConfigBackend>, settings: FrontEndSettings) -> Self {
        let hotkeys = FrontEndHotkeys::load(store.as_ref());
        let mut frontend = Self {
            auth: ClientAuth::new(Self::handshake_policy()),
            backend,
            instances: InstanceRegistry::new(),
            store,
            hotkeys,
            settings,
        };
        frontend.restore_default_factories();
        frontend
    }

    pub fn handshake_policy() -> HandshakePolicy {
        HandshakePolicy::new(Role::FrontEnd, vec![Role::IMEngine, Role::Config])
    }

    pub fn backend(&self) -> &BackEnd {
        &self.backend
    }

    pub fn instances(&self) -> &InstanceRegistry<Box<dyn ImEngine>> {
        &self.instances
    }

    pub fn store(&self) -> &dyn ConfigBackend {
        self.store.as_ref()
    }

    pub fn client_count(&self) -> usize {
        self.auth.clients().len()
    }

    /// Apply `/DefaultIMEngineFactory/<lang>` entries for every language a
    /// factory serves, plus the configured one.
    pub(super) fn restore_default_factories(&mut self) {
        let mut languages: BTreeSet<String> = self
            .backend
            .factories_for_encoding("")
            .into_iter()
            .map(|info| normalize_language(&info.language))
            .collect();
        languages.insert(normalize_language(&self.settings.language));

        for language in languages {
            let key = format!("{}{}", DEFAULT_FACTORY_PREFIX, language);
            let Some(uuid) = self.store.read_string(&key) else {
                self.backend.clear_default_factory(&language);
                continue;
            };
            match self.backend.set_default_factory(&language, &uuid) {
                Ok(()) => debug!(language = %language, uuid = %uuid, "Default factory restored"),
                Err(e) => warn!(language = %language, error = %e, "Ignoring saved default factory"),
            }
        }
    }

    /// Handle every command of one authenticated transaction.
    pub fn run_batch(
        &mut self,
        connection: ConnectionId,
        role: Role,
        reader: &mut TransactionReader<'_>,
    ) -> RequestContext {
        let mut rc = RequestContext::new(connection, role);
        while !reader.is_exhausted() {
            let command = match reader.get_command() {
                Ok(command) => command,
                Err(e) => {
                    debug!(connection = %connection, error = %e, "Skipping unreadable command");
                    rc.failed = true;
                    reader.skip_to_next_command();
                    continue;
                }
            };
            let request = match Request::decode(command, reader) {
                Ok(request) => request,
                Err(e) => {
                    debug!(connection = %connection, command = ?command, error = %e, "Bad operands, skipping command");
                    rc.failed = true;
                    reader.skip_to_next_command();
                    continue;
                }
            };
            if let Request::CloseConnection = request {
                rc.close_requested = true;
                break;
            }
            rc.current_instance = request.instance_id();
            if let Err(e) = self.handle(&mut rc, request) {
                debug!(connection = %connection, command = ?command, error = %e, "Command failed");
                rc.failed = true;
            }
        }
        rc
    }

    /// Drop everything `id` owned. Returns `true` when the server should
    /// stop because the last client left.
    pub fn release_connection(&mut self, id: ConnectionId) -> bool {
        if let Some(focused) = self.instances.focused() {
            if self.instances.get(focused).map(|r| r.owner) == Some(id) {
                self.hotkeys.reset();
                if let Some(record) = self.instances.get_mut(focused) {
                    let mut discarded = Vec::new();
                    record.engine.focus_out(&mut discarded);
                }
                self.instances.set_focused(None);
            }
        }
        let owned = self.instances.owned_by(id);
        for instance in &owned {
            self.instances.remove(*instance);
        }
        self.instances.detach_all(id);

        let Some(client) = self.auth.forget(id) else {
            return false;
        };
        info!(connection = %id, role = %client.role, instances = owned.len(), "Client released");
        self.auth.clients().is_empty() && !self.settings.stay_resident
    }

    async fn send_results(&mut self, ctx: &mut ServerContext, rc: &mut RequestContext) {
        for (target, update) in std::mem::take(&mut rc.pushes) {
            if !ctx.is_open(target) {
                continue;
            }
            if let Err(e) = ctx.send(target, &update.to_transaction()).await {
                warn!(connection = %target, error = %e, "Push failed, closing connection");
                self.disconnect(ctx, target);
            }
        }

        if rc.close_requested {
            debug!(connection = %rc.connection, "Close requested by client");
            self.disconnect(ctx, rc.connection);
            return;
        }
        if !ctx.is_open(rc.connection) {
            return;
        }
        let reply = rc.take_reply();
        if let Err(e) = ctx.send(rc.connection, &reply.to_transaction()).await {
            warn!(connection = %rc.connection, error = %e, "Reply failed, closing connection");
            self.disconnect(ctx, rc.connection);
        }
    }

    fn disconnect(&mut self, ctx: &mut ServerContext, id: ConnectionId) {
        ctx.close_connection(id);
        if self.release_connection(id) {
            info!("Last client gone, shutting down");
            ctx.shutdown();
        }
    }
}

#[async_trait]
impl ServerHandler for SocketFrontEnd {
    async fn on_accept(&mut self, _ctx: &mut ServerContext, id: ConnectionId) -> bool {
        debug!(connection = %id, "Frontend connection accepted");
        true
    }

    async fn on_receive(&mut self, ctx: &mut ServerContext, id: ConnectionId, transaction: Transaction) {
        if !self.auth.is_registered(id) {
            if let Err(e) = self.auth.handshake(ctx, id, &transaction).await {
                info!(connection = %id, error = %e, "Handshake refused");
                ctx.close_connection(id);
            }
            return;
        }

        let (client, mut reader) = match self.auth.authenticate(id, &transaction) {
            Ok(authenticated) => authenticated,
            Err(AuthError::KeyMismatch) => return,
            Err(e) => {
                debug!(connection = %id, error = %e, "Unauthenticated transaction dropped");
                return;
            }
        };
        counter!("ime_bridge_requests_total", "role" => client.role.as_str()).increment(1);

        let mut rc = self.run_batch(id, client.role, &mut reader);
        self.send_results(ctx, &mut rc).await;
    }

    async fn on_exception(&mut self, ctx: &mut ServerContext, id: ConnectionId, error: &TransactionError) {
        debug!(connection = %id, error = %error, "Frontend connection lost");
        self.disconnect(ctx, id);
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
