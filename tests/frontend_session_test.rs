// Copyright 2024-2026 ime-bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Socket frontend sessions over real Unix sockets.
//!
//! Handshake, request/reply batches, authentication silence and the
//! disconnect cascade, observed from the client side.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use ime_bridge::config::{ConfigBackend, FileConfig};
use ime_bridge::engine::{BackEnd, EchoFactory, ECHO_FACTORY_UUID};
use ime_bridge::frontend::{FrontEndSettings, SocketFrontEnd};
use ime_bridge::ipc::protocol::{request_transaction, ConfigKind, ConfigValue, Outcome};
use ime_bridge::ipc::transaction::{KeyEvent, WideString};
use ime_bridge::ipc::{
    Address, ClientError, ConnectionServer, Request, Response, Role, ServerConfig, ServerError, SocketClient,
    UiEvent,
};

const TIMEOUT: Duration = Duration::from_secs(2);

struct RunningFrontEnd {
    address: Address,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<(Result<(), ServerError>, SocketFrontEnd)>,
    _dir: tempfile::TempDir,
}

impl RunningFrontEnd {
    async fn start(settings: FrontEndSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = BackEnd::new();
        backend.register_factory(Arc::new(EchoFactory::new())).unwrap();
        let store = FileConfig::open(dir.path().join("store.toml")).unwrap();
        let mut frontend = SocketFrontEnd::new(backend, Box::new(store), settings);

        let address = Address::Local(dir.path().join("frontend.sock"));
        let config = ServerConfig { timeout: TIMEOUT, ..Default::default() };
        let server = ConnectionServer::bind(&address, config).await.unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let result = server.run(&mut frontend, shutdown_rx).await;
            (result, frontend)
        });
        Self { address, shutdown, task, _dir: dir }
    }

    async fn connect(&self, role: Role) -> Result<SocketClient, ClientError> {
        SocketClient::connect(&self.address, role, &[Role::FrontEnd], TIMEOUT).await
    }

    /// Wait for the server to stop on its own.
    async fn finished(self) -> SocketFrontEnd {
        let (result, frontend) = tokio::time::timeout(TIMEOUT, self.task).await.unwrap().unwrap();
        result.unwrap();
        frontend
    }

    async fn stop(self) -> SocketFrontEnd {
        let _ = self.shutdown.send(true);
        let (result, frontend) = self.task.await.unwrap();
        result.unwrap();
        frontend
    }
}

fn transient() -> FrontEndSettings {
    FrontEndSettings { stay_resident: false, ..Default::default() }
}

fn new_echo_instance() -> Request {
    Request::NewInstance { factory_uuid: ECHO_FACTORY_UUID.into(), encoding: "UTF-8".into() }
}

fn type_key(id: u32, ch: char) -> Request {
    Request::ProcessKeyEvent { id, key: KeyEvent::press(ch as u32) }
}

#[tokio::test]
async fn session_new_instance_then_disconnect() {
    let frontend = RunningFrontEnd::start(transient()).await;
    let mut client = frontend.connect(Role::IMEngine).await.unwrap();
    assert_eq!(client.server_role(), Role::FrontEnd);

    let reply = client.call(&[new_echo_instance()]).await.unwrap();
    assert_eq!(reply.outcome, Outcome::Ok);
    assert_eq!(reply.responses, vec![Response::NewInstance(0)]);

    let reply = client.call(&[type_key(0, 'h'), type_key(0, 'i')]).await.unwrap();
    assert!(reply.is_ok());
    assert!(reply.ui_events().any(|e| matches!(e, UiEvent::UpdatePreeditString(text, _) if text.as_str() == "hi")));

    client.close().await.unwrap();

    // Not resident: the last client leaving stops the server.
    let frontend = frontend.finished().await;
    assert!(frontend.instances().is_empty());
    assert_eq!(frontend.client_count(), 0);
}

#[tokio::test]
async fn session_dropped_connection_releases_instances() {
    let frontend = RunningFrontEnd::start(transient()).await;
    let mut client = frontend.connect(Role::IMEngine).await.unwrap();
    for expected in 0..3 {
        let reply = client.call(&[new_echo_instance()]).await.unwrap();
        assert_eq!(reply.responses, vec![Response::NewInstance(expected)]);
    }
    client.call(&[Request::FocusIn { id: 1 }]).await.unwrap();
    drop(client);

    let frontend = frontend.finished().await;
    assert!(frontend.instances().is_empty());
    assert_eq!(frontend.instances().focused(), None);
}

#[tokio::test]
async fn session_mismatched_key_is_silent() {
    let frontend = RunningFrontEnd::start(FrontEndSettings::default()).await;
    let mut client = frontend.connect(Role::IMEngine).await.unwrap();
    let reply = client.call(&[new_echo_instance()]).await.unwrap();
    assert_eq!(reply.responses, vec![Response::NewInstance(0)]);

    // A batch under the wrong key would create one instance and delete another.
    let forged = request_transaction(
        client.key().wrapping_add(1),
        &[new_echo_instance(), Request::DeleteInstance { id: 0 }, Request::DeleteAllInstances],
    );
    client.send_raw(&forged).await.unwrap();

    // The first reply to arrive answers the genuine request, and instance 0
    // is still there.
    let reply = client.call(&[Request::GetClientCapabilities { id: 0 }]).await.unwrap();
    assert_eq!(reply.outcome, Outcome::Ok);
    assert!(matches!(reply.responses.as_slice(), [Response::ClientCapabilities(_)]));

    // Id 1 is still free, so the forged NEW_INSTANCE never ran.
    let reply = client.call(&[new_echo_instance()]).await.unwrap();
    assert_eq!(reply.responses, vec![Response::NewInstance(1)]);

    let reply = client.call(&[Request::GetFactoryName { uuid: ECHO_FACTORY_UUID.into() }]).await.unwrap();
    assert_eq!(reply.responses, vec![Response::FactoryName(WideString::from("Echo"))]);

    // Nothing else was sent for the forged batch.
    assert!(tokio::time::timeout(Duration::from_millis(200), client.next_update()).await.is_err());

    let frontend = frontend.stop().await;
    assert_eq!(frontend.instances().ids().collect::<Vec<_>>(), vec![0, 1]);
}

#[tokio::test]
async fn session_handshake_rejects_unaccepted_role() {
    let frontend = RunningFrontEnd::start(FrontEndSettings::default()).await;
    for role in [Role::Panel, Role::Helper] {
        let result = frontend.connect(role).await;
        assert!(matches!(result, Err(ClientError::HandshakeRejected)), "{:?} accepted", role);
    }

    // A client that only accepts another server role refuses the frontend.
    let result = SocketClient::connect(&frontend.address, Role::IMEngine, &[Role::HelperManager], TIMEOUT).await;
    assert!(result.is_err());

    let frontend = frontend.stop().await;
    assert_eq!(frontend.client_count(), 0);
}

#[tokio::test]
async fn session_focus_change_pushes_to_previous_owner() {
    let frontend = RunningFrontEnd::start(FrontEndSettings::default()).await;
    let mut first = frontend.connect(Role::IMEngine).await.unwrap();
    let mut second = frontend.connect(Role::IMEngine).await.unwrap();

    first.call(&[new_echo_instance(), Request::FocusIn { id: 0 }]).await.unwrap();
    first.call(&[type_key(0, 'k')]).await.unwrap();
    let reply = second.call(&[new_echo_instance(), Request::FocusIn { id: 1 }]).await.unwrap();
    assert!(reply.is_ok());

    let update = tokio::time::timeout(TIMEOUT, first.next_update()).await.unwrap().unwrap();
    assert_eq!(update.instance, 0);
    assert!(update.events.contains(&UiEvent::CommitString(WideString::from("k"))));

    // The other connection's instance stays off limits.
    let reply = second.call(&[type_key(0, 'x')]).await.unwrap();
    assert_eq!(reply.outcome, Outcome::Fail);

    let frontend = frontend.stop().await;
    assert_eq!(frontend.instances().focused(), Some(1));
}

#[tokio::test]
async fn session_config_client() {
    let frontend = RunningFrontEnd::start(FrontEndSettings::default()).await;
    let mut config = frontend.connect(Role::Config).await.unwrap();

    let reply = config
        .call(&[
            Request::SetConfig { key: "/Panel/Gtk/FontSize".into(), value: ConfigValue::Int(12) },
            Request::GetConfig { kind: ConfigKind::Int, key: "/Panel/Gtk/FontSize".into() },
        ])
        .await
        .unwrap();
    assert!(reply.is_ok());
    assert_eq!(reply.responses, vec![Response::Config(ConfigValue::Int(12))]);

    let reply = config.call(&[new_echo_instance()]).await.unwrap();
    assert_eq!(reply.outcome, Outcome::Fail);
    assert!(reply.responses.is_empty());

    let frontend = frontend.stop().await;
    assert_eq!(frontend.store().read("/Panel/Gtk/FontSize"), Some(&ConfigValue::Int(12)));
    assert!(frontend.instances().is_empty());
}
