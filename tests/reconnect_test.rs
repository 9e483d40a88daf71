// Copyright 2024-2026 ime-bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bridge client behaviour across frontend restarts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use ime_bridge::config::FileConfig;
use ime_bridge::engine::{BackEnd, EchoFactory, ECHO_FACTORY_UUID};
use ime_bridge::frontend::{BridgeClient, FrontEndSettings, SocketFrontEnd, MAX_RECONNECT_ATTEMPTS};
use ime_bridge::ipc::transaction::KeyEvent;
use ime_bridge::ipc::{Address, ClientError, ConnectionServer, Request, Response, ServerConfig, ServerError, UiEvent};

const TIMEOUT: Duration = Duration::from_millis(500);

struct Frontend {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<(Result<(), ServerError>, SocketFrontEnd)>,
}

async fn start(dir: &Path, address: &Address) -> Frontend {
    let mut backend = BackEnd::new();
    backend.register_factory(Arc::new(EchoFactory::new())).unwrap();
    let store = FileConfig::open(dir.join("store.toml")).unwrap();
    let mut frontend = SocketFrontEnd::new(backend, Box::new(store), FrontEndSettings::default());

    let config = ServerConfig { timeout: TIMEOUT, ..Default::default() };
    let server = ConnectionServer::bind(address, config).await.unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let result = server.run(&mut frontend, shutdown_rx).await;
        (result, frontend)
    });
    Frontend { shutdown, task }
}

async fn stop(frontend: Frontend) -> SocketFrontEnd {
    let _ = frontend.shutdown.send(true);
    let (result, frontend) = frontend.task.await.unwrap();
    result.unwrap();
    frontend
}

fn press(ch: char) -> KeyEvent {
    KeyEvent::press(ch as u32)
}

#[tokio::test]
async fn bridge_client_recreates_instances_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let address = Address::Local(dir.path().join("frontend.sock"));
    let first = start(dir.path(), &address).await;

    let mut client = BridgeClient::connect(address.clone(), TIMEOUT).await.unwrap();
    let a = client.new_instance(ECHO_FACTORY_UUID, "UTF-8").await.unwrap();
    let b = client.new_instance("", "UTF-8").await.unwrap();
    client.delete_instance(a).await.unwrap();
    assert_eq!(client.instances(), vec![b]);
    assert_eq!(client.remote_id(b), Some(1));

    let old = stop(first).await;
    assert_eq!(old.instances().len(), 1);
    let second = start(dir.path(), &address).await;

    // The first call after the restart reconnects, recreates and retries.
    let reply = client.call(&[Request::ProcessKeyEvent { id: b, key: press('z') }]).await.unwrap();
    assert!(reply.is_ok());
    assert!(reply.ui_events().any(|e| matches!(e, UiEvent::ShowPreeditString)));
    assert!(client.is_connected());
    assert_eq!(client.remote_id(b), Some(0));

    let reply = client.call(&[Request::GetClientCapabilities { id: b }]).await.unwrap();
    assert!(matches!(reply.responses.as_slice(), [Response::ClientCapabilities(_)]));

    let restarted = stop(second).await;
    assert_eq!(restarted.instances().len(), 1);
}

#[tokio::test]
async fn bridge_client_gives_up_after_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let address = Address::Local(dir.path().join("frontend.sock"));
    let frontend = start(dir.path(), &address).await;

    let mut client = BridgeClient::connect(address.clone(), TIMEOUT).await.unwrap();
    let id = client.new_instance("", "UTF-8").await.unwrap();
    stop(frontend).await;
    let _ = std::fs::remove_file(dir.path().join("frontend.sock"));

    let result = client.call(&[Request::Reset { id }]).await;
    assert!(matches!(result, Err(ClientError::ReconnectFailed(n)) if n == MAX_RECONNECT_ATTEMPTS));
    assert!(!client.is_connected());
    assert_eq!(client.instances(), vec![id]);
}

#[tokio::test]
async fn bridge_client_refused_request_does_not_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let address = Address::Local(dir.path().join("frontend.sock"));
    let frontend = start(dir.path(), &address).await;

    let mut client = BridgeClient::connect(address, TIMEOUT).await.unwrap();
    let result = client.new_instance("no-such-factory", "UTF-8").await;
    assert!(matches!(result, Err(ClientError::RequestFailed)));
    assert!(client.is_connected());
    assert!(client.instances().is_empty());

    // Unknown local ids never reach the server.
    assert!(matches!(
        client.call(&[Request::FocusIn { id: 42 }]).await,
        Err(ClientError::RequestFailed)
    ));

    let frontend = stop(frontend).await;
    assert!(frontend.instances().is_empty());
}
