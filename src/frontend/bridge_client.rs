//! IMEngine-bridge client: drives remote engine instances through a
//! SocketFrontEnd and survives server restarts.
//!
//! Callers address instances by local ids that stay stable across
//! reconnects; the remote ids behind them are rewritten on every call.

use std::collections::BTreeMap;
use std::io::{Error as IoError, ErrorKind};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::ipc::protocol::{InstanceUpdate, Outcome};
use crate::ipc::{Address, ClientError, Reply, Request, Response, Role, SocketClient};

/// Reconnect attempts made after the connection is lost, before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

const RECONNECT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct RemoteInstance {
    remote: u32,
    factory_uuid: String,
    encoding: String,
    shared: bool,
}

pub struct BridgeClient {
    address: Address,
    timeout: Duration,
    client: Option<SocketClient>,
    instances: BTreeMap<u32, RemoteInstance>,
    next_local: u32,
}

impl BridgeClient {
    pub async fn connect(address: Address, timeout: Duration) -> Result<Self, ClientError> {
        let client = Self::open(&address, timeout).await?;
        Ok(Self {
            address,
            timeout,
            client: Some(client),
            instances: BTreeMap::new(),
            next_local: 0,
        })
    }

    async fn open(address: &Address, timeout: Duration) -> Result<SocketClient, ClientError> {
        SocketClient::connect(address, Role::IMEngine, &[Role::FrontEnd], timeout).await
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Local ids of the live instances, ascending.
    pub fn instances(&self) -> Vec<u32> {
        self.instances.keys().copied().collect()
    }

    pub fn remote_id(&self, local: u32) -> Option<u32> {
        self.instances.get(&local).map(|instance| instance.remote)
    }

    /// Create an instance; an empty `factory_uuid` lets the server pick.
    pub async fn new_instance(&mut self, factory_uuid: &str, encoding: &str) -> Result<u32, ClientError> {
        self.create(factory_uuid, encoding, false).await
    }

    pub async fn attach_shared_instance(&mut self, factory_uuid: &str, encoding: &str) -> Result<u32, ClientError> {
        self.create(factory_uuid, encoding, true).await
    }

    async fn create(&mut self, factory_uuid: &str, encoding: &str, shared: bool) -> Result<u32, ClientError> {
        let request = creation_request(factory_uuid, encoding, shared);
        let reply = self.call(&[request]).await?;
        let remote = new_instance_result(&reply)?;

        let local = self.next_local;
        self.next_local += 1;
        self.instances.insert(
            local,
            RemoteInstance {
                remote,
                factory_uuid: factory_uuid.to_string(),
                encoding: encoding.to_string(),
                shared,
            },
        );
        debug!(local, remote, factory = factory_uuid, shared, "Instance created");
        Ok(local)
    }

    pub async fn delete_instance(&mut self, local: u32) -> Result<(), ClientError> {
        let reply = self.call(&[Request::DeleteInstance { id: local }]).await?;
        if !reply.is_ok() {
            return Err(ClientError::RequestFailed);
        }
        self.instances.remove(&local);
        Ok(())
    }

    /// Send one batch addressed by local ids. A lost connection triggers a
    /// reconnect and one retry of the batch.
    pub async fn call(&mut self, requests: &[Request]) -> Result<Reply, ClientError> {
        match self.try_call(requests).await {
            Err(e) if e.is_connection_lost() => {
                warn!(address = %self.address, error = %e, "Connection to frontend lost");
                self.reconnect().await?;
                self.try_call(requests).await
            }
            result => result,
        }
    }

    async fn try_call(&mut self, requests: &[Request]) -> Result<Reply, ClientError> {
        let mapped = self.to_remote(requests)?;
        let Some(client) = self.client.as_mut() else {
            return Err(IoError::new(ErrorKind::NotConnected, "not connected").into());
        };
        match client.call(&mapped).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.is_connection_lost() {
                    self.client = None;
                }
                Err(e)
            }
        }
    }

    fn to_remote(&self, requests: &[Request]) -> Result<Vec<Request>, ClientError> {
        requests
            .iter()
            .map(|request| {
                let mut request = request.clone();
                if let Some(id) = request.instance_id_mut() {
                    *id = self.remote_id(*id).ok_or(ClientError::RequestFailed)?;
                }
                Ok(request)
            })
            .collect()
    }

    async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.client = None;
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
            match self.restore().await {
                Ok(client) => {
                    info!(attempt, instances = self.instances.len(), "Reconnected to frontend");
                    self.client = Some(client);
                    return Ok(());
                }
                Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }
        Err(ClientError::ReconnectFailed(MAX_RECONNECT_ATTEMPTS))
    }

    /// Open a fresh connection and recreate every instance on it.
    async fn restore(&mut self) -> Result<SocketClient, ClientError> {
        let mut client = Self::open(&self.address, self.timeout).await?;
        for instance in self.instances.values_mut() {
            let request = creation_request(&instance.factory_uuid, &instance.encoding, instance.shared);
            let reply = client.call(&[request]).await?;
            instance.remote = new_instance_result(&reply)?;
        }
        Ok(client)
    }

    /// Pushed updates received so far, relabelled with local ids. Updates for
    /// instances this client no longer knows are dropped.
    pub fn take_updates(&mut self) -> Vec<InstanceUpdate> {
        let Some(client) = self.client.as_mut() else {
            return Vec::new();
        };
        let updates = client.take_updates();
        updates
            .into_iter()
            .filter_map(|mut update| {
                let local = self
                    .instances
                    .iter()
                    .find(|(_, instance)| instance.remote == update.instance)
                    .map(|(local, _)| *local)?;
                update.instance = local;
                Some(update)
            })
            .collect()
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.client.take() {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

fn creation_request(factory_uuid: &str, encoding: &str, shared: bool) -> Request {
    let factory_uuid = factory_uuid.to_string();
    let encoding = encoding.to_string();
    if shared {
        Request::AttachSharedInstance { factory_uuid, encoding }
    } else {
        Request::NewInstance { factory_uuid, encoding }
    }
}

fn new_instance_result(reply: &Reply) -> Result<u32, ClientError> {
    match (reply.outcome, reply.responses.as_slice()) {
        (Outcome::Ok, [Response::NewInstance(id)]) => Ok(*id),
        (Outcome::Fail, _) => Err(ClientError::RequestFailed),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_result() {
        let ok = Reply { responses: vec![Response::NewInstance(4)], outcome: Outcome::Ok };
        assert_eq!(new_instance_result(&ok).unwrap(), 4);

        let failed = Reply { responses: Vec::new(), outcome: Outcome::Fail };
        assert!(matches!(new_instance_result(&failed), Err(ClientError::RequestFailed)));

        let odd = Reply { responses: vec![Response::ClientCapabilities(1)], outcome: Outcome::Ok };
        assert!(matches!(new_instance_result(&odd), Err(ClientError::UnexpectedResponse)));
    }

    #[test]
    fn test_creation_request() {
        assert_eq!(
            creation_request("kana", "UTF-8", true),
            Request::AttachSharedInstance { factory_uuid: "kana".into(), encoding: "UTF-8".into() }
        );
        assert!(matches!(creation_request("", "UTF-8", false), Request::NewInstance { .. }));
    }
}
