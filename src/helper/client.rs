//! Client side of the helper manager.

use std::time::Duration;

use crate::ipc::protocol::HelperInfo;
use crate::ipc::{Address, ClientError, Request, Response, Role, SocketClient};

pub struct HelperManagerClient {
    client: SocketClient,
}

impl HelperManagerClient {
    /// Connect as `role`, which must be one the manager accepts.
    pub async fn connect(address: &Address, role: Role, timeout: Duration) -> Result<Self, ClientError> {
        let client = SocketClient::connect(address, role, &[Role::HelperManager], timeout).await?;
        Ok(Self { client })
    }

    pub async fn list_helpers(&mut self) -> Result<Vec<HelperInfo>, ClientError> {
        let reply = self.client.call(&[Request::GetHelperList]).await?;
        if !reply.is_ok() {
            return Err(ClientError::RequestFailed);
        }
        reply
            .responses
            .into_iter()
            .find_map(|response| match response {
                Response::HelperList(helpers) => Some(helpers),
                _ => None,
            })
            .ok_or(ClientError::UnexpectedResponse)
    }

    pub async fn run_helper(&mut self, uuid: &str, config_name: &str, display: &str) -> Result<(), ClientError> {
        let reply = self
            .client
            .call(&[Request::RunHelper {
                uuid: uuid.to_string(),
                config_name: config_name.to_string(),
                display: display.to_string(),
            }])
            .await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(ClientError::RequestFailed)
        }
    }

    pub async fn close(self) -> Result<(), ClientError> {
        self.client.close().await
    }
}
