//! `factories` and `helpers` commands: query running servers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BridgeConfig;
use crate::helper::HelperManagerClient;
use crate::ipc::protocol::HelperInfo;
use crate::ipc::{Address, ClientError, Request, Response, Role, SocketClient};

use super::query_format::{print_factories_human, print_helpers_human};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryStatus {
    pub uuid: String,
    pub name: String,
    pub language: String,
    pub locales: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperStatus {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub flags: Vec<String>,
}

impl From<HelperInfo> for HelperStatus {
    fn from(info: HelperInfo) -> Self {
        Self {
            flags: option_flags(info.option),
            uuid: info.uuid,
            name: info.name,
            description: info.description,
        }
    }
}

/// Run the factories command and display results.
pub async fn run_factories(config: &BridgeConfig, json_output: bool) -> i32 {
    let address = match config.frontend_address() {
        Ok(address) => address,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 2;
        }
    };
    match fetch_factories(&address, config.socket_timeout()).await {
        Ok(factories) => {
            if json_output {
                print_json(&factories)
            } else {
                print_factories_human(&factories);
                0
            }
        }
        Err(e) => {
            eprintln!("Error querying frontend: {}", e);
            exit_code(&e)
        }
    }
}

/// Run the helpers command and display results.
pub async fn run_helpers(config: &BridgeConfig, json_output: bool) -> i32 {
    let address = match config.helper_manager_address() {
        Ok(address) => address,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 2;
        }
    };
    match fetch_helpers(&address, config.socket_timeout()).await {
        Ok(helpers) => {
            if json_output {
                print_json(&helpers)
            } else {
                print_helpers_human(&helpers);
                0
            }
        }
        Err(e) => {
            eprintln!("Error querying helper manager: {}", e);
            exit_code(&e)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Failed to encode JSON: {}", e);
            1
        }
    }
}

fn exit_code(error: &ClientError) -> i32 {
    match error {
        ClientError::Address(_) | ClientError::HandshakeRejected | ClientError::UnexpectedServerRole(_) => 3,
        e if e.is_connection_lost() => 3,
        _ => 1,
    }
}

async fn fetch_factories(address: &Address, timeout: Duration) -> Result<Vec<FactoryStatus>, ClientError> {
    let mut client = SocketClient::connect(address, Role::IMEngine, &[Role::FrontEnd], timeout).await?;

    let reply = client.call(&[Request::GetFactoryList { encoding: String::new() }]).await?;
    let uuids = reply
        .responses
        .into_iter()
        .find_map(|response| match response {
            Response::FactoryList(uuids) => Some(uuids),
            _ => None,
        })
        .ok_or(ClientError::UnexpectedResponse)?;

    let details: Vec<Request> = uuids
        .iter()
        .flat_map(|uuid| {
            [
                Request::GetFactoryName { uuid: uuid.clone() },
                Request::GetFactoryLanguage { uuid: uuid.clone() },
                Request::GetFactoryLocales { uuid: uuid.clone() },
            ]
        })
        .collect();
    let reply = client.call(&details).await?;
    let factories = build_factory_list(&uuids, &reply.responses)?;
    client.close().await?;
    Ok(factories)
}

async fn fetch_helpers(address: &Address, timeout: Duration) -> Result<Vec<HelperStatus>, ClientError> {
    let mut client = HelperManagerClient::connect(address, Role::Panel, timeout).await?;
    let helpers = client.list_helpers().await?;
    client.close().await?;
    Ok(helpers.into_iter().map(HelperStatus::from).collect())
}

/// Pair each uuid with its name, language and locales responses.
pub fn build_factory_list(uuids: &[String], responses: &[Response]) -> Result<Vec<FactoryStatus>, ClientError> {
    if responses.len() != uuids.len() * 3 {
        return Err(ClientError::UnexpectedResponse);
    }
    uuids
        .iter()
        .zip(responses.chunks(3))
        .map(|(uuid, chunk)| match chunk {
            [Response::FactoryName(name), Response::FactoryLanguage(language), Response::FactoryLocales(locales)] => {
                Ok(FactoryStatus {
                    uuid: uuid.clone(),
                    name: name.to_string(),
                    language: language.clone(),
                    locales: locales
                        .split(',')
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect(),
                })
            }
            _ => Err(ClientError::UnexpectedResponse),
        })
        .collect()
}

/// Names of the helper option bits set in `option`.
pub fn option_flags(option: u32) -> Vec<String> {
    [
        (HelperInfo::STAND_ALONE, "stand-alone"),
        (HelperInfo::AUTO_START, "auto-start"),
        (HelperInfo::AUTO_RESTART, "auto-restart"),
        (HelperInfo::NEED_SCREEN_INFO, "need-screen-info"),
        (HelperInfo::NEED_SPOT_LOCATION_INFO, "need-spot-location-info"),
    ]
    .into_iter()
    .filter(|(bit, _)| option & bit != 0)
    .map(|(_, name)| name.to_string())
    .collect()
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
