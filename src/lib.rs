//! ime-bridge: input method coordination over local sockets.
//!
//! Clients (IMEngine bridges, config tools, panels) connect to a
//! [`frontend::SocketFrontEnd`] or a [`helper::HelperManager`] and exchange
//! [`ipc::Transaction`]s after a role handshake. The frontend owns engine
//! instances created from registered factories and routes their UI events
//! back to the owning connection.

pub mod cli;
pub mod config;
pub mod engine;
pub mod frontend;
pub mod helper;
pub mod hotkey;
pub mod instance;
pub mod ipc;
pub mod logging;

pub use config::BridgeConfig;
pub use frontend::{FrontEndSettings, SocketFrontEnd};
pub use helper::HelperManager;
pub use ipc::{Address, ConnectionServer, ServerConfig, Transaction};
