//! Transaction wire format, socket servers and clients.

pub mod address;
pub mod auth;
pub mod auth_session;
pub mod client;
pub mod connections;
pub mod protocol;
mod protocol_codec;
mod protocol_types;
pub mod server;
pub mod transaction;
pub mod transaction_codec;
mod transaction_types;

pub use address::{Address, AddressError};
pub use auth::{AuthError, ClientAuth, HandshakePolicy};
pub use auth_session::ClientInfo;
pub use client::{ClientError, SocketClient};
pub use protocol::{Command, Reply, Request, Response, Role, UiEvent};
pub use server::{ConnectionId, ConnectionServer, ServerConfig, ServerContext, ServerError, ServerHandler};
pub use transaction::{Transaction, TransactionError, TransactionReader};
