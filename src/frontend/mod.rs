//! Socket frontend: dispatches client requests to engine instances.

pub mod bridge_client;
pub mod context;
mod dispatch;
mod handlers;
pub mod hotkeys;

pub use bridge_client::{BridgeClient, MAX_RECONNECT_ATTEMPTS};
pub use context::{HandlerError, RequestContext};
pub use dispatch::{FrontEndSettings, SocketFrontEnd, DEFAULT_FACTORY_PREFIX, MAX_LOAD_FILE_SIZE};
pub use hotkeys::{FrontEndAction, FrontEndHotkeys};
