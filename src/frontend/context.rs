//! Per-transaction dispatch state.

use thiserror::Error;

use crate::engine::BackendError;
use crate::config::StoreError;
use crate::instance::InstanceError;
use crate::ipc::protocol::{InstanceUpdate, Outcome, Reply};
use crate::ipc::{Command, ConnectionId, Response, Role, UiEvent};

/// Why a single command of a batch failed. Any of these turns the batch
/// terminal marker into `FAIL`.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Key event not handled")]
    NotHandled,

    #[error("{role} clients may not issue {command:?}")]
    Forbidden { role: Role, command: Command },

    #[error("{0:?} is not served here")]
    Unsupported(Command),

    #[error("Config key not found: {0}")]
    ConfigMissing(String),

    #[error("File outside the allowed roots: {0}")]
    FileDenied(String),

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything one inbound transaction produces.
///
/// UI events of the instance the request addresses go into the reply; events
/// of any other instance become pushes to that instance's owner.
#[derive(Debug)]
pub struct RequestContext {
    pub connection: ConnectionId,
    pub role: Role,
    pub current_instance: Option<u32>,
    pub reply: Vec<Response>,
    pub pushes: Vec<(ConnectionId, InstanceUpdate)>,
    pub failed: bool,
    pub close_requested: bool,
}

impl RequestContext {
    pub fn new(connection: ConnectionId, role: Role) -> Self {
        Self {
            connection,
            role,
            current_instance: None,
            reply: Vec::new(),
            pushes: Vec::new(),
            failed: false,
            close_requested: false,
        }
    }

    pub fn respond(&mut self, response: Response) {
        self.reply.push(response);
    }

    /// Route UI events produced by instance `id`, owned by `owner`.
    pub fn emit(&mut self, owner: ConnectionId, id: u32, events: Vec<UiEvent>) {
        if events.is_empty() {
            return;
        }
        if owner == self.connection && self.current_instance == Some(id) {
            self.reply.extend(events.into_iter().map(Response::Ui));
            return;
        }
        match self.pushes.last_mut() {
            Some((target, update)) if *target == owner && update.instance == id => update.events.extend(events),
            _ => self.pushes.push((owner, InstanceUpdate { instance: id, events })),
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.failed {
            Outcome::Fail
        } else {
            Outcome::Ok
        }
    }

    pub fn take_reply(&mut self) -> Reply {
        Reply {
            responses: std::mem::take(&mut self.reply),
            outcome: self.outcome(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_routes_by_instance() {
        let mut rc = RequestContext::new(ConnectionId(1), Role::IMEngine);
        rc.current_instance = Some(3);
        rc.emit(ConnectionId(1), 3, vec![UiEvent::Beep]);
        rc.emit(ConnectionId(2), 0, vec![UiEvent::HidePreeditString]);
        rc.emit(ConnectionId(2), 0, vec![UiEvent::HideLookupTable]);
        rc.emit(ConnectionId(1), 4, vec![UiEvent::Beep]);
        rc.emit(ConnectionId(1), 5, Vec::new());

        assert_eq!(rc.reply, vec![Response::Ui(UiEvent::Beep)]);
        assert_eq!(rc.pushes.len(), 2);
        assert_eq!(rc.pushes[0].0, ConnectionId(2));
        assert_eq!(rc.pushes[0].1.events.len(), 2);
        assert_eq!(rc.pushes[1].1.instance, 4);
    }

    #[test]
    fn test_outcome() {
        let mut rc = RequestContext::new(ConnectionId(1), Role::Config);
        rc.respond(Response::ClientCapabilities(1));
        assert_eq!(rc.outcome(), Outcome::Ok);
        rc.failed = true;
        let reply = rc.take_reply();
        assert_eq!(reply.outcome, Outcome::Fail);
        assert_eq!(reply.responses.len(), 1);
        assert!(rc.reply.is_empty());
    }
}
