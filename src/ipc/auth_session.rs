//! Registered clients and their connection keys.

use std::collections::HashMap;

use rand::RngCore;

use super::protocol_types::Role;
use super::server::ConnectionId;

/// Identity of a connection that completed the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub key: u32,
    pub role: Role,
}

/// Clients keyed by connection.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ConnectionId, ClientInfo>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnectionId, info: ClientInfo) {
        self.clients.insert(id, info);
    }

    pub fn get(&self, id: ConnectionId) -> Option<ClientInfo> {
        self.clients.get(&id).copied()
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<ClientInfo> {
        self.clients.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = ConnectionId> + '_ {
        self.clients
            .iter()
            .filter(move |(_, info)| info.role == role)
            .map(|(id, _)| *id)
    }
}

/// Constant-time key comparison.
pub fn keys_match(a: u32, b: u32) -> bool {
    a.to_le_bytes()
        .iter()
        .zip(b.to_le_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Fresh connection key from the OS random source.
pub fn generate_key() -> u32 {
    rand::rngs::OsRng.next_u32()
}
