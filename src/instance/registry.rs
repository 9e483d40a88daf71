//! Registry of live engine instances.
//!
//! Owned by the dispatch actor, so it needs no locking. Ids are the lowest
//! unused value and are reused after deletion.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::ipc::ConnectionId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Instance {0} not found")]
    NotFound(u32),
    #[error("Instance {id} is not owned by connection {connection}")]
    NotOwner { id: u32, connection: ConnectionId },
}

/// Everything the frontend knows about one instance.
#[derive(Debug)]
pub struct InstanceRecord<E> {
    pub id: u32,
    pub owner: ConnectionId,
    pub factory_uuid: String,
    pub encoding: String,
    pub language: String,
    pub enabled: bool,
    pub capabilities: u32,
    pub shared: bool,
    /// Non-owners that attached to a shared instance.
    pub attachments: Vec<ConnectionId>,
    pub engine: E,
}

/// Parameters of a new instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub owner: ConnectionId,
    pub factory_uuid: String,
    pub encoding: String,
    pub language: String,
    pub shared: bool,
}

pub struct InstanceRegistry<E> {
    instances: BTreeMap<u32, InstanceRecord<E>>,
    focused: Option<u32>,
    shared: HashMap<String, u32>,
}

impl<E> InstanceRegistry<E> {
    pub fn new() -> Self {
        Self { instances: BTreeMap::new(), focused: None, shared: HashMap::new() }
    }

    /// Id the next [`insert`](Self::insert) will assign.
    pub fn next_id(&self) -> u32 {
        let mut id = 0;
        for used in self.instances.keys() {
            if *used != id {
                break;
            }
            id += 1;
        }
        id
    }

    /// Register an instance and return its id. A shared instance becomes the
    /// shared instance of its language; the id it displaces is returned too.
    pub fn insert(&mut self, fresh: NewInstance, engine: E) -> (u32, Option<u32>) {
        let id = self.next_id();
        let displaced = if fresh.shared {
            self.shared.insert(fresh.language.clone(), id)
        } else {
            None
        };
        self.instances.insert(
            id,
            InstanceRecord {
                id,
                owner: fresh.owner,
                factory_uuid: fresh.factory_uuid,
                encoding: fresh.encoding,
                language: fresh.language,
                enabled: true,
                capabilities: 0,
                shared: fresh.shared,
                attachments: Vec::new(),
                engine,
            },
        );
        if let Some(old) = displaced.and_then(|old| self.instances.get_mut(&old)) {
            old.shared = false;
        }
        (id, displaced)
    }

    pub fn get(&self, id: u32) -> Option<&InstanceRecord<E>> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut InstanceRecord<E>> {
        self.instances.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.instances.contains_key(&id)
    }

    /// Look up `id` on behalf of `connection`. Shared instances are open to everyone.
    pub fn access(&mut self, id: u32, connection: ConnectionId) -> Result<&mut InstanceRecord<E>, InstanceError> {
        let record = self.instances.get_mut(&id).ok_or(InstanceError::NotFound(id))?;
        if record.owner != connection && !record.shared {
            return Err(InstanceError::NotOwner { id, connection });
        }
        Ok(record)
    }

    /// Remove an instance, clearing focus and shared bookkeeping that pointed at it.
    pub fn remove(&mut self, id: u32) -> Option<InstanceRecord<E>> {
        let record = self.instances.remove(&id)?;
        if self.focused == Some(id) {
            self.focused = None;
        }
        if record.shared && self.shared.get(&record.language) == Some(&id) {
            self.shared.remove(&record.language);
        }
        Some(record)
    }

    /// Move `id` to `language`, re-keying the shared index when it is the
    /// shared instance of its old language. Returns the shared instance of
    /// `language` it displaces, which stops being shared.
    pub fn set_language(&mut self, id: u32, language: &str) -> Option<u32> {
        let record = self.instances.get_mut(&id)?;
        if record.language == language {
            return None;
        }
        let old = std::mem::replace(&mut record.language, language.to_string());
        if !record.shared {
            return None;
        }
        if self.shared.get(&old) == Some(&id) {
            self.shared.remove(&old);
        }
        let displaced = self.shared.insert(language.to_string(), id).filter(|other| *other != id);
        if let Some(other) = displaced.and_then(|other| self.instances.get_mut(&other)) {
            other.shared = false;
        }
        displaced
    }

    /// Record `connection` as a user of the shared instance `id`.
    pub fn attach(&mut self, id: u32, connection: ConnectionId) -> Result<(), InstanceError> {
        let record = self.instances.get_mut(&id).ok_or(InstanceError::NotFound(id))?;
        if record.owner != connection && !record.attachments.contains(&connection) {
            record.attachments.push(connection);
        }
        Ok(())
    }

    /// Drop `connection`'s attachment to `id`. Returns whether it was attached.
    pub fn detach(&mut self, id: u32, connection: ConnectionId) -> bool {
        match self.instances.get_mut(&id) {
            Some(record) => {
                let before = record.attachments.len();
                record.attachments.retain(|c| *c != connection);
                record.attachments.len() != before
            }
            None => false,
        }
    }

    pub fn detach_all(&mut self, connection: ConnectionId) {
        for record in self.instances.values_mut() {
            record.attachments.retain(|c| *c != connection);
        }
    }

    pub fn owned_by(&self, owner: ConnectionId) -> Vec<u32> {
        self.instances
            .values()
            .filter(|record| record.owner == owner)
            .map(|record| record.id)
            .collect()
    }

    pub fn focused(&self) -> Option<u32> {
        self.focused
    }

    /// Record the focused instance and return the previous one.
    pub fn set_focused(&mut self, id: Option<u32>) -> Option<u32> {
        std::mem::replace(&mut self.focused, id)
    }

    pub fn shared_for(&self, language: &str) -> Option<u32> {
        self.shared.get(language).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.instances.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl<E> Default for InstanceRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
