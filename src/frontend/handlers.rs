//! Request handlers of the SocketFrontEnd.

use std::fs;

use tracing::{debug, info};

use crate::engine::{normalize_language, BackendError, FactoryInfo, ImEngine};
use crate::instance::{InstanceError, InstanceRecord, NewInstance};
use crate::ipc::protocol::ConfigValue;
use crate::ipc::transaction::{KeyEvent, WideString};
use crate::ipc::{ConnectionId, Request, Response, Role, UiEvent};

use super::context::{HandlerError, RequestContext};
use super::dispatch::{SocketFrontEnd, DEFAULT_FACTORY_PREFIX, MAX_LOAD_FILE_SIZE};
use super::hotkeys::{FrontEndAction, FrontEndHotkeys, HOTKEY_PREFIX};

type Record = InstanceRecord<Box<dyn ImEngine>>;

impl SocketFrontEnd {
    pub(super) fn handle(&mut self, rc: &mut RequestContext, request: Request) -> Result<(), HandlerError> {
        let command = request.command();
        if rc.role == Role::Config && !request.is_config() {
            return Err(HandlerError::Forbidden { role: rc.role, command });
        }

        match request {
            Request::CloseConnection => Ok(()),
            Request::LoadFile { path } => {
                let content = self.load_file(&path)?;
                rc.respond(Response::FileContent(content));
                Ok(())
            }

            Request::NewInstance { factory_uuid, encoding } => {
                let (id, _) = self.new_instance(rc.connection, &factory_uuid, &encoding, false)?;
                rc.respond(Response::NewInstance(id));
                Ok(())
            }
            Request::AttachSharedInstance { factory_uuid, encoding } => {
                let id = self.attach_shared_instance(rc, &factory_uuid, &encoding)?;
                rc.respond(Response::NewInstance(id));
                Ok(())
            }
            Request::DeleteInstance { id } => self.delete_instance(rc, id),
            Request::DeleteAllInstances => {
                for id in self.instances.owned_by(rc.connection) {
                    self.remove_instance(rc, id);
                }
                self.instances.detach_all(rc.connection);
                Ok(())
            }

            Request::ProcessKeyEvent { id, key } => self.process_key_event(rc, id, &key),
            Request::MovePreeditCaret { id, caret } => {
                self.with_engine(rc, id, |r, events| r.engine.move_preedit_caret(caret, events))
            }
            Request::SelectCandidate { id, index } => {
                self.with_engine(rc, id, |r, events| r.engine.select_candidate(index, events))
            }
            Request::UpdateLookupTablePageSize { id, size } => {
                self.with_engine(rc, id, |r, events| r.engine.update_lookup_table_page_size(size, events))
            }
            Request::LookupTablePageUp { id } => self.with_engine(rc, id, |r, events| r.engine.lookup_table_page_up(events)),
            Request::LookupTablePageDown { id } => {
                self.with_engine(rc, id, |r, events| r.engine.lookup_table_page_down(events))
            }
            Request::Reset { id } => self.with_engine(rc, id, |r, events| r.engine.reset(events)),
            Request::FocusIn { id } => self.focus_in(rc, id),
            Request::FocusOut { id } => self.focus_out(rc, id),
            Request::TriggerProperty { id, property } => {
                self.with_engine(rc, id, |r, events| r.engine.trigger_property(&property, events))
            }
            Request::ProcessHelperEvent { id, helper_uuid, event } => self.with_engine(rc, id, |r, events| {
                r.engine.process_helper_event(&helper_uuid, &event, events)
            }),
            Request::UpdateClientCapabilities { id, capabilities } => self.with_engine(rc, id, |r, _| {
                r.capabilities = capabilities;
                r.engine.update_client_capabilities(capabilities);
            }),
            Request::GetClientCapabilities { id } => {
                let capabilities = self.instances.access(id, rc.connection)?.capabilities;
                rc.respond(Response::ClientCapabilities(capabilities));
                Ok(())
            }

            Request::GetFactoryList { encoding } => {
                let uuids = self
                    .backend
                    .factories_for_encoding(&encoding)
                    .into_iter()
                    .map(|info| info.uuid.clone())
                    .collect();
                rc.respond(Response::FactoryList(uuids));
                Ok(())
            }
            Request::GetFactoryName { uuid } => {
                let name = WideString::from(self.factory_info(&uuid)?.name.as_str());
                rc.respond(Response::FactoryName(name));
                Ok(())
            }
            Request::GetFactoryLocales { uuid } => {
                rc.respond(Response::FactoryLocales(self.factory_info(&uuid)?.locales.clone()));
                Ok(())
            }
            Request::GetFactoryLanguage { uuid } => {
                rc.respond(Response::FactoryLanguage(self.factory_info(&uuid)?.language.clone()));
                Ok(())
            }
            Request::GetFactoryIconFile { uuid } => {
                rc.respond(Response::FactoryIconFile(self.factory_info(&uuid)?.icon_file.clone()));
                Ok(())
            }

            Request::GetConfig { kind, key } => {
                let value = self
                    .store
                    .read_kind(&key, kind)
                    .ok_or(HandlerError::ConfigMissing(key))?;
                rc.respond(Response::Config(value));
                Ok(())
            }
            Request::SetConfig { key, value } => {
                self.store.write(&key, value)?;
                self.config_changed(&key);
                Ok(())
            }
            Request::EraseConfig { key } => {
                if !self.store.erase(&key) {
                    return Err(HandlerError::ConfigMissing(key));
                }
                self.config_changed(&key);
                Ok(())
            }
            Request::ReloadConfig => {
                self.store.reload()?;
                self.hotkeys = FrontEndHotkeys::load(self.store.as_ref());
                self.restore_default_factories();
                Ok(())
            }
            Request::FlushConfig => Ok(self.store.flush()?),

            Request::GetHelperList | Request::RunHelper { .. } => Err(HandlerError::Unsupported(command)),
        }
    }

    /// Run `f` on an instance the requester may use; its UI events go back
    /// to the requester.
    fn with_engine<R>(
        &mut self,
        rc: &mut RequestContext,
        id: u32,
        f: impl FnOnce(&mut Record, &mut Vec<UiEvent>) -> R,
    ) -> Result<R, HandlerError> {
        let record = self.instances.access(id, rc.connection)?;
        let mut events = Vec::new();
        let result = f(record, &mut events);
        rc.emit(rc.connection, id, events);
        Ok(result)
    }

    fn factory_info(&self, uuid: &str) -> Result<&FactoryInfo, HandlerError> {
        self.backend
            .info(uuid)
            .ok_or_else(|| BackendError::UnknownFactory(uuid.to_string()).into())
    }

    /// Explicit uuid, or the default factory of the configured language.
    fn resolve_factory(&self, uuid: &str, encoding: &str) -> Result<String, HandlerError> {
        if !uuid.is_empty() {
            return Ok(uuid.to_string());
        }
        self.backend
            .default_factory(&self.settings.language, encoding)
            .map(|info| info.uuid.clone())
            .ok_or_else(|| BackendError::NoFactory(encoding.to_string()).into())
    }

    fn new_instance(
        &mut self,
        owner: ConnectionId,
        uuid: &str,
        encoding: &str,
        shared: bool,
    ) -> Result<(u32, Option<u32>), HandlerError> {
        let uuid = self.resolve_factory(uuid, encoding)?;
        let language = normalize_language(&self.factory_info(&uuid)?.language);
        let id = self.instances.next_id();
        let engine = self.backend.create_instance(&uuid, encoding, id)?;
        let fresh = NewInstance {
            owner,
            factory_uuid: uuid,
            encoding: encoding.to_string(),
            language,
            shared,
        };
        info!(connection = %owner, instance = id, factory = %fresh.factory_uuid, shared, "Instance created");
        Ok(self.instances.insert(fresh, engine))
    }

    fn attach_shared_instance(&mut self, rc: &mut RequestContext, uuid: &str, encoding: &str) -> Result<u32, HandlerError> {
        let uuid = self.resolve_factory(uuid, encoding)?;
        let language = normalize_language(&self.factory_info(&uuid)?.language);
        if let Some(existing) = self.instances.shared_for(&language) {
            let reusable = self
                .instances
                .get(existing)
                .is_some_and(|r| r.factory_uuid == uuid && r.encoding.eq_ignore_ascii_case(encoding));
            if reusable {
                self.instances.attach(existing, rc.connection)?;
                debug!(connection = %rc.connection, instance = existing, "Attached to shared instance");
                return Ok(existing);
            }
        }

        let (id, displaced) = self.new_instance(rc.connection, &uuid, encoding, true)?;
        if let Some(old) = displaced {
            debug!(instance = old, replacement = id, "Shared instance replaced");
            self.remove_instance(rc, old);
        }
        Ok(id)
    }

    /// Delete an owned instance, or detach from a shared one.
    fn delete_instance(&mut self, rc: &mut RequestContext, id: u32) -> Result<(), HandlerError> {
        let owner = self.instances.get(id).ok_or(InstanceError::NotFound(id))?.owner;
        if owner != rc.connection {
            if self.instances.detach(id, rc.connection) {
                return Ok(());
            }
            return Err(InstanceError::NotOwner { id, connection: rc.connection }.into());
        }
        self.remove_instance(rc, id);
        Ok(())
    }

    /// Remove an instance, focusing it out first when it has focus.
    fn remove_instance(&mut self, rc: &mut RequestContext, id: u32) {
        if self.instances.focused() == Some(id) {
            self.focus_out_instance(rc, id);
        }
        if self.instances.remove(id).is_some() {
            debug!(instance = id, "Instance deleted");
        }
    }

    /// Focus out `id` on behalf of whoever owns it.
    fn focus_out_instance(&mut self, rc: &mut RequestContext, id: u32) {
        if let Some(record) = self.instances.get_mut(id) {
            let mut events = Vec::new();
            record.engine.focus_out(&mut events);
            let owner = record.owner;
            rc.emit(owner, id, events);
        }
        if self.instances.focused() == Some(id) {
            self.instances.set_focused(None);
        }
        self.hotkeys.reset();
    }

    fn focus_in(&mut self, rc: &mut RequestContext, id: u32) -> Result<(), HandlerError> {
        self.instances.access(id, rc.connection)?;
        if let Some(previous) = self.instances.focused().filter(|previous| *previous != id) {
            self.focus_out_instance(rc, previous);
        }
        self.instances.set_focused(Some(id));
        self.hotkeys.reset();
        self.with_engine(rc, id, |r, events| r.engine.focus_in(events))
    }

    fn focus_out(&mut self, rc: &mut RequestContext, id: u32) -> Result<(), HandlerError> {
        self.with_engine(rc, id, |r, events| r.engine.focus_out(events))?;
        if self.instances.focused() == Some(id) {
            self.instances.set_focused(None);
        }
        self.hotkeys.reset();
        Ok(())
    }

    fn process_key_event(&mut self, rc: &mut RequestContext, id: u32, key: &KeyEvent) -> Result<(), HandlerError> {
        self.instances.access(id, rc.connection)?;
        let handled = match self.hotkeys.check(key) {
            Some(action) => {
                self.apply_hotkey(rc, id, action)?;
                true
            }
            None => self.with_engine(rc, id, |r, events| r.enabled && r.engine.process_key_event(key, events))?,
        };
        if handled {
            Ok(())
        } else {
            Err(HandlerError::NotHandled)
        }
    }

    fn apply_hotkey(&mut self, rc: &mut RequestContext, id: u32, action: FrontEndAction) -> Result<(), HandlerError> {
        debug!(instance = id, action = ?action, "Frontend hotkey");
        match action {
            FrontEndAction::Trigger => {
                let enabled = self.instances.access(id, rc.connection)?.enabled;
                self.set_enabled(rc, id, !enabled)
            }
            FrontEndAction::On => self.set_enabled(rc, id, true),
            FrontEndAction::Off => self.set_enabled(rc, id, false),
            FrontEndAction::NextFactory => self.switch_factory(rc, id, true),
            FrontEndAction::PreviousFactory => self.switch_factory(rc, id, false),
        }
    }

    fn set_enabled(&mut self, rc: &mut RequestContext, id: u32, enabled: bool) -> Result<(), HandlerError> {
        self.with_engine(rc, id, |r, events| {
            if r.enabled == enabled {
                return;
            }
            r.enabled = enabled;
            if enabled {
                r.engine.focus_in(events);
            } else {
                r.engine.reset(events);
                events.extend([UiEvent::HidePreeditString, UiEvent::HideAuxString, UiEvent::HideLookupTable]);
            }
        })
    }

    /// Swap the engine of `id` for the next (or previous) factory serving
    /// its encoding and remember the choice as the language default.
    fn switch_factory(&mut self, rc: &mut RequestContext, id: u32, forward: bool) -> Result<(), HandlerError> {
        let record = self.instances.access(id, rc.connection)?;
        let (current, encoding) = (record.factory_uuid.clone(), record.encoding.clone());
        let next = if forward {
            self.backend.next_factory("", &encoding, &current)
        } else {
            self.backend.previous_factory("", &encoding, &current)
        };
        let Some(next) = next.map(|info| info.uuid.clone()) else {
            return Ok(());
        };
        if next == current {
            return Ok(());
        }

        let language = normalize_language(&self.factory_info(&next)?.language);
        let mut engine = self.backend.create_instance(&next, &encoding, id)?;
        let focused = self.instances.focused() == Some(id);
        let factory_uuid = next.clone();
        self.with_engine(rc, id, move |r, events| {
            r.engine.reset(events);
            if focused {
                r.engine.focus_out(events);
                engine.focus_in(events);
            }
            r.engine = engine;
            r.factory_uuid = factory_uuid;
            r.enabled = true;
        })?;
        if let Some(displaced) = self.instances.set_language(id, &language) {
            debug!(instance = displaced, replacement = id, "Shared instance replaced");
            self.remove_instance(rc, displaced);
        }
        info!(instance = id, from = %current, to = %next, "Factory switched");
        self.save_default_factory(&next)
    }

    fn save_default_factory(&mut self, uuid: &str) -> Result<(), HandlerError> {
        let language = normalize_language(&self.settings.language);
        self.backend.set_default_factory(&language, uuid)?;
        let key = format!("{}{}", DEFAULT_FACTORY_PREFIX, language);
        self.store.write(&key, ConfigValue::String(uuid.to_string()))?;
        Ok(())
    }

    fn config_changed(&mut self, key: &str) {
        if key.starts_with(HOTKEY_PREFIX) {
            self.hotkeys = FrontEndHotkeys::load(self.store.as_ref());
        } else if let Some(language) = key.strip_prefix(DEFAULT_FACTORY_PREFIX) {
            if self.store.read_string(key).is_none() {
                if let Some(uuid) = self.backend.clear_default_factory(language) {
                    debug!(language, uuid = %uuid, "Default factory cleared");
                }
            }
            self.restore_default_factories();
        }
    }

    /// Contents of a regular file under one of the configured roots.
    fn load_file(&self, path: &str) -> Result<Vec<u8>, HandlerError> {
        let denied = || HandlerError::FileDenied(path.to_string());
        let requested = fs::canonicalize(path).map_err(|_| denied())?;
        let allowed = self
            .settings
            .load_file_roots
            .iter()
            .filter_map(|root| fs::canonicalize(root).ok())
            .any(|root| requested.starts_with(root));
        if !allowed {
            return Err(denied());
        }
        let metadata = fs::metadata(&requested)?;
        if !metadata.is_file() {
            return Err(denied());
        }
        if metadata.len() > MAX_LOAD_FILE_SIZE {
            return Err(HandlerError::FileTooLarge {
                size: metadata.len(),
                max: MAX_LOAD_FILE_SIZE,
            });
        }
        Ok(fs::read(&requested)?)
    }
}
