//! Encode/decode between typed protocol messages and transactions.
//!
//! Decoding reads operands strictly in order. On an operand error the reader
//! may sit past the items already consumed; callers recover with
//! `skip_to_next_command`.

use super::protocol_types::*;
use super::transaction::{KeyEvent, Transaction, TransactionError, TransactionReader, WideString};

type Result<T> = std::result::Result<T, TransactionError>;

impl ConfigKind {
    pub fn get_command(self) -> Command {
        match self {
            ConfigKind::String => Command::GetConfigString,
            ConfigKind::Int => Command::GetConfigInt,
            ConfigKind::Bool => Command::GetConfigBool,
            ConfigKind::Double => Command::GetConfigDouble,
            ConfigKind::VectorString => Command::GetConfigVectorString,
            ConfigKind::VectorInt => Command::GetConfigVectorInt,
        }
    }

    pub fn set_command(self) -> Command {
        match self {
            ConfigKind::String => Command::SetConfigString,
            ConfigKind::Int => Command::SetConfigInt,
            ConfigKind::Bool => Command::SetConfigBool,
            ConfigKind::Double => Command::SetConfigDouble,
            ConfigKind::VectorString => Command::SetConfigVectorString,
            ConfigKind::VectorInt => Command::SetConfigVectorInt,
        }
    }

    pub fn result_command(self) -> Command {
        match self {
            ConfigKind::String => Command::ConfigString,
            ConfigKind::Int => Command::ConfigInt,
            ConfigKind::Bool => Command::ConfigBool,
            ConfigKind::Double => Command::ConfigDouble,
            ConfigKind::VectorString => Command::ConfigVectorString,
            ConfigKind::VectorInt => Command::ConfigVectorInt,
        }
    }

    const ALL: [ConfigKind; 6] = [
        ConfigKind::String,
        ConfigKind::Int,
        ConfigKind::Bool,
        ConfigKind::Double,
        ConfigKind::VectorString,
        ConfigKind::VectorInt,
    ];

    fn find(command: Command, select: fn(ConfigKind) -> Command) -> Option<ConfigKind> {
        Self::ALL.into_iter().find(|kind| select(*kind) == command)
    }
}

impl ConfigValue {
    fn encode(&self, t: &mut Transaction) {
        match self {
            ConfigValue::String(value) => t.put_string(value),
            ConfigValue::Int(value) => t.put_data(&(*value as u32)),
            ConfigValue::Bool(value) => t.put_data(&u32::from(*value)),
            ConfigValue::Double(value) => t.put_string(&value.to_string()),
            ConfigValue::VectorString(values) => t.put_data(values),
            ConfigValue::VectorInt(values) => {
                t.put_data(&values.iter().map(|v| *v as u32).collect::<Vec<u32>>())
            }
        }
    }

    fn decode(kind: ConfigKind, reader: &mut TransactionReader<'_>) -> Result<Self> {
        Ok(match kind {
            ConfigKind::String => ConfigValue::String(reader.get_data()?),
            ConfigKind::Int => ConfigValue::Int(reader.get_data::<u32>()? as i32),
            ConfigKind::Bool => ConfigValue::Bool(reader.get_data::<u32>()? != 0),
            ConfigKind::Double => {
                let text: String = reader.get_data()?;
                let parsed = text.trim().parse::<f64>();
                ConfigValue::Double(parsed.map_err(|_| TransactionError::InvalidNumber(text))?)
            }
            ConfigKind::VectorString => ConfigValue::VectorString(reader.get_data()?),
            ConfigKind::VectorInt => ConfigValue::VectorInt(
                reader.get_data::<Vec<u32>>()?.into_iter().map(|v| v as i32).collect(),
            ),
        })
    }
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::CloseConnection => Command::CloseConnection,
            Request::LoadFile { .. } => Command::LoadFile,
            Request::NewInstance { .. } => Command::NewInstance,
            Request::AttachSharedInstance { .. } => Command::AttachSharedInstance,
            Request::DeleteInstance { .. } => Command::DeleteInstance,
            Request::DeleteAllInstances => Command::DeleteAllInstances,
            Request::ProcessKeyEvent { .. } => Command::ProcessKeyEvent,
            Request::MovePreeditCaret { .. } => Command::MovePreeditCaret,
            Request::SelectCandidate { .. } => Command::SelectCandidate,
            Request::UpdateLookupTablePageSize { .. } => Command::UpdateLookupTablePageSize,
            Request::LookupTablePageUp { .. } => Command::LookupTablePageUp,
            Request::LookupTablePageDown { .. } => Command::LookupTablePageDown,
            Request::Reset { .. } => Command::Reset,
            Request::FocusIn { .. } => Command::FocusIn,
            Request::FocusOut { .. } => Command::FocusOut,
            Request::TriggerProperty { .. } => Command::TriggerProperty,
            Request::ProcessHelperEvent { .. } => Command::ProcessHelperEvent,
            Request::UpdateClientCapabilities { .. } => Command::UpdateClientCapabilities,
            Request::GetClientCapabilities { .. } => Command::GetClientCapabilities,
            Request::GetFactoryList { .. } => Command::GetFactoryList,
            Request::GetFactoryName { .. } => Command::GetFactoryName,
            Request::GetFactoryLocales { .. } => Command::GetFactoryLocales,
            Request::GetFactoryLanguage { .. } => Command::GetFactoryLanguage,
            Request::GetFactoryIconFile { .. } => Command::GetFactoryIconFile,
            Request::GetConfig { kind, .. } => kind.get_command(),
            Request::SetConfig { value, .. } => value.kind().set_command(),
            Request::EraseConfig { .. } => Command::EraseConfig,
            Request::ReloadConfig => Command::ReloadConfig,
            Request::FlushConfig => Command::FlushConfig,
            Request::GetHelperList => Command::GetHelperList,
            Request::RunHelper { .. } => Command::RunHelper,
        }
    }

    /// Instance the request addresses, if any.
    pub fn instance_id(&self) -> Option<u32> {
        match self {
            Request::DeleteInstance { id }
            | Request::ProcessKeyEvent { id, .. }
            | Request::MovePreeditCaret { id, .. }
            | Request::SelectCandidate { id, .. }
            | Request::UpdateLookupTablePageSize { id, .. }
            | Request::LookupTablePageUp { id }
            | Request::LookupTablePageDown { id }
            | Request::Reset { id }
            | Request::FocusIn { id }
            | Request::FocusOut { id }
            | Request::TriggerProperty { id, .. }
            | Request::ProcessHelperEvent { id, .. }
            | Request::UpdateClientCapabilities { id, .. }
            | Request::GetClientCapabilities { id } => Some(*id),
            _ => None,
        }
    }

    pub fn instance_id_mut(&mut self) -> Option<&mut u32> {
        match self {
            Request::DeleteInstance { id }
            | Request::ProcessKeyEvent { id, .. }
            | Request::MovePreeditCaret { id, .. }
            | Request::SelectCandidate { id, .. }
            | Request::UpdateLookupTablePageSize { id, .. }
            | Request::LookupTablePageUp { id }
            | Request::LookupTablePageDown { id }
            | Request::Reset { id }
            | Request::FocusIn { id }
            | Request::FocusOut { id }
            | Request::TriggerProperty { id, .. }
            | Request::ProcessHelperEvent { id, .. }
            | Request::UpdateClientCapabilities { id, .. }
            | Request::GetClientCapabilities { id } => Some(id),
            _ => None,
        }
    }

    /// Requests a config-role client may issue.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Request::GetConfig { .. }
                | Request::SetConfig { .. }
                | Request::EraseConfig { .. }
                | Request::ReloadConfig
                | Request::FlushConfig
                | Request::CloseConnection
        )
    }

    pub fn encode(&self, t: &mut Transaction) {
        t.put_command(self.command());
        match self {
            Request::CloseConnection
            | Request::DeleteAllInstances
            | Request::ReloadConfig
            | Request::FlushConfig
            | Request::GetHelperList => {}
            Request::LoadFile { path } => t.put_string(path),
            Request::NewInstance { factory_uuid, encoding }
            | Request::AttachSharedInstance { factory_uuid, encoding } => {
                t.put_string(factory_uuid);
                t.put_string(encoding);
            }
            Request::DeleteInstance { id }
            | Request::LookupTablePageUp { id }
            | Request::LookupTablePageDown { id }
            | Request::Reset { id }
            | Request::FocusIn { id }
            | Request::FocusOut { id }
            | Request::GetClientCapabilities { id } => t.put_data(id),
            Request::ProcessKeyEvent { id, key } => {
                t.put_data(id);
                t.put_data(key);
            }
            Request::MovePreeditCaret { id, caret: value }
            | Request::SelectCandidate { id, index: value }
            | Request::UpdateLookupTablePageSize { id, size: value }
            | Request::UpdateClientCapabilities { id, capabilities: value } => {
                t.put_data(id);
                t.put_data(value);
            }
            Request::TriggerProperty { id, property } => {
                t.put_data(id);
                t.put_string(property);
            }
            Request::ProcessHelperEvent { id, helper_uuid, event } => {
                t.put_data(id);
                t.put_string(helper_uuid);
                t.put_data(event);
            }
            Request::GetFactoryList { encoding } => t.put_string(encoding),
            Request::GetFactoryName { uuid }
            | Request::GetFactoryLocales { uuid }
            | Request::GetFactoryLanguage { uuid }
            | Request::GetFactoryIconFile { uuid } => t.put_string(uuid),
            Request::GetConfig { key, .. } | Request::EraseConfig { key } => t.put_string(key),
            Request::SetConfig { key, value } => {
                t.put_string(key);
                value.encode(t);
            }
            Request::RunHelper { uuid, config_name, display } => {
                t.put_string(uuid);
                t.put_string(config_name);
                t.put_string(display);
            }
        }
    }

    /// Read the operands of `command` from `reader`.
    pub fn decode(command: Command, reader: &mut TransactionReader<'_>) -> Result<Self> {
        let r = reader;
        Ok(match command {
            Command::CloseConnection => Request::CloseConnection,
            Command::LoadFile => Request::LoadFile { path: r.get_data()? },
            Command::NewInstance => Request::NewInstance {
                factory_uuid: r.get_data()?,
                encoding: r.get_data()?,
            },
            Command::AttachSharedInstance => Request::AttachSharedInstance {
                factory_uuid: r.get_data()?,
                encoding: r.get_data()?,
            },
            Command::DeleteInstance => Request::DeleteInstance { id: r.get_data()? },
            Command::DeleteAllInstances => Request::DeleteAllInstances,
            Command::ProcessKeyEvent => Request::ProcessKeyEvent {
                id: r.get_data()?,
                key: r.get_data::<KeyEvent>()?,
            },
            Command::MovePreeditCaret => Request::MovePreeditCaret { id: r.get_data()?, caret: r.get_data()? },
            Command::SelectCandidate => Request::SelectCandidate { id: r.get_data()?, index: r.get_data()? },
            Command::UpdateLookupTablePageSize => {
                Request::UpdateLookupTablePageSize { id: r.get_data()?, size: r.get_data()? }
            }
            Command::LookupTablePageUp => Request::LookupTablePageUp { id: r.get_data()? },
            Command::LookupTablePageDown => Request::LookupTablePageDown { id: r.get_data()? },
            Command::Reset => Request::Reset { id: r.get_data()? },
            Command::FocusIn => Request::FocusIn { id: r.get_data()? },
            Command::FocusOut => Request::FocusOut { id: r.get_data()? },
            Command::TriggerProperty => Request::TriggerProperty { id: r.get_data()?, property: r.get_data()? },
            Command::ProcessHelperEvent => Request::ProcessHelperEvent {
                id: r.get_data()?,
                helper_uuid: r.get_data()?,
                event: r.get_data()?,
            },
            Command::UpdateClientCapabilities => {
                Request::UpdateClientCapabilities { id: r.get_data()?, capabilities: r.get_data()? }
            }
            Command::GetClientCapabilities => Request::GetClientCapabilities { id: r.get_data()? },
            Command::GetFactoryList => Request::GetFactoryList { encoding: r.get_data()? },
            Command::GetFactoryName => Request::GetFactoryName { uuid: r.get_data()? },
            Command::GetFactoryLocales => Request::GetFactoryLocales { uuid: r.get_data()? },
            Command::GetFactoryLanguage => Request::GetFactoryLanguage { uuid: r.get_data()? },
            Command::GetFactoryIconFile => Request::GetFactoryIconFile { uuid: r.get_data()? },
            Command::EraseConfig => Request::EraseConfig { key: r.get_data()? },
            Command::ReloadConfig => Request::ReloadConfig,
            Command::FlushConfig => Request::FlushConfig,
            Command::GetHelperList => Request::GetHelperList,
            Command::RunHelper => Request::RunHelper {
                uuid: r.get_data()?,
                config_name: r.get_data()?,
                display: r.get_data()?,
            },
            other => {
                if let Some(kind) = ConfigKind::find(other, ConfigKind::get_command) {
                    Request::GetConfig { kind, key: r.get_data()? }
                } else if let Some(kind) = ConfigKind::find(other, ConfigKind::set_command) {
                    let key = r.get_data()?;
                    Request::SetConfig { key, value: ConfigValue::decode(kind, r)? }
                } else {
                    return Err(TransactionError::UnexpectedCommand(other));
                }
            }
        })
    }
}

impl UiEvent {
    pub fn command(&self) -> Command {
        match self {
            UiEvent::ShowPreeditString => Command::ShowPreeditString,
            UiEvent::ShowAuxString => Command::ShowAuxString,
            UiEvent::ShowLookupTable => Command::ShowLookupTable,
            UiEvent::HidePreeditString => Command::HidePreeditString,
            UiEvent::HideAuxString => Command::HideAuxString,
            UiEvent::HideLookupTable => Command::HideLookupTable,
            UiEvent::UpdatePreeditCaret(_) => Command::UpdatePreeditCaret,
            UiEvent::UpdatePreeditString(..) => Command::UpdatePreeditString,
            UiEvent::UpdateAuxString(..) => Command::UpdateAuxString,
            UiEvent::UpdateLookupTable(_) => Command::UpdateLookupTable,
            UiEvent::CommitString(_) => Command::CommitString,
            UiEvent::ForwardKeyEvent(_) => Command::ForwardKeyEvent,
            UiEvent::RegisterProperties(_) => Command::RegisterProperties,
            UiEvent::UpdateProperty(_) => Command::UpdateProperty,
            UiEvent::Beep => Command::Beep,
            UiEvent::StartHelper(_) => Command::StartHelper,
            UiEvent::StopHelper(_) => Command::StopHelper,
            UiEvent::SendHelperEvent(..) => Command::SendHelperEvent,
        }
    }

    pub fn encode(&self, t: &mut Transaction) {
        t.put_command(self.command());
        match self {
            UiEvent::ShowPreeditString
            | UiEvent::ShowAuxString
            | UiEvent::ShowLookupTable
            | UiEvent::HidePreeditString
            | UiEvent::HideAuxString
            | UiEvent::HideLookupTable
            | UiEvent::Beep => {}
            UiEvent::UpdatePreeditCaret(caret) => t.put_data(caret),
            UiEvent::UpdatePreeditString(text, attrs) | UiEvent::UpdateAuxString(text, attrs) => {
                t.put_data(text);
                t.put_data(attrs);
            }
            UiEvent::UpdateLookupTable(table) => t.put_data(table),
            UiEvent::CommitString(text) => t.put_data(text),
            UiEvent::ForwardKeyEvent(key) => t.put_data(key),
            UiEvent::RegisterProperties(properties) => t.put_data(properties),
            UiEvent::UpdateProperty(property) => t.put_data(property),
            UiEvent::StartHelper(uuid) | UiEvent::StopHelper(uuid) => t.put_string(uuid),
            UiEvent::SendHelperEvent(uuid, event) => {
                t.put_string(uuid);
                t.put_data(event);
            }
        }
    }

    pub fn decode(command: Command, reader: &mut TransactionReader<'_>) -> Result<Self> {
        let r = reader;
        Ok(match command {
            Command::ShowPreeditString => UiEvent::ShowPreeditString,
            Command::ShowAuxString => UiEvent::ShowAuxString,
            Command::ShowLookupTable => UiEvent::ShowLookupTable,
            Command::HidePreeditString => UiEvent::HidePreeditString,
            Command::HideAuxString => UiEvent::HideAuxString,
            Command::HideLookupTable => UiEvent::HideLookupTable,
            Command::UpdatePreeditCaret => UiEvent::UpdatePreeditCaret(r.get_data()?),
            Command::UpdatePreeditString => {
                UiEvent::UpdatePreeditString(r.get_data::<WideString>()?, r.get_data()?)
            }
            Command::UpdateAuxString => UiEvent::UpdateAuxString(r.get_data::<WideString>()?, r.get_data()?),
            Command::UpdateLookupTable => UiEvent::UpdateLookupTable(r.get_data()?),
            Command::CommitString => UiEvent::CommitString(r.get_data()?),
            Command::ForwardKeyEvent => UiEvent::ForwardKeyEvent(r.get_data()?),
            Command::RegisterProperties => UiEvent::RegisterProperties(r.get_data()?),
            Command::UpdateProperty => UiEvent::UpdateProperty(r.get_data()?),
            Command::Beep => UiEvent::Beep,
            Command::StartHelper => UiEvent::StartHelper(r.get_data()?),
            Command::StopHelper => UiEvent::StopHelper(r.get_data()?),
            Command::SendHelperEvent => UiEvent::SendHelperEvent(r.get_data()?, r.get_data()?),
            other => return Err(TransactionError::UnexpectedCommand(other)),
        })
    }
}

impl Response {
    pub fn encode(&self, t: &mut Transaction) {
        match self {
            Response::NewInstance(id) => {
                t.put_command(Command::NewInstanceResult);
                t.put_data(id);
            }
            Response::FactoryList(uuids) => {
                t.put_command(Command::FactoryList);
                t.put_data(uuids);
            }
            Response::FactoryName(name) => {
                t.put_command(Command::FactoryName);
                t.put_data(name);
            }
            Response::FactoryLocales(text) => {
                t.put_command(Command::FactoryLocales);
                t.put_string(text);
            }
            Response::FactoryLanguage(text) => {
                t.put_command(Command::FactoryLanguage);
                t.put_string(text);
            }
            Response::FactoryIconFile(text) => {
                t.put_command(Command::FactoryIconFile);
                t.put_string(text);
            }
            Response::ClientCapabilities(caps) => {
                t.put_command(Command::ClientCapabilities);
                t.put_data(caps);
            }
            Response::FileContent(bytes) => {
                t.put_command(Command::FileContent);
                t.put_data(bytes);
            }
            Response::Config(value) => {
                t.put_command(value.kind().result_command());
                value.encode(t);
            }
            Response::HelperList(helpers) => {
                t.put_command(Command::HelperList);
                t.put_data(&(helpers.len() as u32));
                for helper in helpers {
                    t.put_string(&helper.uuid);
                    t.put_string(&helper.name);
                    t.put_string(&helper.icon);
                    t.put_string(&helper.description);
                    t.put_data(&helper.option);
                }
            }
            Response::Ui(event) => event.encode(t),
        }
    }

    pub fn decode(command: Command, reader: &mut TransactionReader<'_>) -> Result<Self> {
        let r = reader;
        Ok(match command {
            Command::NewInstanceResult => Response::NewInstance(r.get_data()?),
            Command::FactoryList => Response::FactoryList(r.get_data()?),
            Command::FactoryName => Response::FactoryName(r.get_data()?),
            Command::FactoryLocales => Response::FactoryLocales(r.get_data()?),
            Command::FactoryLanguage => Response::FactoryLanguage(r.get_data()?),
            Command::FactoryIconFile => Response::FactoryIconFile(r.get_data()?),
            Command::ClientCapabilities => Response::ClientCapabilities(r.get_data()?),
            Command::FileContent => Response::FileContent(r.get_data()?),
            Command::HelperList => {
                let count: u32 = r.get_data()?;
                let mut helpers = Vec::new();
                for _ in 0..count {
                    helpers.push(HelperInfo {
                        uuid: r.get_data()?,
                        name: r.get_data()?,
                        icon: r.get_data()?,
                        description: r.get_data()?,
                        option: r.get_data()?,
                    });
                }
                Response::HelperList(helpers)
            }
            other => match ConfigKind::find(other, ConfigKind::result_command) {
                Some(kind) => Response::Config(ConfigValue::decode(kind, r)?),
                None => Response::Ui(UiEvent::decode(other, r)?),
            },
        })
    }
}

impl Outcome {
    pub fn command(self) -> Command {
        match self {
            Outcome::Ok => Command::Ok,
            Outcome::Fail => Command::Fail,
        }
    }
}

/// Build `REQUEST, key, requests…`.
pub fn request_transaction(key: u32, requests: &[Request]) -> Transaction {
    let mut t = Transaction::new();
    t.put_command(Command::Request);
    t.put_data(&key);
    for request in requests {
        request.encode(&mut t);
    }
    t
}

/// Consume the `REQUEST, key` header and return the key.
pub fn read_request_header(reader: &mut TransactionReader<'_>) -> Result<u32> {
    match reader.get_command()? {
        Command::Request => reader.get_data(),
        other => Err(TransactionError::UnexpectedCommand(other)),
    }
}

impl Reply {
    pub fn to_transaction(&self) -> Transaction {
        let mut t = Transaction::new();
        t.put_command(Command::Reply);
        for response in &self.responses {
            response.encode(&mut t);
        }
        t.put_command(self.outcome.command());
        t
    }
}

impl InstanceUpdate {
    /// `REPLY, INSTANCE_UPDATE, id, events…, OK`.
    pub fn to_transaction(&self) -> Transaction {
        let mut t = Transaction::new();
        t.put_command(Command::Reply);
        t.put_command(Command::InstanceUpdate);
        t.put_data(&self.instance);
        for event in &self.events {
            event.encode(&mut t);
        }
        t.put_command(Command::Ok);
        t
    }
}

impl ServerMessage {
    /// Decode a reply or a push. Result commands this side does not know are skipped.
    pub fn decode(transaction: &Transaction) -> Result<Self> {
        let mut r = transaction.reader();
        match r.get_command()? {
            Command::Reply => {}
            other => return Err(TransactionError::UnexpectedCommand(other)),
        }

        let mut update_for = None;
        let mut responses = Vec::new();
        let outcome = loop {
            let command = match r.get_command() {
                Ok(command) => command,
                Err(TransactionError::UnknownCommand(_)) => {
                    r.skip_to_next_command();
                    continue;
                }
                Err(e) => return Err(e),
            };
            match command {
                Command::Ok => break Outcome::Ok,
                Command::Fail => break Outcome::Fail,
                Command::InstanceUpdate if update_for.is_none() && responses.is_empty() => {
                    update_for = Some(r.get_data::<u32>()?);
                }
                other => responses.push(Response::decode(other, &mut r)?),
            }
        };

        let Some(instance) = update_for else {
            return Ok(ServerMessage::Reply(Reply { responses, outcome }));
        };
        let events = responses
            .into_iter()
            .map(|response| match response {
                Response::Ui(event) => Ok(event),
                _ => Err(TransactionError::UnexpectedCommand(Command::InstanceUpdate)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ServerMessage::Update(InstanceUpdate { instance, events }))
    }
}

/// Client greeting: `REQUEST, OPEN_CONNECTION, version, role, acceptable roles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnection {
    pub version: String,
    pub role: Role,
    pub acceptable_server_roles: Vec<Role>,
}

impl OpenConnection {
    pub fn new(role: Role, acceptable_server_roles: Vec<Role>) -> Self {
        Self { version: PROTOCOL_VERSION.to_string(), role, acceptable_server_roles }
    }

    pub fn to_transaction(&self) -> Transaction {
        let mut t = Transaction::new();
        t.put_command(Command::Request);
        t.put_command(Command::OpenConnection);
        t.put_string(&self.version);
        t.put_string(self.role.as_str());
        t.put_string(&Role::join_list(&self.acceptable_server_roles));
        t
    }

    pub fn from_transaction(transaction: &Transaction) -> Result<Self> {
        let mut r = transaction.reader();
        for expected in [Command::Request, Command::OpenConnection] {
            let found = r.get_command()?;
            if found != expected {
                return Err(TransactionError::UnexpectedCommand(found));
            }
        }
        let version: String = r.get_data()?;
        let role: String = r.get_data()?;
        let acceptable: String = r.get_data()?;
        Ok(Self {
            version,
            role: role.parse().unwrap_or(Role::Unknown),
            acceptable_server_roles: Role::parse_list(&acceptable),
        })
    }
}

/// Server answer to a successful greeting: `REPLY, key, server role, OK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAccept {
    pub key: u32,
    pub server_role: Role,
}

impl HandshakeAccept {
    pub fn to_transaction(&self) -> Transaction {
        let mut t = Transaction::new();
        t.put_command(Command::Reply);
        t.put_data(&self.key);
        t.put_string(self.server_role.as_str());
        t.put_command(Command::Ok);
        t
    }

    pub fn from_transaction(transaction: &Transaction) -> Result<Self> {
        let mut r = transaction.reader();
        match r.get_command()? {
            Command::Reply => {}
            other => return Err(TransactionError::UnexpectedCommand(other)),
        }
        let key: u32 = r.get_data()?;
        let role: String = r.get_data()?;
        match r.get_command()? {
            Command::Ok => {}
            other => return Err(TransactionError::UnexpectedCommand(other)),
        }
        Ok(Self { key, server_role: role.parse().unwrap_or(Role::Unknown) })
    }
}
