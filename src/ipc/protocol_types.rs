//! Opcodes, roles and the typed request/response unions of the wire protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::transaction::{
    AttributeList, KeyEvent, LookupTable, Property, PropertyList, Transaction, TransactionError,
    WideString,
};

/// Version string exchanged during the handshake.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Four bytes a peer writes right after connecting, before any frame.
pub const CONNECTION_PROBE: [u8; 4] = *b"IMCP";

macro_rules! commands {
    ($($(#[$meta:meta])* $name:ident = $value:expr,)*) => {
        /// Command opcodes. The numeric values are part of the wire contract.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Command {
            $($(#[$meta])* $name = $value,)*
        }

        impl TryFrom<u32> for Command {
            type Error = TransactionError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Command::$name),)*
                    other => Err(TransactionError::UnknownCommand(other)),
                }
            }
        }
    };
}

commands! {
    // Envelope
    Request = 1,
    Reply = 2,
    Ok = 3,
    Fail = 4,
    OpenConnection = 5,
    CloseConnection = 6,
    LoadFile = 7,

    // Instance operations
    ProcessKeyEvent = 100,
    MovePreeditCaret = 101,
    SelectCandidate = 102,
    UpdateLookupTablePageSize = 103,
    LookupTablePageUp = 104,
    LookupTablePageDown = 105,
    Reset = 106,
    FocusIn = 107,
    FocusOut = 108,
    TriggerProperty = 109,
    ProcessHelperEvent = 110,
    UpdateClientCapabilities = 111,
    GetClientCapabilities = 112,

    // UI events emitted by engines
    ShowPreeditString = 200,
    ShowAuxString = 201,
    ShowLookupTable = 202,
    HidePreeditString = 203,
    HideAuxString = 204,
    HideLookupTable = 205,
    UpdatePreeditCaret = 206,
    UpdatePreeditString = 207,
    UpdateAuxString = 208,
    UpdateLookupTable = 209,
    CommitString = 210,
    ForwardKeyEvent = 211,
    RegisterProperties = 212,
    UpdateProperty = 213,
    Beep = 214,
    StartHelper = 215,
    StopHelper = 216,
    SendHelperEvent = 217,

    // Instance and factory management
    NewInstance = 300,
    AttachSharedInstance = 301,
    DeleteInstance = 302,
    DeleteAllInstances = 303,
    GetFactoryList = 310,
    GetFactoryName = 311,
    GetFactoryLocales = 312,
    GetFactoryLanguage = 313,
    GetFactoryIconFile = 314,

    // Results
    NewInstanceResult = 350,
    FactoryList = 351,
    FactoryName = 352,
    FactoryLocales = 353,
    FactoryLanguage = 354,
    FactoryIconFile = 355,
    ClientCapabilities = 356,
    FileContent = 357,
    /// Leads an unsolicited push: `REPLY, INSTANCE_UPDATE, id, events…, OK`.
    InstanceUpdate = 360,

    // Config backend
    GetConfigString = 400,
    SetConfigString = 401,
    GetConfigInt = 402,
    SetConfigInt = 403,
    GetConfigBool = 404,
    SetConfigBool = 405,
    GetConfigDouble = 406,
    SetConfigDouble = 407,
    GetConfigVectorString = 408,
    SetConfigVectorString = 409,
    GetConfigVectorInt = 410,
    SetConfigVectorInt = 411,
    EraseConfig = 412,
    ReloadConfig = 413,
    FlushConfig = 414,
    ConfigString = 450,
    ConfigInt = 451,
    ConfigBool = 452,
    ConfigDouble = 453,
    ConfigVectorString = 454,
    ConfigVectorInt = 455,

    // Helper manager
    GetHelperList = 500,
    RunHelper = 501,
    HelperList = 550,
}

impl From<Command> for u32 {
    fn from(command: Command) -> u32 {
        command as u32
    }
}

/// Logical peer type of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    FrontEnd,
    IMEngine,
    Config,
    Panel,
    HelperManager,
    Helper,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FrontEnd => "SocketFrontEnd",
            Role::IMEngine => "SocketIMEngine",
            Role::Config => "SocketConfig",
            Role::Panel => "Panel",
            Role::HelperManager => "HelperManager",
            Role::Helper => "Helper",
            Role::Unknown => "Unknown",
        }
    }

    /// Parse a comma-separated role list; unknown names map to [`Role::Unknown`].
    pub fn parse_list(list: &str) -> Vec<Role> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.parse().unwrap_or(Role::Unknown))
            .collect()
    }

    pub fn join_list(roles: &[Role]) -> String {
        roles.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "SocketFrontEnd" => Role::FrontEnd,
            "SocketIMEngine" => Role::IMEngine,
            "SocketConfig" => Role::Config,
            "Panel" => Role::Panel,
            "HelperManager" => Role::HelperManager,
            "Helper" => Role::Helper,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of a config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    String,
    Int,
    Bool,
    Double,
    VectorString,
    VectorInt,
}

/// A typed config value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Int(i32),
    Bool(bool),
    Double(f64),
    VectorString(Vec<String>),
    VectorInt(Vec<i32>),
}

impl ConfigValue {
    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigValue::String(_) => ConfigKind::String,
            ConfigValue::Int(_) => ConfigKind::Int,
            ConfigValue::Bool(_) => ConfigKind::Bool,
            ConfigValue::Double(_) => ConfigKind::Double,
            ConfigValue::VectorString(_) => ConfigKind::VectorString,
            ConfigValue::VectorInt(_) => ConfigKind::VectorInt,
        }
    }
}

/// Installable helper process as reported by the helper manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperInfo {
    pub uuid: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub option: u32,
}

impl HelperInfo {
    pub const STAND_ALONE: u32 = 1 << 0;
    pub const AUTO_START: u32 = 1 << 1;
    pub const AUTO_RESTART: u32 = 1 << 2;
    pub const NEED_SCREEN_INFO: u32 = 1 << 3;
    pub const NEED_SPOT_LOCATION_INFO: u32 = 1 << 4;
}

/// Requests understood by the servers in this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CloseConnection,
    LoadFile { path: String },

    NewInstance { factory_uuid: String, encoding: String },
    AttachSharedInstance { factory_uuid: String, encoding: String },
    DeleteInstance { id: u32 },
    DeleteAllInstances,

    ProcessKeyEvent { id: u32, key: KeyEvent },
    MovePreeditCaret { id: u32, caret: u32 },
    SelectCandidate { id: u32, index: u32 },
    UpdateLookupTablePageSize { id: u32, size: u32 },
    LookupTablePageUp { id: u32 },
    LookupTablePageDown { id: u32 },
    Reset { id: u32 },
    FocusIn { id: u32 },
    FocusOut { id: u32 },
    TriggerProperty { id: u32, property: String },
    ProcessHelperEvent { id: u32, helper_uuid: String, event: Transaction },
    UpdateClientCapabilities { id: u32, capabilities: u32 },
    GetClientCapabilities { id: u32 },

    GetFactoryList { encoding: String },
    GetFactoryName { uuid: String },
    GetFactoryLocales { uuid: String },
    GetFactoryLanguage { uuid: String },
    GetFactoryIconFile { uuid: String },

    GetConfig { kind: ConfigKind, key: String },
    SetConfig { key: String, value: ConfigValue },
    EraseConfig { key: String },
    ReloadConfig,
    FlushConfig,

    GetHelperList,
    RunHelper { uuid: String, config_name: String, display: String },
}

/// Results carried in a reply ahead of its terminal marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    NewInstance(u32),
    FactoryList(Vec<String>),
    FactoryName(WideString),
    FactoryLocales(String),
    FactoryLanguage(String),
    FactoryIconFile(String),
    ClientCapabilities(u32),
    FileContent(Vec<u8>),
    Config(ConfigValue),
    HelperList(Vec<HelperInfo>),
    Ui(UiEvent),
}

/// UI updates produced by an engine instance.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ShowPreeditString,
    ShowAuxString,
    ShowLookupTable,
    HidePreeditString,
    HideAuxString,
    HideLookupTable,
    UpdatePreeditCaret(u32),
    UpdatePreeditString(WideString, AttributeList),
    UpdateAuxString(WideString, AttributeList),
    UpdateLookupTable(LookupTable),
    CommitString(WideString),
    ForwardKeyEvent(KeyEvent),
    RegisterProperties(PropertyList),
    UpdateProperty(Property),
    Beep,
    StartHelper(String),
    StopHelper(String),
    SendHelperEvent(String, Transaction),
}

/// Terminal marker of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Fail,
}

/// A decoded reply: results plus exactly one terminal marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub responses: Vec<Response>,
    pub outcome: Outcome,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    pub fn ui_events(&self) -> impl Iterator<Item = &UiEvent> {
        self.responses.iter().filter_map(|response| match response {
            Response::Ui(event) => Some(event),
            _ => None,
        })
    }
}

/// UI events pushed for an instance outside of any request.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceUpdate {
    pub instance: u32,
    pub events: Vec<UiEvent>,
}

/// Anything a server sends to a registered client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Reply(Reply),
    Update(InstanceUpdate),
}
