//! Tests for protocol opcodes and message codecs.

use super::super::protocol_codec::*;
use super::super::protocol_types::*;
use crate::ipc::transaction::{KeyEvent, Transaction, TransactionError, WideString};

fn decode_requests(t: &Transaction) -> (u32, Vec<Request>) {
    let mut r = t.reader();
    let key = read_request_header(&mut r).unwrap();
    let mut requests = Vec::new();
    while !r.is_exhausted() {
        let command = r.get_command().unwrap();
        requests.push(Request::decode(command, &mut r).unwrap());
    }
    (key, requests)
}

#[test]
fn test_command_values_are_stable() {
    assert_eq!(u32::from(Command::Request), 1);
    assert_eq!(u32::from(Command::Reply), 2);
    assert_eq!(u32::from(Command::Ok), 3);
    assert_eq!(u32::from(Command::Fail), 4);
    assert_eq!(Command::try_from(100).unwrap(), Command::ProcessKeyEvent);
    assert_eq!(Command::try_from(360).unwrap(), Command::InstanceUpdate);
    assert!(matches!(Command::try_from(0), Err(TransactionError::UnknownCommand(0))));
}

#[test]
fn test_role_names() {
    assert_eq!(Role::FrontEnd.as_str(), "SocketFrontEnd");
    assert_eq!("SocketConfig".parse::<Role>(), Ok(Role::Config));
    assert_eq!(
        Role::parse_list("SocketFrontEnd, Panel,Bogus"),
        vec![Role::FrontEnd, Role::Panel, Role::Unknown]
    );
    assert_eq!(Role::join_list(&[Role::FrontEnd, Role::HelperManager]), "SocketFrontEnd,HelperManager");
}

#[test]
fn test_request_batch_roundtrip() {
    let mut event = Transaction::new();
    event.put_data(&3u32);
    let requests = vec![
        Request::NewInstance { factory_uuid: String::new(), encoding: "UTF-8".into() },
        Request::ProcessKeyEvent { id: 0, key: KeyEvent::press(0x61) },
        Request::ProcessHelperEvent { id: 0, helper_uuid: "h".into(), event },
        Request::SetConfig { key: "/a".into(), value: ConfigValue::Double(1.5) },
        Request::SetConfig { key: "/b".into(), value: ConfigValue::VectorInt(vec![-1, 2]) },
        Request::GetConfig { kind: ConfigKind::Bool, key: "/c".into() },
        Request::RunHelper { uuid: "u".into(), config_name: "file".into(), display: ":0".into() },
        Request::CloseConnection,
    ];

    let t = request_transaction(0xdead_beef, &requests);
    let (key, decoded) = decode_requests(&t);
    assert_eq!(key, 0xdead_beef);
    assert_eq!(decoded, requests);
}

#[test]
fn test_instance_id_rewrite() {
    let mut request = Request::FocusIn { id: 4 };
    assert_eq!(request.instance_id(), Some(4));
    *request.instance_id_mut().unwrap() = 9;
    assert_eq!(request, Request::FocusIn { id: 9 });
    assert_eq!(Request::GetHelperList.instance_id(), None);
}

#[test]
fn test_config_requests_classified() {
    assert!(Request::FlushConfig.is_config());
    assert!(Request::GetConfig { kind: ConfigKind::String, key: "/k".into() }.is_config());
    assert!(!Request::FocusIn { id: 0 }.is_config());
}

#[test]
fn test_request_decode_rejects_result_opcodes() {
    let t = Transaction::new();
    let err = Request::decode(Command::FactoryList, &mut t.reader()).unwrap_err();
    assert!(matches!(err, TransactionError::UnexpectedCommand(Command::FactoryList)));
}

#[test]
fn test_bad_double_is_an_operand_error() {
    let mut t = Transaction::new();
    t.put_string("/k");
    t.put_string("not-a-number");
    let err = Request::decode(Command::SetConfigDouble, &mut t.reader()).unwrap_err();
    assert!(err.is_operand_error());
}

#[test]
fn test_reply_decodes_responses_and_outcome() {
    let reply = Reply {
        responses: vec![
            Response::NewInstance(0),
            Response::Ui(UiEvent::UpdatePreeditString(WideString::from("ni"), vec![])),
            Response::Ui(UiEvent::ShowPreeditString),
            Response::Config(ConfigValue::Bool(true)),
            Response::HelperList(vec![HelperInfo {
                uuid: "u".into(),
                name: "n".into(),
                icon: String::new(),
                description: "d".into(),
                option: HelperInfo::AUTO_START,
            }]),
        ],
        outcome: Outcome::Fail,
    };

    let decoded = ServerMessage::decode(&reply.to_transaction()).unwrap();
    assert_eq!(decoded, ServerMessage::Reply(reply));
}

#[test]
fn test_reply_skips_unknown_results() {
    let mut t = Transaction::new();
    t.put_command(Command::Reply);
    t.put_command(7777u32);
    t.put_string("future operand");
    t.put_command(Command::FactoryLanguage);
    t.put_string("zh_CN");
    t.put_command(Command::Ok);

    let ServerMessage::Reply(reply) = ServerMessage::decode(&t).unwrap() else {
        panic!("expected a reply");
    };
    assert!(reply.is_ok());
    assert_eq!(reply.responses, vec![Response::FactoryLanguage("zh_CN".into())]);
}

#[test]
fn test_push_decodes_as_update() {
    let update = InstanceUpdate {
        instance: 3,
        events: vec![UiEvent::CommitString("好".into()), UiEvent::HideLookupTable],
    };
    let decoded = ServerMessage::decode(&update.to_transaction()).unwrap();
    assert_eq!(decoded, ServerMessage::Update(update));
}

#[test]
fn test_reply_without_terminal_marker_is_rejected() {
    let mut t = Transaction::new();
    t.put_command(Command::Reply);
    t.put_command(Command::NewInstanceResult);
    t.put_data(&1u32);
    assert!(matches!(ServerMessage::decode(&t), Err(TransactionError::Exhausted)));
}

#[test]
fn test_handshake_messages() {
    let hello = OpenConnection::new(Role::FrontEnd, vec![Role::FrontEnd]);
    let parsed = OpenConnection::from_transaction(&hello.to_transaction()).unwrap();
    assert_eq!(parsed, hello);
    assert_eq!(parsed.version, PROTOCOL_VERSION);

    let accept = HandshakeAccept { key: 12345, server_role: Role::HelperManager };
    assert_eq!(HandshakeAccept::from_transaction(&accept.to_transaction()).unwrap(), accept);
}

#[test]
fn test_open_connection_requires_request_header() {
    let mut t = Transaction::new();
    t.put_command(Command::OpenConnection);
    assert!(OpenConnection::from_transaction(&t).is_err());
}
