//! Tests for handshake policy and request authentication.

use super::super::auth_session::*;
use super::*;
use crate::ipc::protocol::{request_transaction, Command, Request};

fn frontend_policy() -> HandshakePolicy {
    HandshakePolicy::new(Role::FrontEnd, vec![Role::IMEngine, Role::Config])
}

#[test]
fn test_keys_match() {
    assert!(keys_match(0xdead_beef, 0xdead_beef));
    assert!(!keys_match(0xdead_beef, 0xdead_beee));
}

#[test]
fn test_generate_key_varies() {
    let keys: std::collections::HashSet<u32> = (0..8).map(|_| generate_key()).collect();
    assert!(keys.len() > 1);
}

#[test]
fn test_policy_accepts_listed_role() {
    let hello = OpenConnection::new(Role::IMEngine, vec![Role::FrontEnd]);
    assert!(frontend_policy().check(&hello).is_ok());
}

#[test]
fn test_policy_rejects_wrong_version() {
    let mut hello = OpenConnection::new(Role::IMEngine, vec![Role::FrontEnd]);
    hello.version = "0.9".into();
    assert!(matches!(frontend_policy().check(&hello), Err(AuthError::UnsupportedVersion(_))));
}

#[test]
fn test_policy_rejects_when_server_role_not_acceptable() {
    let hello = OpenConnection::new(Role::IMEngine, vec![Role::HelperManager]);
    assert!(matches!(
        frontend_policy().check(&hello),
        Err(AuthError::ServerRoleRefused(Role::FrontEnd))
    ));
}

#[test]
fn test_policy_rejects_unaccepted_or_unknown_peer() {
    let panel = OpenConnection::new(Role::Panel, vec![Role::FrontEnd]);
    assert!(matches!(frontend_policy().check(&panel), Err(AuthError::RoleRefused(Role::Panel))));

    let unknown = OpenConnection::new(Role::Unknown, vec![Role::FrontEnd]);
    assert!(matches!(frontend_policy().check(&unknown), Err(AuthError::RoleRefused(Role::Unknown))));
}

#[test]
fn test_authenticate_checks_key() {
    let mut auth = ClientAuth::new(frontend_policy());
    let id = ConnectionId(1);
    let info = ClientInfo { key: 77, role: Role::IMEngine };
    auth.register_for_test(id, info);

    let good = request_transaction(77, &[Request::Reset { id: 0 }]);
    let (got, mut reader) = auth.authenticate(id, &good).unwrap();
    assert_eq!(got, info);
    assert_eq!(reader.get_command().unwrap(), Command::Reset);

    let bad = request_transaction(78, &[Request::Reset { id: 0 }]);
    assert!(matches!(auth.authenticate(id, &bad), Err(AuthError::KeyMismatch)));
}

#[test]
fn test_authenticate_requires_registration() {
    let auth = ClientAuth::new(frontend_policy());
    let t = request_transaction(1, &[]);
    assert!(matches!(auth.authenticate(ConnectionId(5), &t), Err(AuthError::NotRegistered)));
}

#[test]
fn test_forget_removes_client() {
    let mut auth = ClientAuth::new(frontend_policy());
    auth.register_for_test(ConnectionId(2), ClientInfo { key: 1, role: Role::Config });
    assert!(auth.is_registered(ConnectionId(2)));
    assert_eq!(auth.clients().with_role(Role::Config).count(), 1);
    assert!(auth.forget(ConnectionId(2)).is_some());
    assert!(!auth.is_registered(ConnectionId(2)));
    assert!(auth.clients().is_empty());
}
