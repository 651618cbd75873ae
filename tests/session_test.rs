//! Session lifecycle and dispatch, end to end through the mock transport.

mod common;

use common::*;
use identikey_client::{Command, Error, Session};
use serde_json::json;

#[test]
fn construction_performs_no_network_io() {
    let transport = MockTransport::new();
    let session = Session::new(Box::new(transport.clone()), "admin", "ananas", "master");

    assert!(!session.logged_on());
    assert!(session.session_id().is_none());
    assert!(session.privileges().is_none());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn logon_activates_the_session() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    assert!(session.logged_on());
    assert_eq!(session.session_id(), Some("sid-1234"));
    assert_eq!(session.username(), "admin");
    assert_eq!(session.domain(), "master");
    assert_eq!(session.product(), Some("IDENTIKEY"));
    assert_eq!(session.version(), Some("3.17"));
    assert_eq!(session.location(), Some("10.0.0.7"));
    assert!(session.last_logon().is_some());

    let privileges = session.privileges().expect("privileges were not parsed");
    assert_eq!(privileges.get("USER_CREATE"), Some(&true));
    assert_eq!(privileges.get("USER_DELETE"), Some(&false));
    assert!(session.has_privilege("DIGIPASS_ASSIGN"));
    assert!(!session.has_privilege("NOT_A_PRIVILEGE"));
}

#[test]
fn logon_sends_the_credential_set() {
    let transport = MockTransport::new();
    logged_on_session(&transport);

    let call = transport.last_call();
    assert_eq!(call.operation, "logon");

    let attrs = call.request["attributeSet"]["attributes"]
        .as_array()
        .expect("attributeSet missing");
    let ids: Vec<&str> = attrs
        .iter()
        .map(|attr| attr["attributeID"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "CREDFLD_DOMAIN",
            "CREDFLD_PASSWORD",
            "CREDFLD_USERID",
            "CREDFLD_PASSWORD_FORMAT"
        ]
    );
    assert_eq!(attrs[3]["value"]["@xsi:type"], "xsd:unsignedInt");
    assert_eq!(attrs[3]["value"]["$value"], "0");
}

#[test]
fn logon_failure_leaves_the_session_unauthenticated() {
    let transport = MockTransport::new();
    transport.push_response(status_response(
        "logon",
        "STAT_ACCESS_DENIED",
        &["S-001001: access denied"],
    ));

    let mut session = Session::new(Box::new(transport.clone()), "bogus", "wrong", "master");
    let error = session.logon().unwrap_err();

    assert!(matches!(error, Error::LogonFailed { .. }));
    assert!(error.to_string().contains("STAT_ACCESS_DENIED"));
    assert_eq!(
        error.error_stack(),
        Some(&["S-001001: access denied".to_string()][..])
    );
    assert!(!session.logged_on());
    assert!(session.session_id().is_none());
}

#[test]
fn logoff_stops_and_clears_the_session() {
    let transport = MockTransport::new();
    let mut session = logged_on_session(&transport);

    transport.push_response(status_response("logoff", "STAT_ADMIN_SESSION_STOPPED", &[]));
    assert!(session.logoff().unwrap());
    assert!(!session.logged_on());
    assert!(session.privileges().is_none());
    assert!(session.product().is_none());

    // A second logoff is a usage error and makes no call.
    let calls_before = transport.call_count();
    assert!(matches!(session.logoff(), Err(Error::Usage { .. })));
    assert_eq!(transport.call_count(), calls_before);
}

#[test]
fn logoff_accepts_the_alternate_stopped_status() {
    let transport = MockTransport::new();
    let mut session = logged_on_session(&transport);

    transport.push_response(status_response("logoff", "STAT_SESSION_STOPPED", &[]));
    assert!(session.logoff().unwrap());
}

#[test]
fn logoff_failure_still_clears_the_session() {
    let transport = MockTransport::new();
    let mut session = logged_on_session(&transport);

    transport.push_response(status_response("logoff", "STAT_COMMAND_FAILED", &[]));
    let error = session.logoff().unwrap_err();

    assert!(matches!(error, Error::LogonFailed { .. }));
    assert!(!session.logged_on());
}

#[test]
fn alive_answers_false_without_io_when_not_active() {
    let transport = MockTransport::new();
    let session = Session::new(Box::new(transport.clone()), "admin", "ananas", "master");

    assert!(!session.alive(true).unwrap());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn alive_pings_the_server() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_response(status_response("session_alive", "STAT_SUCCESS", &[]));
    assert!(session.alive(true).unwrap());

    let call = transport.last_call();
    assert_eq!(call.operation, "session_alive");
    assert!(call.logged);

    // A stale session answers a non-success status.
    transport.push_response(status_response("session_alive", "STAT_SESSION_UNKNOWN", &[]));
    assert!(!session.alive(true).unwrap());
}

#[test]
fn alive_can_suppress_logging() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_response(status_response("session_alive", "STAT_SUCCESS", &[]));
    assert!(session.alive(false).unwrap());
    assert!(!transport.last_call().logged);
}

#[test]
fn execute_injects_the_session_id() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_response(status_response("user_execute", "STAT_SUCCESS", &[]));
    let envelope = session
        .execute(
            Command::new("user_execute")
                .cmd("USERCMD_VIEW")
                .attribute("USERFLD_USERID", "jdoe"),
        )
        .unwrap();

    assert!(envelope.is_success());
    let call = transport.last_call();
    assert_eq!(call.request["sessionID"], "sid-1234");
    assert_eq!(call.request["cmd"], "USERCMD_VIEW");
}

#[test]
fn execute_requires_an_active_session() {
    let transport = MockTransport::new();
    let session = Session::new(Box::new(transport.clone()), "admin", "ananas", "master");

    let error = session.execute(Command::new("user_execute")).unwrap_err();
    assert!(matches!(error, Error::Usage { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn execute_surfaces_transport_failures_unmodified() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_transport_error("connection refused");
    let error = session.execute(Command::new("user_execute")).unwrap_err();

    assert!(matches!(error, Error::Transport(_)));
    assert!(error.to_string().contains("connection refused"));
}

#[test]
fn list_active_sessions_maps_each_result_set() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_response(list_response(
        "admin_session_query",
        &[
            vec![
                ("ADMINSESSIONFLD_SESSION_IDX", json!("1")),
                ("ADMINSESSIONFLD_LOGIN_NAME", json!("admin")),
                ("ADMINSESSIONFLD_DOMAIN", json!("master")),
                ("ADMINSESSIONFLD_LOCATION", json!("10.0.0.7")),
                ("ADMINSESSIONFLD_START_TIME", json!("2019-02-20T16:24:33")),
            ],
            vec![
                ("ADMINSESSIONFLD_SESSION_IDX", json!("2")),
                ("ADMINSESSIONFLD_LOGIN_NAME", json!("operator")),
                ("ADMINSESSIONFLD_DOMAIN", json!("master")),
            ],
        ],
    ));

    let sessions = session.list_active_sessions().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].index, Some(1));
    assert_eq!(sessions[0].username.as_deref(), Some("admin"));
    assert!(sessions[0].start_time.is_some());
    assert_eq!(sessions[1].username.as_deref(), Some("operator"));
    assert!(sessions[1].location.is_none());
}

#[test]
fn list_active_sessions_keeps_a_one_element_list() {
    let transport = MockTransport::new();
    let session = logged_on_session(&transport);

    transport.push_response(list_response(
        "admin_session_query",
        &[vec![
            ("ADMINSESSIONFLD_SESSION_IDX", json!("1")),
            ("ADMINSESSIONFLD_LOGIN_NAME", json!("admin")),
        ]],
    ));

    let sessions = session.list_active_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
}

#[test]
fn service_sessions_are_born_active() {
    let transport = MockTransport::new();
    let session = Session::service(Box::new(transport.clone()), "svc-account", "apikey-123");

    assert!(session.logged_on());
    assert!(session.is_service_account());
    assert_eq!(session.session_id(), Some("apikey-123"));
    assert!(session.privileges().is_none());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn service_sessions_reject_logon_and_logoff() {
    let transport = MockTransport::new();
    let mut session = Session::service(Box::new(transport.clone()), "svc-account", "apikey-123");

    let error = session.logon().unwrap_err();
    assert!(matches!(error, Error::Usage { .. }));
    assert!(error.to_string().contains("not supported"));

    let error = session.logoff().unwrap_err();
    assert!(matches!(error, Error::Usage { .. }));

    // Still active, and no call was ever made.
    assert!(session.logged_on());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn service_sessions_dispatch_commands() {
    let transport = MockTransport::new();
    let session = Session::service(Box::new(transport.clone()), "svc-account", "apikey-123");

    transport.push_response(status_response("admin_session_query", "STAT_SUCCESS", &[]));
    session.list_active_sessions().unwrap();

    assert_eq!(transport.last_call().request["sessionID"], "apikey-123");
}
