//! Shared test utilities: a scripted in-memory transport and response
//! builders that produce the envelope shapes the server emits.

#![allow(dead_code)]

use identikey_client::{CallOptions, Session, Transport, TransportError};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One call recorded by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub request: Value,
    pub logged: bool,
}

#[derive(Default)]
struct MockState {
    responses: RefCell<VecDeque<Result<Value, String>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

/// A transport that replays scripted responses and records every call.
///
/// Clones share state, so tests keep a handle for scripting and assertions
/// after boxing one clone into a `Session`.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next response tree.
    pub fn push_response(&self, response: Value) {
        self.state.responses.borrow_mut().push_back(Ok(response));
    }

    /// Script a transport-level failure for the next call.
    pub fn push_transport_error(&self, message: &str) {
        self.state
            .responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.borrow().clone()
    }

    /// The most recent call.
    pub fn last_call(&self) -> RecordedCall {
        self.state
            .calls
            .borrow()
            .last()
            .cloned()
            .expect("no call was made")
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.state.calls.borrow().len()
    }
}

impl Transport for MockTransport {
    fn call(
        &self,
        operation: &str,
        request: &Value,
        options: &CallOptions,
    ) -> Result<Value, TransportError> {
        self.state.calls.borrow_mut().push(RecordedCall {
            operation: operation.to_string(),
            request: request.clone(),
            logged: options.log,
        });

        match self.state.responses.borrow_mut().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(message.into()),
            None => Err(format!("no scripted response for operation {operation}").into()),
        }
    }
}

/// A response-side wire attribute entry.
pub fn attribute_entry(field_id: &str, value: Value) -> Value {
    json!({"attribute_id": field_id, "value": value})
}

/// A successful envelope carrying one attribute set.
pub fn success_response(operation: &str, attrs: &[(&str, Value)]) -> Value {
    let entries: Vec<Value> = attrs
        .iter()
        .map(|(field_id, value)| attribute_entry(field_id, value.clone()))
        .collect();

    json!({
        format!("{operation}_response"): {
            "results": {
                "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                "result_attribute": {"attributes": entries},
                "error_stack": {}
            }
        }
    })
}

/// An envelope with the given status, no attributes, and an optional error
/// stack.
pub fn status_response(operation: &str, status: &str, errors: &[&str]) -> Value {
    let error_stack = if errors.is_empty() {
        json!({})
    } else {
        json!({
            "errors": errors
                .iter()
                .map(|desc| json!({"error_desc": desc}))
                .collect::<Vec<_>>()
        })
    };

    json!({
        format!("{operation}_response"): {
            "results": {
                "result_codes": {"status_code_enum": status},
                "result_attribute": {},
                "error_stack": error_stack
            }
        }
    })
}

/// A successful envelope carrying a list of attribute sets.
pub fn list_response(operation: &str, sets: &[Vec<(&str, Value)>]) -> Value {
    let entries: Vec<Value> = sets
        .iter()
        .map(|attrs| {
            json!({
                "attributes": attrs
                    .iter()
                    .map(|(field_id, value)| attribute_entry(field_id, value.clone()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    // A one-element list collapses to a bare element, as the transport's
    // tree conversion does.
    let attribute_list = if entries.len() == 1 {
        entries[0].clone()
    } else {
        Value::Array(entries)
    };

    json!({
        format!("{operation}_response"): {
            "results": {
                "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                "result_attribute": {"attribute_list": attribute_list},
                "error_stack": {}
            }
        }
    })
}

/// The attribute set a successful logon answers with.
pub fn logon_attributes(session_id: &str) -> Vec<(&'static str, Value)> {
    vec![
        ("CREDFLD_SESSION_ID", json!(session_id)),
        ("CREDFLD_USERID", json!("admin")),
        ("CREDFLD_DOMAIN", json!("master")),
        ("CREDFLD_LOCATION", json!("10.0.0.7")),
        ("CREDFLD_PRODUCT_NAME", json!("IDENTIKEY")),
        ("CREDFLD_PRODUCT_VERSION", json!("3.17")),
        ("CREDFLD_LAST_LOGON_TIME", json!("2019-02-20T16:24:33")),
        (
            "CREDFLD_LOGICAL_ADMIN_PRIVILEGES",
            json!("USER_CREATE true, USER_DELETE false, DIGIPASS_ASSIGN true"),
        ),
    ]
}

/// Route crate logging to the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A session already logged on through the mock transport.
pub fn logged_on_session(transport: &MockTransport) -> Session {
    init_logging();
    transport.push_response(success_response("logon", &logon_attributes("sid-1234")));

    let mut session = Session::new(
        Box::new(transport.clone()),
        "admin",
        "ananas",
        "master",
    );
    session.logon().expect("scripted logon failed");
    session
}
