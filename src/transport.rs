//! The transport boundary.
//!
//! This crate never talks to the network itself. Callers implement
//! [`Transport`] over their SOAP/XML layer of choice: it receives an
//! operation name and a request tree, and returns the response tree. The
//! crate handles everything on either side of that call — typed encoding,
//! envelope decoding, outcome classification — and logs each dispatch with
//! sensitive fields redacted.

use crate::envelope::{self, ResponseEnvelope};
use crate::error::{Error, Result};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

/// Error type raised by transport implementations.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A synchronous transport collaborator.
///
/// Implementations perform the named operation with the given request tree
/// and hand back the server's response as a tree. Response element names are
/// expected in snake_case, the conventional rendering of an XML-to-tree
/// conversion.
///
/// Transport-level failures (network, TLS, malformed XML) are distinct from
/// the decoded-outcome errors in [`crate::error::Error`]; they surface to
/// callers wrapped in [`Error::Transport`], unmodified and never retried.
pub trait Transport {
    /// Perform `operation` with `request` and return the response tree.
    fn call(
        &self,
        operation: &str,
        request: &Value,
        options: &CallOptions,
    ) -> std::result::Result<Value, TransportError>;
}

/// Per-call options handed to the transport.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Whether this call may be written to log sinks. Liveness pings set
    /// this to `false` to keep polling noise out of the audit trail.
    pub log: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self { log: true }
    }
}

impl CallOptions {
    /// Options for a call that must stay out of the logs.
    pub fn quiet() -> Self {
        Self { log: false }
    }
}

/// Field ids whose values never appear in plaintext in any log sink.
pub const DEFAULT_REDACTED_FIELDS: &[&str] = &[
    "CREDFLD_PASSWORD",
    "CREDFLD_STATIC_PASSWORD",
    "CREDFLD_SESSION_ID",
];

/// Process-wide configuration consumed by transport implementations.
///
/// Built once, before any session is constructed, and passed to whatever
/// owns the transport; there is no mutable global. Changing the endpoint or
/// service description after commands have been issued is unsupported.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Remote endpoint URL.
    pub endpoint: String,
    /// Location of the service interface description, when the transport
    /// needs one to map operations onto the wire.
    pub service_description: Option<String>,
    /// Whether to verify the server's TLS certificate. Off by default:
    /// these servers commonly run with self-signed certificates inside a
    /// management network.
    pub tls_verify: bool,
    /// User-Agent header value for outgoing calls.
    pub user_agent: String,
    /// Field ids to redact from logged trees.
    pub redacted_fields: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:8888/".to_string(),
            service_description: None,
            tls_verify: false,
            user_agent: format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            redacted_fields: DEFAULT_REDACTED_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }
}

impl TransportConfig {
    /// Configuration for the given endpoint, with defaults for the rest.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the service interface description location.
    pub fn with_service_description(mut self, location: impl Into<String>) -> Self {
        self.service_description = Some(location.into());
        self
    }

    /// Enable TLS certificate verification.
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Add a field id to the redaction list.
    pub fn with_redacted_field(mut self, field_id: impl Into<String>) -> Self {
        self.redacted_fields.push(field_id.into());
        self
    }
}

/// Replacement text for redacted values.
const FILTERED: &str = "[FILTERED]";

/// Scrub sensitive values from a request or response tree for logging.
///
/// Wire attributes whose id is in `fields` have their value replaced, as
/// does the top-level `sessionID` request member when the session id field
/// is listed. The input tree is not modified.
pub fn redact(tree: &Value, fields: &[String]) -> Value {
    let mut scrubbed = tree.clone();
    redact_in_place(&mut scrubbed, fields);
    scrubbed
}

fn redact_in_place(node: &mut Value, fields: &[String]) {
    match node {
        Value::Object(object) => {
            let redact_id = object
                .get("attributeID")
                .or_else(|| object.get("attribute_id"))
                .and_then(Value::as_str)
                .is_some_and(|id| fields.iter().any(|field| field == id));

            if redact_id && object.contains_key("value") {
                object.insert("value".to_string(), Value::String(FILTERED.to_string()));
            }

            let session_id_redacted = fields.iter().any(|field| field == "CREDFLD_SESSION_ID");
            for (key, child) in object.iter_mut() {
                if session_id_redacted && key == "sessionID" {
                    *child = Value::String(FILTERED.to_string());
                } else if !(redact_id && key == "value") {
                    redact_in_place(child, fields);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_in_place(item, fields);
            }
        }
        _ => {}
    }
}

/// Invoke one operation through the transport and decode its envelope.
///
/// This is the only path between the typed layer and the wire: it logs the
/// redacted request and decoded status under a per-call correlation id,
/// wraps transport failures, and hands the response tree to the envelope
/// decoder.
pub(crate) fn dispatch(
    transport: &dyn Transport,
    redacted_fields: &[String],
    operation: &str,
    request: &Value,
    options: &CallOptions,
) -> Result<ResponseEnvelope> {
    let call_id = Uuid::new_v4();

    if options.log {
        debug!(
            "[{call_id}] {operation} request: {}",
            redact(request, redacted_fields)
        );
    }

    let response = transport
        .call(operation, request, options)
        .map_err(Error::Transport)?;

    let envelope = envelope::decode(&response, &format!("{operation}_response"))?;

    if options.log {
        debug!("[{call_id}] {operation} status: {}", envelope.status);
        if let Some(errors) = &envelope.errors {
            for error in errors {
                warn!("[{call_id}] {operation} error: {error}");
            }
        }
    }

    Ok(envelope)
}
