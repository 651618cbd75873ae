//! Administrative session lifecycle and command dispatch.
//!
//! A [`Session`] binds one identity to one transport. Directory identities
//! start unauthenticated and become active through [`Session::logon`];
//! service identities authenticate with a pre-issued API key and are born
//! active. Every higher-level operation — token and user manipulation
//! included — funnels through [`Session::execute`], which injects the
//! session id and decodes the response envelope. Entities never touch the
//! transport directly.

use crate::attribute::{self, AttributeValue, string_of, int_of, time_of};
use crate::envelope::{
    ResponseEnvelope, STAT_ADMIN_SESSION_STOPPED, STAT_SESSION_STOPPED,
};
use crate::error::{Error, Result};
use crate::query::SearchOptions;
use crate::token::{Token, TokenQuery};
use crate::transport::{self, CallOptions, DEFAULT_REDACTED_FIELDS, Transport};
use crate::user::{DirectoryUser, UserQuery};
use chrono::{DateTime, Utc};
use log::info;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;

pub(crate) const CREDFLD_DOMAIN: &str = "CREDFLD_DOMAIN";
pub(crate) const CREDFLD_PASSWORD: &str = "CREDFLD_PASSWORD";
pub(crate) const CREDFLD_USERID: &str = "CREDFLD_USERID";
pub(crate) const CREDFLD_PASSWORD_FORMAT: &str = "CREDFLD_PASSWORD_FORMAT";
pub(crate) const CREDFLD_COMPONENT_TYPE: &str = "CREDFLD_COMPONENT_TYPE";
const CREDFLD_SESSION_ID: &str = "CREDFLD_SESSION_ID";
const CREDFLD_STATIC_PASSWORD: &str = "CREDFLD_STATIC_PASSWORD";
const CREDFLD_LOCATION: &str = "CREDFLD_LOCATION";
const CREDFLD_LAST_LOGON_TIME: &str = "CREDFLD_LAST_LOGON_TIME";
const CREDFLD_PRODUCT_NAME: &str = "CREDFLD_PRODUCT_NAME";
const CREDFLD_PRODUCT_VERSION: &str = "CREDFLD_PRODUCT_VERSION";
const CREDFLD_LOGICAL_ADMIN_PRIVILEGES: &str = "CREDFLD_LOGICAL_ADMIN_PRIVILEGES";

const ADMINSESSIONFLD_SESSION_IDX: &str = "ADMINSESSIONFLD_SESSION_IDX";
const ADMINSESSIONFLD_LOGIN_NAME: &str = "ADMINSESSIONFLD_LOGIN_NAME";
const ADMINSESSIONFLD_DOMAIN: &str = "ADMINSESSIONFLD_DOMAIN";
const ADMINSESSIONFLD_LOCATION: &str = "ADMINSESSIONFLD_LOCATION";
const ADMINSESSIONFLD_START_TIME: &str = "ADMINSESSIONFLD_START_TIME";

/// The password-format marker sent with every credential set: plaintext.
const PASSWORD_FORMAT_UNENCRYPTED: i64 = 0;

/// A command to dispatch through an active session.
///
/// Describes one remote operation: the wire operation name, an optional
/// command discriminator for the `*_execute` operations, the ordered
/// attribute set, and optional search options for query operations.
///
/// # Examples
///
/// ```rust
/// use identikey_client::session::Command;
///
/// let command = Command::new("user_execute")
///     .cmd("USERCMD_VIEW")
///     .attribute("USERFLD_USERID", "jdoe")
///     .attribute("USERFLD_DOMAIN", "master");
/// assert_eq!(command.operation(), "user_execute");
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    operation: String,
    cmd: Option<String>,
    attributes: Vec<(String, Option<AttributeValue>)>,
    query_options: Option<SearchOptions>,
}

impl Command {
    /// A command for the named wire operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            cmd: None,
            attributes: Vec::new(),
            query_options: None,
        }
    }

    /// Set the command discriminator (e.g. `USERCMD_VIEW`).
    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    /// Append one attribute.
    pub fn attribute(mut self, field_id: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((field_id.into(), Some(value.into())));
        self
    }

    /// Append one attribute that is omitted from the wire when `None`.
    pub fn optional_attribute(
        mut self,
        field_id: impl Into<String>,
        value: Option<AttributeValue>,
    ) -> Self {
        self.attributes.push((field_id.into(), value));
        self
    }

    /// Attach search options.
    pub fn query_options(mut self, options: SearchOptions) -> Self {
        self.query_options = Some(options);
        self
    }

    /// The wire operation this command dispatches to.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// One authenticated (or pre-authenticated service) identity.
///
/// See the [module documentation](self) for the lifecycle. A session's state
/// is only ever mutated by calls made through it; sharing one session across
/// threads requires external synchronization, while independent sessions —
/// even for the same directory identity — are fully isolated from each
/// other.
pub struct Session {
    transport: Box<dyn Transport>,
    redacted_fields: Vec<String>,

    username: String,
    password: Option<String>,
    domain: String,
    service_account: bool,

    session_id: Option<String>,
    privileges: Option<HashMap<String, bool>>,
    location: Option<String>,
    product: Option<String>,
    version: Option<String>,
    last_logon: Option<DateTime<Utc>>,
}

impl Session {
    /// A directory-identity session. Performs no network I/O; call
    /// [`logon`](Self::logon) to activate it.
    pub fn new(
        transport: Box<dyn Transport>,
        username: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            redacted_fields: default_redaction(),
            username: username.into(),
            password: Some(password.into()),
            domain: domain.into(),
            service_account: false,
            session_id: None,
            privileges: None,
            location: None,
            product: None,
            version: None,
            last_logon: None,
        }
    }

    /// A service-identity session, authenticated by a pre-issued API key.
    ///
    /// Born active: the session id is synthesized from the key and the
    /// server validates it on every call. Service identities cannot
    /// [`logon`](Self::logon) or [`logoff`](Self::logoff).
    pub fn service(
        transport: Box<dyn Transport>,
        username: impl Into<String>,
        apikey: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            redacted_fields: default_redaction(),
            username: username.into(),
            password: None,
            domain: "master".to_string(),
            service_account: true,
            session_id: Some(apikey.into()),
            privileges: None,
            location: None,
            product: None,
            version: None,
            last_logon: None,
        }
    }

    /// Add a field id to the set redacted from this session's log output.
    pub fn with_redacted_field(mut self, field_id: impl Into<String>) -> Self {
        self.redacted_fields.push(field_id.into());
        self
    }

    /// The identity this session was built for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The domain this session authenticates against.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The server-issued session id, when active.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether this session is currently active.
    pub fn logged_on(&self) -> bool {
        self.session_id.is_some()
    }

    /// Whether this is a service identity.
    pub fn is_service_account(&self) -> bool {
        self.service_account
    }

    /// The privilege map parsed at logon. `None` until logon, and always
    /// `None` for service identities.
    pub fn privileges(&self) -> Option<&HashMap<String, bool>> {
        self.privileges.as_ref()
    }

    /// Whether the logged-on administrator holds the named privilege.
    pub fn has_privilege(&self, name: &str) -> bool {
        self.privileges
            .as_ref()
            .and_then(|privileges| privileges.get(name))
            .copied()
            .unwrap_or(false)
    }

    /// Server product name reported at logon.
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    /// Server product version reported at logon.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Client location echoed by the server at logon.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Previous logon time for this identity, as reported at logon.
    pub fn last_logon(&self) -> Option<DateTime<Utc>> {
        self.last_logon
    }

    /// Log on and activate this session.
    ///
    /// Sends the credential set and, on success, stores the issued session
    /// id plus the identity metadata and privilege map from the response.
    /// Fails with [`Error::LogonFailed`] on a non-success status and with
    /// [`Error::Usage`] for service identities.
    pub fn logon(&mut self) -> Result<()> {
        if self.service_account {
            return Err(Error::usage(
                "the logon command is not supported for a service account session",
            ));
        }

        let password = self.password.clone().ok_or_else(|| {
            Error::usage("a password is required to log on")
        })?;

        let attributes = attribute::encode(&[
            (CREDFLD_DOMAIN, Some(AttributeValue::from(self.domain.as_str()))),
            (CREDFLD_PASSWORD, Some(AttributeValue::from(password))),
            (CREDFLD_USERID, Some(AttributeValue::from(self.username.as_str()))),
            (
                CREDFLD_PASSWORD_FORMAT,
                Some(AttributeValue::unsigned(PASSWORD_FORMAT_UNENCRYPTED)?),
            ),
        ]);
        let message = json!({ "attributeSet": { "attributes": attributes } });

        let envelope = self.dispatch("logon", &message, &CallOptions::default())?;

        if !envelope.is_success() {
            return Err(Error::logon_failed(
                format!("logon failed: {}", describe(&envelope)),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("logon response carried no attributes"))?;

        self.session_id = Some(string_of(attrs, CREDFLD_SESSION_ID).ok_or_else(|| {
            Error::parse("logon response did not include a session id")
        })?);

        if let Some(username) = string_of(attrs, CREDFLD_USERID) {
            self.username = username;
        }
        if let Some(domain) = string_of(attrs, CREDFLD_DOMAIN) {
            self.domain = domain;
        }
        if let Some(password) = string_of(attrs, CREDFLD_STATIC_PASSWORD) {
            self.password = Some(password);
        }

        self.location = string_of(attrs, CREDFLD_LOCATION);
        self.product = string_of(attrs, CREDFLD_PRODUCT_NAME);
        self.version = string_of(attrs, CREDFLD_PRODUCT_VERSION);
        self.last_logon = time_of(attrs, CREDFLD_LAST_LOGON_TIME);
        self.privileges =
            string_of(attrs, CREDFLD_LOGICAL_ADMIN_PRIVILEGES).map(|raw| parse_privileges(&raw));

        info!(
            "logged on to {} as {} ({} {})",
            self.domain,
            self.username,
            self.product.as_deref().unwrap_or("unknown product"),
            self.version.as_deref().unwrap_or("unknown version"),
        );

        Ok(())
    }

    /// Log off and terminate this session.
    ///
    /// Identity state is cleared whatever the server answers; the call then
    /// returns `true` when the server acknowledged the stop, and fails with
    /// [`Error::LogonFailed`] otherwise. Fails with [`Error::Usage`] when
    /// the session is not active or belongs to a service identity.
    pub fn logoff(&mut self) -> Result<bool> {
        if self.service_account {
            return Err(Error::usage(
                "the logoff command is not supported for a service account session",
            ));
        }

        let session_id = self.session_id.clone().ok_or_else(|| {
            Error::usage("session is not logged on at the moment")
        })?;

        let attributes = attribute::encode(&[(
            CREDFLD_SESSION_ID,
            Some(AttributeValue::from(session_id)),
        )]);
        let message = json!({ "attributeSet": { "attributes": attributes } });

        let envelope = self.dispatch("logoff", &message, &CallOptions::default())?;

        self.clear_session_state();

        match envelope.status.as_str() {
            STAT_ADMIN_SESSION_STOPPED | STAT_SESSION_STOPPED => {
                info!("logged off from {} as {}", self.domain, self.username);
                Ok(true)
            }
            _ => Err(Error::logon_failed(
                format!("logoff failed: {}", describe(&envelope)),
                envelope.errors,
            )),
        }
    }

    /// Whether the server still considers this session alive.
    ///
    /// Returns `false` without any remote call when the session is not
    /// active. Passing `log = false` keeps this particular ping out of the
    /// log sinks, for callers that poll.
    pub fn alive(&self, log: bool) -> Result<bool> {
        let Some(session_id) = self.session_id.clone() else {
            return Ok(false);
        };

        let attributes = attribute::encode(&[(
            CREDFLD_SESSION_ID,
            Some(AttributeValue::from(session_id)),
        )]);
        let message = json!({ "attributeSet": { "attributes": attributes } });
        let options = if log {
            CallOptions::default()
        } else {
            CallOptions::quiet()
        };

        let envelope = self.dispatch("session_alive", &message, &options)?;
        Ok(envelope.is_success())
    }

    /// Dispatch a [`Command`] through this session.
    ///
    /// The single primitive every entity operation uses: requires an active
    /// session, injects the session id into the request, and returns the
    /// decoded envelope without classifying its status — classification
    /// belongs to the caller, which knows the command's semantics.
    pub fn execute(&self, command: Command) -> Result<ResponseEnvelope> {
        let session_id = self.session_id.as_deref().ok_or_else(|| {
            Error::usage("session is not logged on at the moment")
        })?;

        let mut message = Map::new();
        message.insert("sessionID".to_string(), json!(session_id));
        if let Some(cmd) = &command.cmd {
            message.insert("cmd".to_string(), json!(cmd));
        }

        let pairs: Vec<(&str, Option<AttributeValue>)> = command
            .attributes
            .iter()
            .map(|(field_id, value)| (field_id.as_str(), value.clone()))
            .collect();
        message.insert(
            "attributeSet".to_string(),
            json!({ "attributes": attribute::encode(&pairs) }),
        );

        if let Some(options) = &command.query_options {
            if !options.is_empty() {
                message.insert("queryOptions".to_string(), options.to_value());
            }
        }

        self.dispatch(
            &command.operation,
            &Value::Object(message),
            &CallOptions::default(),
        )
    }

    /// The administrative sessions currently open on the server.
    pub fn list_active_sessions(&self) -> Result<Vec<SessionSummary>> {
        let envelope = self.execute(Command::new("admin_session_query"))?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!("session query failed: {}", describe(&envelope)),
                envelope.errors,
            ));
        }

        Ok(envelope
            .sets()
            .into_iter()
            .map(|attrs| SessionSummary {
                index: int_of(attrs, ADMINSESSIONFLD_SESSION_IDX),
                username: string_of(attrs, ADMINSESSIONFLD_LOGIN_NAME),
                domain: string_of(attrs, ADMINSESSIONFLD_DOMAIN),
                location: string_of(attrs, ADMINSESSIONFLD_LOCATION),
                start_time: time_of(attrs, ADMINSESSIONFLD_START_TIME),
            })
            .collect())
    }

    /// Look up a token by serial number. See [`Token::find`].
    pub fn find_token(&self, serial: &str) -> Result<Token<'_>> {
        Token::find(self, serial)
    }

    /// Search tokens. See [`Token::search`].
    pub fn search_tokens(
        &self,
        query: &TokenQuery,
        options: &SearchOptions,
    ) -> Result<Vec<Token<'_>>> {
        Token::search(self, query, options)
    }

    /// Look up a directory user. See [`DirectoryUser::find`].
    pub fn find_user(&self, username: &str, domain: &str) -> Result<DirectoryUser<'_>> {
        DirectoryUser::find(self, username, domain)
    }

    /// Search directory users. See [`DirectoryUser::search`].
    pub fn search_users(
        &self,
        query: &UserQuery,
        options: &SearchOptions,
    ) -> Result<Vec<DirectoryUser<'_>>> {
        DirectoryUser::search(self, query, options)
    }

    fn dispatch(
        &self,
        operation: &str,
        message: &Value,
        options: &CallOptions,
    ) -> Result<ResponseEnvelope> {
        transport::dispatch(
            self.transport.as_ref(),
            &self.redacted_fields,
            operation,
            message,
            options,
        )
    }

    fn clear_session_state(&mut self) {
        self.session_id = None;
        self.privileges = None;
        self.location = None;
        self.product = None;
        self.version = None;
        self.last_logon = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("service_account", &self.service_account)
            .field("logged_on", &self.logged_on())
            .field("product", &self.product)
            .finish_non_exhaustive()
    }
}

/// One row of the active-session query.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Server-side session slot index.
    pub index: Option<i64>,
    /// Identity the session was opened by.
    pub username: Option<String>,
    /// Domain the session was opened against.
    pub domain: Option<String>,
    /// Client location recorded at logon.
    pub location: Option<String>,
    /// When the session was opened.
    pub start_time: Option<DateTime<Utc>>,
}

/// Parse the privilege field: `"NAME true|false"` tokens joined by `", "`.
fn parse_privileges(raw: &str) -> HashMap<String, bool> {
    raw.split(", ")
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut parts = token.splitn(2, ' ');
            let name = parts.next().unwrap_or("").to_string();
            let granted = parts.next() == Some("true");
            (name, granted)
        })
        .collect()
}

fn default_redaction() -> Vec<String> {
    DEFAULT_REDACTED_FIELDS
        .iter()
        .map(|field| field.to_string())
        .collect()
}

fn describe(envelope: &ResponseEnvelope) -> String {
    let errors = envelope.error_text();
    if errors.is_empty() {
        envelope.status.clone()
    } else {
        format!("{} - {}", envelope.status, errors)
    }
}
