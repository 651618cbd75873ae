//! The hardware/software token resource.
//!
//! A [`Token`] is a client-side snapshot of a server-managed credential
//! device. Attributes are immutable snapshot data, replaced wholesale from
//! the server's response on every fetch or mutation — never patched
//! client-side. Assignment flips the resource between its two states,
//! unassigned and assigned.

use crate::attribute::{AttributeMap, AttributeValue, bool_of, int_of, string_of, time_of};
use crate::error::{Error, Result};
use crate::query::SearchOptions;
use crate::session::{Command, Session};
use chrono::{DateTime, Utc};

const OP_EXECUTE: &str = "digipass_execute";
const OP_QUERY: &str = "digipass_query";
const OP_APPL_EXECUTE: &str = "digipassappl_execute";

const CMD_VIEW: &str = "DIGIPASSCMD_VIEW";
const CMD_ASSIGN: &str = "DIGIPASSCMD_ASSIGN";
const CMD_UNASSIGN: &str = "DIGIPASSCMD_UNASSIGN";
const CMD_TEST_OTP: &str = "DIGIPASSAPPLCMD_TEST_OTP";
const CMD_SET_PIN: &str = "DIGIPASSAPPLCMD_SET_PIN";

const FLD_SERNO: &str = "DIGIPASSFLD_SERNO";
const FLD_DOMAIN: &str = "DIGIPASSFLD_DOMAIN";
const FLD_ORGANIZATIONAL_UNIT: &str = "DIGIPASSFLD_ORGANIZATIONAL_UNIT";
const FLD_DPTYPE: &str = "DIGIPASSFLD_DPTYPE";
const FLD_ACTIVE_APPL_NAMES: &str = "DIGIPASSFLD_ACTIVE_APPL_NAMES";
const FLD_ASSIGN_STATUS: &str = "DIGIPASSFLD_ASSIGN_STATUS";
const FLD_ASSIGNED_USERID: &str = "DIGIPASSFLD_ASSIGNED_USERID";
const FLD_ASSIGNED_DATE: &str = "DIGIPASSFLD_ASSIGNED_DATE";
const FLD_GRACE_PERIOD_DAYS: &str = "DIGIPASSFLD_GRACE_PERIOD_DAYS";
const FLD_GRACE_PERIOD_EXPIRES: &str = "DIGIPASSFLD_GRACE_PERIOD_EXPIRES";
const FLD_GRACE_PERIOD_EXPIRED: &str = "DIGIPASSFLD_GRACE_PERIOD_EXPIRED";
const FLD_CREATE_TIME: &str = "DIGIPASSFLD_CREATE_TIME";
const FLD_MODIFY_TIME: &str = "DIGIPASSFLD_MODIFY_TIME";
const FLD_ACTIV_COUNT: &str = "DIGIPASSFLD_ACTIV_COUNT";
const FLD_LAST_ACTIV_TIME: &str = "DIGIPASSFLD_LAST_ACTIV_TIME";
const FLD_MAX_ACTIVATIONS: &str = "DIGIPASSFLD_MAX_ACTIVATIONS";
const FLD_BIND_STATUS: &str = "DIGIPASSFLD_BIND_STATUS";
const FLD_EXPIRED: &str = "DIGIPASSFLD_EXPIRED";
const FLD_EXPIRATION_TIME: &str = "DIGIPASSFLD_EXPIRATION_TIME";

const APPL_FLD_SERNO: &str = "DIGIPASSAPPLFLD_SERNO";
const APPL_FLD_APPL_NAME: &str = "DIGIPASSAPPLFLD_APPL_NAME";
const APPL_FLD_RESPONSE: &str = "DIGIPASSAPPLFLD_RESPONSE";
const APPL_FLD_NEW_PIN: &str = "DIGIPASSAPPLFLD_NEW_PIN";
const APPL_FLD_CONFIRM_NEW_PIN: &str = "DIGIPASSAPPLFLD_CONFIRM_NEW_PIN";
const APPL_FLD_RESULT_CODE: &str = "DIGIPASSAPPLFLD_RESULT_CODE";

/// The assignment status value of an assigned token.
const STATUS_ASSIGNED: &str = "Assigned";

/// The application-level result code of a valid one-time password.
const OTP_VALID_RESULT_CODE: &str = "0";

/// Equality filters for a token search.
///
/// Every populated field becomes one query attribute; empty fields add
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct TokenQuery {
    /// Assigned user id.
    pub username: Option<String>,
    /// Serial number.
    pub serial: Option<String>,
    /// Assignment status (`"Assigned"` / `"Unassigned"`).
    pub status: Option<String>,
    /// Domain.
    pub domain: Option<String>,
    /// Organizational unit.
    pub ou: Option<String>,
    /// Device type.
    pub token_type: Option<String>,
    /// Active application name.
    pub application: Option<String>,
}

impl TokenQuery {
    fn apply(&self, mut command: Command) -> Command {
        let filters = [
            (FLD_ASSIGNED_USERID, &self.username),
            (FLD_SERNO, &self.serial),
            (FLD_ASSIGN_STATUS, &self.status),
            (FLD_DOMAIN, &self.domain),
            (FLD_ORGANIZATIONAL_UNIT, &self.ou),
            (FLD_DPTYPE, &self.token_type),
            (FLD_ACTIVE_APPL_NAMES, &self.application),
        ];

        for (field_id, value) in filters {
            command = command
                .optional_attribute(field_id, value.as_deref().map(AttributeValue::from));
        }
        command
    }
}

/// A client-side snapshot of one token.
pub struct Token<'s> {
    session: &'s Session,

    serial: Option<String>,
    domain: Option<String>,
    ou: Option<String>,
    token_type: Option<String>,
    applications: Vec<String>,
    status: Option<String>,
    assigned_user: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    grace_expires_at: Option<DateTime<Utc>>,
    grace_expired: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    activation_count: Option<i64>,
    last_activation_at: Option<DateTime<Utc>>,
    max_activations: Option<i64>,
    bind_status: Option<String>,
    expired: Option<bool>,
}

impl<'s> Token<'s> {
    /// Fetch one token by serial number.
    ///
    /// Fails with [`Error::NotFound`] when the server does not report
    /// success for the lookup.
    pub fn find(session: &'s Session, serial: &str) -> Result<Self> {
        let envelope = session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_VIEW)
                .attribute(FLD_SERNO, serial),
        )?;

        if !envelope.is_success() {
            return Err(Error::not_found(
                format!(
                    "find token {serial} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("token view returned no attributes"))?;

        Ok(Self::from_attributes(session, attrs))
    }

    /// Search tokens by equality filters.
    ///
    /// A "not found" status yields an empty list; any other non-success
    /// status fails with [`Error::OperationFailed`].
    pub fn search(
        session: &'s Session,
        query: &TokenQuery,
        options: &SearchOptions,
    ) -> Result<Vec<Self>> {
        let command = query
            .apply(Command::new(OP_QUERY))
            .query_options(options.clone());

        let envelope = session.execute(command)?;

        if envelope.is_not_found() {
            return Ok(Vec::new());
        }
        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "token search failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        Ok(envelope
            .sets()
            .into_iter()
            .map(|attrs| Self::from_attributes(session, attrs))
            .collect())
    }

    /// Populate a snapshot from a decoded attribute set.
    ///
    /// Wire fields with no struct member here are dropped; this explicit
    /// set is the maintained contract surface.
    fn from_attributes(session: &'s Session, attrs: &AttributeMap) -> Self {
        Self {
            session,
            serial: string_of(attrs, FLD_SERNO),
            domain: string_of(attrs, FLD_DOMAIN),
            ou: string_of(attrs, FLD_ORGANIZATIONAL_UNIT),
            token_type: string_of(attrs, FLD_DPTYPE),
            applications: split_list(string_of(attrs, FLD_ACTIVE_APPL_NAMES)),
            status: string_of(attrs, FLD_ASSIGN_STATUS),
            assigned_user: string_of(attrs, FLD_ASSIGNED_USERID),
            assigned_at: time_of(attrs, FLD_ASSIGNED_DATE),
            grace_expires_at: time_of(attrs, FLD_GRACE_PERIOD_EXPIRES),
            grace_expired: bool_of(attrs, FLD_GRACE_PERIOD_EXPIRED),
            created_at: time_of(attrs, FLD_CREATE_TIME),
            updated_at: time_of(attrs, FLD_MODIFY_TIME),
            activation_count: int_of(attrs, FLD_ACTIV_COUNT),
            last_activation_at: time_of(attrs, FLD_LAST_ACTIV_TIME),
            max_activations: int_of(attrs, FLD_MAX_ACTIVATIONS),
            bind_status: string_of(attrs, FLD_BIND_STATUS),
            expired: bool_of(attrs, FLD_EXPIRED),
        }
    }

    fn replace_from(&mut self, attrs: &AttributeMap) {
        let session = self.session;
        *self = Self::from_attributes(session, attrs);
    }

    fn require_serial(&self) -> Result<String> {
        self.serial
            .clone()
            .ok_or_else(|| Error::usage("token has no serial number"))
    }

    /// Serial number.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Domain the token lives in.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Organizational unit.
    pub fn ou(&self) -> Option<&str> {
        self.ou.as_deref()
    }

    /// Device type.
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Active application names.
    pub fn applications(&self) -> &[String] {
        &self.applications
    }

    /// Assignment status as reported by the server.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Whether the token is currently assigned.
    pub fn assigned(&self) -> bool {
        self.status.as_deref() == Some(STATUS_ASSIGNED)
    }

    /// User id the token is assigned to, when assigned.
    pub fn assigned_user(&self) -> Option<&str> {
        self.assigned_user.as_deref()
    }

    /// When the token was assigned.
    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    /// When the assignment grace period ends.
    pub fn grace_expires_at(&self) -> Option<DateTime<Utc>> {
        self.grace_expires_at
    }

    /// Whether the assignment grace period has ended.
    pub fn grace_expired(&self) -> Option<bool> {
        self.grace_expired
    }

    /// When the token record was created.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the token record was last modified.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// How many times the token has been activated.
    pub fn activation_count(&self) -> Option<i64> {
        self.activation_count
    }

    /// When the token was last activated.
    pub fn last_activation_at(&self) -> Option<DateTime<Utc>> {
        self.last_activation_at
    }

    /// Maximum number of activations allowed.
    pub fn max_activations(&self) -> Option<i64> {
        self.max_activations
    }

    /// Device binding status.
    pub fn bind_status(&self) -> Option<&str> {
        self.bind_status.as_deref()
    }

    /// Whether the token itself has expired.
    pub fn expired(&self) -> Option<bool> {
        self.expired
    }

    /// The application to use when the caller names none.
    ///
    /// Only unambiguous when the token carries exactly one application;
    /// otherwise the caller must pick one explicitly and this fails with
    /// [`Error::Usage`].
    pub fn default_application(&self) -> Result<&str> {
        match self.applications.as_slice() {
            [single] => Ok(single),
            _ => Err(Error::usage(format!(
                "token {} has {} applications, name one explicitly",
                self.serial.as_deref().unwrap_or("<unknown>"),
                self.applications.len()
            ))),
        }
    }

    /// Assign this token to a user.
    ///
    /// On success the whole snapshot is replaced from the server's
    /// response; on failure the prior snapshot is left untouched.
    pub fn assign(
        &mut self,
        username: &str,
        domain: &str,
        grace_period_days: u64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let serial = self.require_serial()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_ASSIGN)
                .attribute(FLD_SERNO, serial.as_str())
                .attribute(FLD_ASSIGNED_USERID, username)
                .attribute(FLD_DOMAIN, domain)
                .attribute(FLD_GRACE_PERIOD_DAYS, grace_period_days)
                .optional_attribute(FLD_EXPIRATION_TIME, expires_at.map(AttributeValue::from)),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "assign token {serial} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("token assign returned no attributes"))?;
        self.replace_from(attrs);
        Ok(())
    }

    /// Remove this token's current assignment.
    ///
    /// Same snapshot semantics as [`assign`](Self::assign).
    pub fn unassign(&mut self) -> Result<()> {
        let serial = self.require_serial()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_UNASSIGN)
                .attribute(FLD_SERNO, serial.as_str()),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "unassign token {serial} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("token unassign returned no attributes"))?;
        self.replace_from(attrs);
        Ok(())
    }

    /// Verify a one-time password against this token.
    ///
    /// A successful call status does not mean the code was right: the
    /// verdict lives in a separate result-code field, and only its zero
    /// value confirms the code. The call's own failure status is an
    /// [`Error::OperationFailed`]; an unconfirmed code is `Ok(false)`.
    pub fn test_otp(&self, otp: &str, application: Option<&str>) -> Result<bool> {
        let serial = self.require_serial()?;
        let application = match application {
            Some(name) => name.to_string(),
            None => self.default_application()?.to_string(),
        };

        let envelope = self.session.execute(
            Command::new(OP_APPL_EXECUTE)
                .cmd(CMD_TEST_OTP)
                .attribute(APPL_FLD_SERNO, serial.as_str())
                .attribute(APPL_FLD_APPL_NAME, application)
                .attribute(APPL_FLD_RESPONSE, otp),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "test OTP on token {serial} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let result_code = envelope
            .single()
            .and_then(|attrs| string_of(attrs, APPL_FLD_RESULT_CODE));

        Ok(result_code.as_deref() == Some(OTP_VALID_RESULT_CODE))
    }

    /// Set the PIN for an application of this token.
    ///
    /// The server contract wants the new value supplied twice, as value and
    /// confirmation.
    pub fn set_pin(&self, pin: &str, application: Option<&str>) -> Result<()> {
        let serial = self.require_serial()?;
        let application = match application {
            Some(name) => name.to_string(),
            None => self.default_application()?.to_string(),
        };

        let envelope = self.session.execute(
            Command::new(OP_APPL_EXECUTE)
                .cmd(CMD_SET_PIN)
                .attribute(APPL_FLD_SERNO, serial.as_str())
                .attribute(APPL_FLD_APPL_NAME, application)
                .attribute(APPL_FLD_NEW_PIN, pin)
                .attribute(APPL_FLD_CONFIRM_NEW_PIN, pin),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "set PIN on token {serial} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("serial", &self.serial)
            .field("domain", &self.domain)
            .field("status", &self.status)
            .field("assigned_user", &self.assigned_user)
            .field("applications", &self.applications)
            .finish_non_exhaustive()
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|joined| {
        joined
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
