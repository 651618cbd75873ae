//! The directory user resource.
//!
//! A [`DirectoryUser`] starts *transient* — constructed locally, not yet
//! confirmed to exist server-side — and becomes *persisted* once a view,
//! create, or update call confirms it. Deleting flips it back to
//! non-persisted while the attribute snapshot stays in memory for
//! inspection. Writable attributes are public fields; everything the server
//! manages is exposed through read-only accessors.

use crate::attribute::{AttributeMap, AttributeValue, bool_of, int_of, string_of, time_of};
use crate::error::{Error, Result};
use crate::query::SearchOptions;
use crate::session::{Command, Session};
use chrono::{DateTime, Utc};

const OP_EXECUTE: &str = "user_execute";
const OP_QUERY: &str = "user_query";

const CMD_VIEW: &str = "USERCMD_VIEW";
const CMD_CREATE: &str = "USERCMD_CREATE";
const CMD_UPDATE: &str = "USERCMD_UPDATE";
const CMD_DELETE: &str = "USERCMD_DELETE";
const CMD_SET_PASSWORD: &str = "USERCMD_SET_PASSWORD";
const CMD_RESET_PASSWORD: &str = "USERCMD_RESET_PASSWORD";
const CMD_UNLOCK: &str = "USERCMD_UNLOCK";

const FLD_USERID: &str = "USERFLD_USERID";
const FLD_DOMAIN: &str = "USERFLD_DOMAIN";
const FLD_ORGANIZATIONAL_UNIT: &str = "USERFLD_ORGANIZATIONAL_UNIT";
const FLD_EMAIL: &str = "USERFLD_EMAIL";
const FLD_PHONE: &str = "USERFLD_PHONE";
const FLD_MOBILE: &str = "USERFLD_MOBILE";
const FLD_DESCRIPTION: &str = "USERFLD_DESCRIPTION";
const FLD_LOCAL_AUTH: &str = "USERFLD_LOCAL_AUTH";
const FLD_BACKEND_AUTH: &str = "USERFLD_BACKEND_AUTH";
const FLD_DISABLED: &str = "USERFLD_DISABLED";
const FLD_LOCKED: &str = "USERFLD_LOCKED";
const FLD_LOCK_COUNT: &str = "USERFLD_LOCK_COUNT";
const FLD_PASSWORD: &str = "USERFLD_PASSWORD";
const FLD_HAS_STATIC_PASSWORD: &str = "USERFLD_HAS_STATIC_PASSWORD";
const FLD_HAS_DP: &str = "USERFLD_HAS_DP";
const FLD_ASSIGNED_DIGIPASS: &str = "USERFLD_ASSIGNED_DIGIPASS";
const FLD_CREATE_TIME: &str = "USERFLD_CREATE_TIME";
const FLD_MODIFY_TIME: &str = "USERFLD_MODIFY_TIME";
const FLD_LASTAUTH_TIME: &str = "USERFLD_LASTAUTH_TIME";
const FLD_LASTAUTHREQ_TIME: &str = "USERFLD_LASTAUTHREQ_TIME";
const FLD_EXPIRATION_TIME: &str = "USERFLD_EXPIRATION_TIME";
const FLD_EXPIRED: &str = "USERFLD_EXPIRED";

/// Value of the assigned-token field when at least one token is assigned.
const HAS_TOKEN_ASSIGNED: &str = "Assigned";
const HAS_TOKEN_UNASSIGNED: &str = "Unassigned";

/// Equality filters for a directory user search.
///
/// The boolean `has_token` filter translates to the server's enumerated
/// assignment field; the other booleans pass through as booleans.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// User id.
    pub username: Option<String>,
    /// Domain.
    pub domain: Option<String>,
    /// Organizational unit.
    pub ou: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Whether the user has a token assigned.
    pub has_token: Option<bool>,
    /// Whether the account is locked.
    pub locked: Option<bool>,
    /// Whether the account is disabled.
    pub disabled: Option<bool>,
}

impl UserQuery {
    fn apply(&self, mut command: Command) -> Command {
        let strings = [
            (FLD_USERID, &self.username),
            (FLD_DOMAIN, &self.domain),
            (FLD_ORGANIZATIONAL_UNIT, &self.ou),
            (FLD_EMAIL, &self.email),
            (FLD_DESCRIPTION, &self.description),
        ];
        for (field_id, value) in strings {
            command =
                command.optional_attribute(field_id, value.as_deref().map(AttributeValue::from));
        }

        let has_token = self.has_token.map(|assigned| {
            AttributeValue::from(if assigned {
                HAS_TOKEN_ASSIGNED
            } else {
                HAS_TOKEN_UNASSIGNED
            })
        });
        command = command.optional_attribute(FLD_HAS_DP, has_token);

        command = command.optional_attribute(FLD_LOCKED, self.locked.map(AttributeValue::from));
        command.optional_attribute(FLD_DISABLED, self.disabled.map(AttributeValue::from))
    }
}

/// A client-side model of one directory account.
pub struct DirectoryUser<'s> {
    session: &'s Session,
    persisted: bool,

    /// User id.
    pub username: Option<String>,
    /// Domain the account lives in.
    pub domain: Option<String>,
    /// Organizational unit.
    pub ou: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Mobile number.
    pub mobile: Option<String>,
    /// Local authentication policy.
    pub local_auth: Option<String>,
    /// Back-end authentication policy.
    pub backend_auth: Option<String>,
    /// Whether the account is administratively disabled.
    pub disabled: Option<bool>,
    /// Whether the account is locked out.
    pub locked: Option<bool>,

    lock_count: Option<i64>,
    has_password: Option<bool>,
    has_token: bool,
    assigned_tokens: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    last_auth_success_at: Option<DateTime<Utc>>,
    last_auth_attempt_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    expired: Option<bool>,
}

impl<'s> DirectoryUser<'s> {
    /// A blank, transient account bound to `session`.
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            persisted: false,
            username: None,
            domain: None,
            ou: None,
            email: None,
            phone: None,
            mobile: None,
            local_auth: None,
            backend_auth: None,
            disabled: None,
            locked: None,
            lock_count: None,
            has_password: None,
            has_token: false,
            assigned_tokens: Vec::new(),
            created_at: None,
            updated_at: None,
            last_auth_success_at: None,
            last_auth_attempt_at: None,
            expires_at: None,
            expired: None,
        }
    }

    /// Fetch one account by user id and domain.
    ///
    /// Fails with [`Error::NotFound`] when the server does not report
    /// success; the returned entity is persisted.
    pub fn find(session: &'s Session, username: &str, domain: &str) -> Result<Self> {
        let envelope = session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_VIEW)
                .attribute(FLD_USERID, username)
                .attribute(FLD_DOMAIN, domain),
        )?;

        if !envelope.is_success() {
            return Err(Error::not_found(
                format!(
                    "find user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("user view returned no attributes"))?;

        Ok(Self::from_attributes(session, attrs, true))
    }

    /// Search accounts by equality filters.
    ///
    /// A "not found" status yields an empty list; any other non-success
    /// status fails with [`Error::OperationFailed`].
    pub fn search(
        session: &'s Session,
        query: &UserQuery,
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
                    "user search failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        Ok(envelope
            .sets()
            .into_iter()
            .map(|attrs| Self::from_attributes(session, attrs, true))
            .collect())
    }

    fn from_attributes(session: &'s Session, attrs: &AttributeMap, persisted: bool) -> Self {
        Self {
            session,
            persisted,
            username: string_of(attrs, FLD_USERID),
            domain: string_of(attrs, FLD_DOMAIN),
            ou: string_of(attrs, FLD_ORGANIZATIONAL_UNIT),
            email: string_of(attrs, FLD_EMAIL),
            phone: string_of(attrs, FLD_PHONE),
            mobile: string_of(attrs, FLD_MOBILE),
            local_auth: string_of(attrs, FLD_LOCAL_AUTH),
            backend_auth: string_of(attrs, FLD_BACKEND_AUTH),
            disabled: bool_of(attrs, FLD_DISABLED),
            locked: bool_of(attrs, FLD_LOCKED),
            lock_count: int_of(attrs, FLD_LOCK_COUNT),
            has_password: bool_of(attrs, FLD_HAS_STATIC_PASSWORD),
            has_token: string_of(attrs, FLD_HAS_DP).as_deref() == Some(HAS_TOKEN_ASSIGNED),
            assigned_tokens: split_serials(string_of(attrs, FLD_ASSIGNED_DIGIPASS)),
            created_at: time_of(attrs, FLD_CREATE_TIME),
            updated_at: time_of(attrs, FLD_MODIFY_TIME),
            last_auth_success_at: time_of(attrs, FLD_LASTAUTH_TIME),
            last_auth_attempt_at: time_of(attrs, FLD_LASTAUTHREQ_TIME),
            expires_at: time_of(attrs, FLD_EXPIRATION_TIME),
            expired: bool_of(attrs, FLD_EXPIRED),
        }
    }

    fn replace_from(&mut self, attrs: &AttributeMap, persisted: bool) {
        let session = self.session;
        *self = Self::from_attributes(session, attrs, persisted);
    }

    /// Whether this entity has been confirmed to exist server-side.
    pub fn persisted(&self) -> bool {
        self.persisted
    }

    /// Number of consecutive failed authentications.
    pub fn lock_count(&self) -> Option<i64> {
        self.lock_count
    }

    /// Whether the account has a static password set.
    pub fn has_password(&self) -> Option<bool> {
        self.has_password
    }

    /// Whether the account has at least one token assigned.
    pub fn has_token(&self) -> bool {
        self.has_token
    }

    /// Serial numbers of the assigned tokens.
    pub fn assigned_tokens(&self) -> &[String] {
        &self.assigned_tokens
    }

    /// When the account was created.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the account was last modified.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// When the account last authenticated successfully.
    pub fn last_auth_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_auth_success_at
    }

    /// When the account last attempted to authenticate.
    pub fn last_auth_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_auth_attempt_at
    }

    /// When the account expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the account has expired.
    pub fn expired(&self) -> Option<bool> {
        self.expired
    }

    /// Create or update this account, depending on whether it is persisted.
    ///
    /// Sends the writable fields, replaces the whole snapshot from the
    /// response on success, and marks the entity persisted. Fails with
    /// [`Error::OperationFailed`] naming the affected username otherwise.
    pub fn save(&mut self) -> Result<()> {
        let cmd = if self.persisted { CMD_UPDATE } else { CMD_CREATE };
        let username = self.username.clone().unwrap_or_default();

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(cmd)
                .optional_attribute(
                    FLD_BACKEND_AUTH,
                    self.backend_auth.as_deref().map(AttributeValue::from),
                )
                .optional_attribute(FLD_DISABLED, self.disabled.map(AttributeValue::from))
                .optional_attribute(FLD_DOMAIN, self.domain.as_deref().map(AttributeValue::from))
                .optional_attribute(FLD_EMAIL, self.email.as_deref().map(AttributeValue::from))
                .optional_attribute(
                    FLD_LOCAL_AUTH,
                    self.local_auth.as_deref().map(AttributeValue::from),
                )
                .optional_attribute(FLD_LOCKED, self.locked.map(AttributeValue::from))
                .optional_attribute(FLD_MOBILE, self.mobile.as_deref().map(AttributeValue::from))
                .optional_attribute(
                    FLD_ORGANIZATIONAL_UNIT,
                    self.ou.as_deref().map(AttributeValue::from),
                )
                .optional_attribute(FLD_PHONE, self.phone.as_deref().map(AttributeValue::from))
                .optional_attribute(
                    FLD_USERID,
                    self.username.as_deref().map(AttributeValue::from),
                ),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "save user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("user save returned no attributes"))?;
        self.replace_from(attrs, true);
        Ok(())
    }

    /// Re-fetch this account and replace the snapshot.
    pub fn reload(&mut self) -> Result<()> {
        let (username, domain) = self.identity()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_VIEW)
                .attribute(FLD_USERID, username.as_str())
                .attribute(FLD_DOMAIN, domain.as_str()),
        )?;

        if !envelope.is_success() {
            return Err(Error::not_found(
                format!(
                    "find user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        let attrs = envelope
            .single()
            .ok_or_else(|| Error::parse("user view returned no attributes"))?;
        self.replace_from(attrs, true);
        Ok(())
    }

    /// Delete this account server-side.
    ///
    /// Requires a persisted entity with both username and domain set. On
    /// success the entity is no longer persisted, while the in-memory
    /// snapshot remains available for inspection.
    pub fn destroy(&mut self) -> Result<()> {
        self.require_persistence()?;
        let (username, domain) = self.identity()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_DELETE)
                .attribute(FLD_USERID, username.as_str())
                .attribute(FLD_DOMAIN, domain.as_str()),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "destroy user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        self.persisted = false;
        Ok(())
    }

    /// Set the account's static password.
    ///
    /// On success only the local has-password flag is updated; no re-fetch
    /// happens.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.require_persistence()?;
        let (username, domain) = self.identity()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_SET_PASSWORD)
                .attribute(FLD_USERID, username.as_str())
                .attribute(FLD_DOMAIN, domain.as_str())
                .attribute(FLD_PASSWORD, password),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "set password for user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        self.has_password = Some(true);
        Ok(())
    }

    /// Remove the account's static password.
    pub fn clear_password(&mut self) -> Result<()> {
        self.require_persistence()?;
        let (username, domain) = self.identity()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_RESET_PASSWORD)
                .attribute(FLD_USERID, username.as_str())
                .attribute(FLD_DOMAIN, domain.as_str()),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "clear password for user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        self.has_password = Some(false);
        Ok(())
    }

    /// Unlock the account after failed authentications locked it.
    ///
    /// On success only the local locked flag is cleared.
    pub fn unlock(&mut self) -> Result<()> {
        self.require_persistence()?;
        let (username, domain) = self.identity()?;

        let envelope = self.session.execute(
            Command::new(OP_EXECUTE)
                .cmd(CMD_UNLOCK)
                .attribute(FLD_USERID, username.as_str())
                .attribute(FLD_DOMAIN, domain.as_str()),
        )?;

        if !envelope.is_success() {
            return Err(Error::operation_failed(
                format!(
                    "unlock user {username} failed: {} - {}",
                    envelope.status,
                    envelope.error_text()
                ),
                envelope.errors,
            ));
        }

        self.locked = Some(false);
        Ok(())
    }

    fn require_persistence(&self) -> Result<()> {
        if self.persisted {
            Ok(())
        } else {
            Err(Error::usage("user is not persisted"))
        }
    }

    fn identity(&self) -> Result<(String, String)> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| Error::usage("user has no username set"))?;
        let domain = self
            .domain
            .clone()
            .ok_or_else(|| Error::usage("user has no domain set"))?;
        Ok((username, domain))
    }
}

impl std::fmt::Debug for DirectoryUser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryUser")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("email", &self.email)
            .field("persisted", &self.persisted)
            .field("has_token", &self.has_token)
            .finish_non_exhaustive()
    }
}

fn split_serials(raw: Option<String>) -> Vec<String> {
    raw.map(|joined| {
        joined
            .split(',')
            .map(|serial| serial.trim().to_string())
            .filter(|serial| !serial.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
