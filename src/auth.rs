//! End-user one-time-password validation.
//!
//! The authentication API family stands apart from the administrative one:
//! it needs no session, carries its credentials in a
//! `credentialAttributeSet`, and double-wraps its response envelope. Use it
//! to check an end user's OTP the way a protected application would, for
//! example after provisioning a token.

use crate::attribute::{self, AttributeValue};
use crate::error::{Error, Result};
use crate::session::{
    CREDFLD_COMPONENT_TYPE, CREDFLD_DOMAIN, CREDFLD_PASSWORD, CREDFLD_PASSWORD_FORMAT,
    CREDFLD_USERID,
};
use crate::transport::{self, CallOptions, DEFAULT_REDACTED_FIELDS, Transport};
use serde_json::json;

const OP_AUTH_USER: &str = "auth_user";

/// Component type reported when the caller names none.
const DEFAULT_COMPONENT_TYPE: &str = "Administration Program";

/// Client for the end-user authentication operations.
pub struct Authentication {
    transport: Box<dyn Transport>,
    redacted_fields: Vec<String>,
}

impl Authentication {
    /// An authentication client over the given transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            redacted_fields: DEFAULT_REDACTED_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }

    /// Validate `otp` for the given end user, failing on rejection.
    ///
    /// `component` is the component type the server records for the
    /// attempt; it defaults to the administration program. A non-success
    /// status fails with [`Error::OperationFailed`] carrying the server's
    /// error stack.
    pub fn validate(
        &self,
        username: &str,
        domain: &str,
        otp: &str,
        component: Option<&str>,
    ) -> Result<()> {
        let attributes = attribute::encode(&[
            (
                CREDFLD_COMPONENT_TYPE,
                Some(AttributeValue::from(
                    component.unwrap_or(DEFAULT_COMPONENT_TYPE),
                )),
            ),
            (CREDFLD_USERID, Some(AttributeValue::from(username))),
            (CREDFLD_DOMAIN, Some(AttributeValue::from(domain))),
            (CREDFLD_PASSWORD_FORMAT, Some(AttributeValue::unsigned(0)?)),
            (CREDFLD_PASSWORD, Some(AttributeValue::from(otp))),
        ]);
        let message = json!({ "credentialAttributeSet": { "attributes": attributes } });

        let envelope = transport::dispatch(
            self.transport.as_ref(),
            &self.redacted_fields,
            OP_AUTH_USER,
            &message,
            &CallOptions::default(),
        )?;

        if !envelope.is_success() {
            let errors = envelope.error_text();
            let detail = if errors.is_empty() {
                envelope.status.clone()
            } else {
                format!("{} - {}", envelope.status, errors)
            };
            return Err(Error::operation_failed(
                format!("authentication of {username}@{domain} failed: {detail}"),
                envelope.errors,
            ));
        }

        Ok(())
    }

    /// Whether `otp` is valid for the given end user.
    ///
    /// A rejected attempt is `Ok(false)`; transport and parse failures
    /// still propagate as errors.
    pub fn valid_otp(
        &self,
        username: &str,
        domain: &str,
        otp: &str,
        component: Option<&str>,
    ) -> Result<bool> {
        match self.validate(username, domain, otp, component) {
            Ok(()) => Ok(true),
            Err(Error::OperationFailed { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication").finish_non_exhaustive()
    }
}
