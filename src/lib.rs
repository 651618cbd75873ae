//! Typed client for IDENTIKEY Authentication Server attribute-value APIs.
//!
//! Every operation the server exposes — logon, user lookup, token
//! assignment, OTP validation — travels over the same envelope: a request
//! built from an ordered set of typed attributes, and a response carrying a
//! status code, optional result attributes, and an optional error stack.
//! This crate owns the typed encoding, the envelope decoding, and the
//! client-side state machines built on top of them, while the actual
//! SOAP/XML wire mechanics stay behind the [`Transport`] trait.
//!
//! # Core Components
//!
//! - [`Session`] - one authenticated administrative identity and the single
//!   dispatch primitive every operation funnels through
//! - [`Token`] / [`DirectoryUser`] - client-side models of the
//!   server-managed resources
//! - [`Authentication`] - sessionless end-user OTP validation
//! - [`Transport`] - the seam where callers plug in their wire layer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use identikey_client::{CallOptions, Session, Transport, TransportError};
//! use serde_json::Value;
//!
//! struct SoapTransport; // bring your own SOAP/XML layer
//!
//! impl Transport for SoapTransport {
//!     fn call(
//!         &self,
//!         _operation: &str,
//!         _request: &Value,
//!         _options: &CallOptions,
//!     ) -> Result<Value, TransportError> {
//!         unimplemented!("perform the call and return the response tree")
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::new(Box::new(SoapTransport), "admin", "secret", "master");
//!     session.logon()?;
//!
//!     let token = session.find_token("0097123456")?;
//!     println!("assigned to: {:?}", token.assigned_user());
//!
//!     session.logoff()?;
//!     Ok(())
//! }
//! ```

pub mod attribute;
pub mod auth;
pub mod envelope;
pub mod error;
pub mod query;
pub mod session;
pub mod token;
pub mod transport;
pub mod user;

// Re-export commonly used types for convenience
pub use attribute::{AttributeMap, AttributeValue};
pub use auth::Authentication;
pub use envelope::{ResponseEnvelope, ResultAttributes};
pub use error::{Error, Result};
pub use query::SearchOptions;
pub use session::{Command, Session, SessionSummary};
pub use token::{Token, TokenQuery};
pub use transport::{CallOptions, Transport, TransportConfig, TransportError};
pub use user::{DirectoryUser, UserQuery};
