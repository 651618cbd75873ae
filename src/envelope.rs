//! Response envelope decoding.
//!
//! Every remote command, whatever its operation, answers with the same
//! envelope: a status code, an optional attribute set (or list of sets), and
//! an optional error stack. [`decode`] normalizes the documented shape
//! variations — the authentication family's double wrapping, single-element
//! lists collapsed to bare elements, a single error description instead of a
//! list — into one [`ResponseEnvelope`].

use crate::attribute::{self, AttributeMap};
use crate::error::{Error, Result};
use serde_json::Value;

/// Status code of a successful command.
pub const STAT_SUCCESS: &str = "STAT_SUCCESS";

/// Status code of a lookup that matched nothing.
pub const STAT_NOT_FOUND: &str = "STAT_NOT_FOUND";

/// Status code acknowledging an administrative session logoff.
pub const STAT_ADMIN_SESSION_STOPPED: &str = "STAT_ADMIN_SESSION_STOPPED";

/// Alternate logoff acknowledgement emitted by some server releases.
pub const STAT_SESSION_STOPPED: &str = "STAT_SESSION_STOPPED";

/// Sentinel used when the response carries no status code at all.
pub const STAT_UNKNOWN: &str = "STAT_UNKNOWN";

/// The result attributes of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultAttributes {
    /// A single object's attributes.
    Single(AttributeMap),
    /// A list of objects' attributes. A one-element response list stays a
    /// one-element list here, never a bare mapping.
    Multiple(Vec<AttributeMap>),
}

/// The decoded shape of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Server status code, or [`STAT_UNKNOWN`] when the response omitted it.
    pub status: String,
    /// Result attributes, when the command returned any.
    pub attributes: Option<ResultAttributes>,
    /// Human-readable error descriptions from the server's error stack.
    pub errors: Option<Vec<String>>,
}

impl ResponseEnvelope {
    /// Whether the command reported [`STAT_SUCCESS`].
    ///
    /// An absent status decodes to [`STAT_UNKNOWN`] and is therefore never
    /// treated as success.
    pub fn is_success(&self) -> bool {
        self.status == STAT_SUCCESS
    }

    /// Whether the command reported [`STAT_NOT_FOUND`].
    pub fn is_not_found(&self) -> bool {
        self.status == STAT_NOT_FOUND
    }

    /// The single attribute set of this response, if it has one.
    pub fn single(&self) -> Option<&AttributeMap> {
        match &self.attributes {
            Some(ResultAttributes::Single(map)) => Some(map),
            _ => None,
        }
    }

    /// The attribute sets of this response as a list.
    ///
    /// A single set is returned as a one-element list; no attributes at all
    /// is an empty list.
    pub fn sets(&self) -> Vec<&AttributeMap> {
        match &self.attributes {
            Some(ResultAttributes::Single(map)) => vec![map],
            Some(ResultAttributes::Multiple(maps)) => maps.iter().collect(),
            None => Vec::new(),
        }
    }

    /// The error stack joined for use in error messages.
    pub fn error_text(&self) -> String {
        match &self.errors {
            Some(errors) => errors.join("; "),
            None => String::new(),
        }
    }
}

/// Decode a raw response tree into a [`ResponseEnvelope`].
///
/// `expected_root` is the name of the root element the invoked operation
/// answers with, conventionally `<operation>_response`. The walk is:
///
/// 1. the tree must be a non-empty object containing `expected_root`;
/// 2. a root whose only child is `<operation>_results` is unwrapped one
///    level (the authentication API family double-wraps its results);
/// 3. `results` and `results.result_codes` must be present;
/// 4. the status code defaults to [`STAT_UNKNOWN`] when absent;
/// 5. `results.result_attribute` must be present, though it may be empty;
/// 6. a flat `attributes` list decodes to a single set, an `attribute_list`
///    decodes to a list of sets, neither means no attributes;
/// 7. an `error_stack.errors` child normalizes to a list of description
///    strings, absence means no errors.
pub fn decode(body: &Value, expected_root: &str) -> Result<ResponseEnvelope> {
    let tree = body
        .as_object()
        .filter(|object| !object.is_empty())
        .ok_or_else(|| Error::parse("empty response received"))?;

    let mut root = tree.get(expected_root).ok_or_else(|| {
        let found = tree.keys().cloned().collect::<Vec<_>>().join(", ");
        Error::parse(format!(
            "expected response to have {expected_root}, found {found}"
        ))
    })?;

    // The authentication API wraps the results in one more element named
    // after the operation.
    if let (Some(object), Some(prefix)) = (root.as_object(), expected_root.strip_suffix("_response"))
    {
        let results_key = format!("{prefix}_results");
        if object.len() == 1 {
            if let Some(inner) = object.get(&results_key) {
                root = inner;
            }
        }
    }

    let results = root.get("results").ok_or_else(|| {
        Error::parse(format!("results element not found below {expected_root}"))
    })?;

    let result_codes = results.get("result_codes").ok_or_else(|| {
        Error::parse(format!("result codes not found below {expected_root}"))
    })?;

    let status = result_codes
        .get("status_code_enum")
        .and_then(Value::as_str)
        .unwrap_or(STAT_UNKNOWN)
        .to_string();

    let result_attribute = results.get("result_attribute").ok_or_else(|| {
        Error::parse(format!("result attribute not found below {expected_root}"))
    })?;

    let attributes = if let Some(entries) = result_attribute.get("attributes") {
        Some(ResultAttributes::Single(attribute::decode(as_list(
            entries,
        ))?))
    } else if let Some(entries) = result_attribute.get("attribute_list") {
        // Each entry holds its own attribute set; both the outer list and
        // each inner list may have been collapsed to a bare element.
        let sets = as_list(entries)
            .into_iter()
            .map(|entry| {
                let attrs = entry.get("attributes").ok_or_else(|| {
                    Error::parse(format!(
                        "attribute_list entry below {expected_root} has no attributes"
                    ))
                })?;
                attribute::decode(as_list(attrs))
            })
            .collect::<Result<Vec<_>>>()?;
        Some(ResultAttributes::Multiple(sets))
    } else {
        None
    };

    let errors = match results.get("error_stack").and_then(|stack| stack.get("errors")) {
        Some(entries) => Some(decode_errors(entries)?),
        None => None,
    };

    Ok(ResponseEnvelope {
        status,
        attributes,
        errors,
    })
}

/// Normalize a tree node into a list of elements.
///
/// A representation that collapsed a one-element list yields that single
/// element; an explicit null yields an empty list.
fn as_list(node: &Value) -> Vec<&Value> {
    match node {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn decode_errors(entries: &Value) -> Result<Vec<String>> {
    as_list(entries)
        .into_iter()
        .map(|entry| {
            entry
                .get("error_desc")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::parse(format!("error stack entry has no error_desc: {entry}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::string_of;
    use serde_json::json;

    fn attribute_entry(id: &str, value: &str) -> Value {
        json!({"attribute_id": id, "value": value})
    }

    #[test]
    fn test_decode_single_attribute_set() {
        let body = json!({
            "logon_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                    "result_attribute": {
                        "attributes": [
                            attribute_entry("CREDFLD_SESSION_ID", "sid-1"),
                            attribute_entry("CREDFLD_USERID", "admin"),
                        ]
                    },
                    "error_stack": {}
                }
            }
        });

        let envelope = decode(&body, "logon_response").unwrap();
        assert!(envelope.is_success());
        let attrs = envelope.single().unwrap();
        assert_eq!(string_of(attrs, "CREDFLD_SESSION_ID").as_deref(), Some("sid-1"));
        assert!(envelope.errors.is_none());
    }

    #[test]
    fn test_decode_collapsed_single_attribute() {
        // A one-attribute set may collapse to a bare element.
        let body = json!({
            "logoff_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_ADMIN_SESSION_STOPPED"},
                    "result_attribute": {
                        "attributes": attribute_entry("CREDFLD_SESSION_ID", "sid-1")
                    }
                }
            }
        });

        let envelope = decode(&body, "logoff_response").unwrap();
        let attrs = envelope.single().unwrap();
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_decode_one_element_attribute_list_stays_a_list() {
        let body = json!({
            "digipass_query_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                    "result_attribute": {
                        "attribute_list": {
                            "attributes": [attribute_entry("DIGIPASSFLD_SERNO", "001")]
                        }
                    }
                }
            }
        });

        let envelope = decode(&body, "digipass_query_response").unwrap();
        match envelope.attributes {
            Some(ResultAttributes::Multiple(ref sets)) => {
                assert_eq!(sets.len(), 1);
                assert_eq!(string_of(&sets[0], "DIGIPASSFLD_SERNO").as_deref(), Some("001"));
            }
            other => panic!("expected a one-element list, got {other:?}"),
        }
        assert!(envelope.single().is_none());
    }

    #[test]
    fn test_decode_double_wrapped_response() {
        let body = json!({
            "auth_user_response": {
                "auth_user_results": {
                    "results": {
                        "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                        "result_attribute": {}
                    }
                }
            }
        });

        let envelope = decode(&body, "auth_user_response").unwrap();
        assert!(envelope.is_success());
        assert!(envelope.attributes.is_none());
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(matches!(
            decode(&json!({}), "logon_response"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            decode(&Value::Null, "logon_response"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_root() {
        let body = json!({"logoff_response": {}});
        let error = decode(&body, "logon_response").unwrap_err();
        assert!(error.to_string().contains("logon_response"));
        assert!(error.to_string().contains("logoff_response"));
    }

    #[test]
    fn test_decode_missing_result_codes() {
        let body = json!({
            "logon_response": {
                "results": {
                    "result_attribute": {}
                }
            }
        });
        assert!(matches!(
            decode(&body, "logon_response"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_decode_missing_status_yields_sentinel() {
        let body = json!({
            "logon_response": {
                "results": {
                    "result_codes": {},
                    "result_attribute": {}
                }
            }
        });

        let envelope = decode(&body, "logon_response").unwrap();
        assert_eq!(envelope.status, STAT_UNKNOWN);
        assert!(!envelope.is_success());
    }

    #[test]
    fn test_decode_missing_result_attribute() {
        let body = json!({
            "logon_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_SUCCESS"}
                }
            }
        });
        assert!(matches!(
            decode(&body, "logon_response"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_decode_error_stack_shapes() {
        let single = json!({
            "user_execute_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_INVDATA"},
                    "result_attribute": {},
                    "error_stack": {
                        "errors": {"error_desc": "S-004024: invalid data"}
                    }
                }
            }
        });
        let envelope = decode(&single, "user_execute_response").unwrap();
        assert_eq!(
            envelope.errors,
            Some(vec!["S-004024: invalid data".to_string()])
        );

        let multiple = json!({
            "user_execute_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_ERROR"},
                    "result_attribute": {},
                    "error_stack": {
                        "errors": [
                            {"error_desc": "first"},
                            {"error_desc": "second"}
                        ]
                    }
                }
            }
        });
        let envelope = decode(&multiple, "user_execute_response").unwrap();
        assert_eq!(
            envelope.errors,
            Some(vec!["first".to_string(), "second".to_string()])
        );
        assert_eq!(envelope.error_text(), "first; second");
    }

    #[test]
    fn test_sets_view() {
        let body = json!({
            "user_execute_response": {
                "results": {
                    "result_codes": {"status_code_enum": "STAT_SUCCESS"},
                    "result_attribute": {
                        "attributes": [attribute_entry("USERFLD_USERID", "jdoe")]
                    }
                }
            }
        });
        let envelope = decode(&body, "user_execute_response").unwrap();
        assert_eq!(envelope.sets().len(), 1);

        let empty = ResponseEnvelope {
            status: STAT_SUCCESS.to_string(),
            attributes: None,
            errors: None,
        };
        assert!(empty.sets().is_empty());
    }
}
