//! Search pagination and result-shaping options.

use serde_json::{Map, Value, json};

/// Options applied to a search command.
///
/// All fields are optional; an empty value adds nothing to the request.
///
/// # Examples
///
/// ```rust
/// use identikey_client::query::SearchOptions;
///
/// let options = SearchOptions::new().with_offset(10).with_limit(25);
/// assert_eq!(options.limit, Some(25));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Number of matching records to skip.
    pub offset: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
    /// Whether the server should collapse duplicate records.
    pub distinct: bool,
}

impl SearchOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the first `offset` matching records.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Return at most `limit` records.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Ask the server to collapse duplicate records.
    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Whether these options add anything to a request.
    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.limit.is_none() && !self.distinct
    }

    /// Render the request-tree form of these options.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        if let Some(offset) = self.offset {
            object.insert("offset".to_string(), json!(offset));
        }
        if let Some(limit) = self.limit {
            object.insert("limit".to_string(), json!(limit));
        }
        if self.distinct {
            object.insert("distinct".to_string(), json!(true));
        }
        Value::Object(object)
    }
}
