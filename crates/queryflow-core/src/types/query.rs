//! Query request type definitions
//!
//! QueryRequest represents one natural-language question entering the system.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A natural-language question over a relational source - the first-class
/// input of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Unique identifier for this request
    pub id: String,
    /// The question text
    pub text: String,
    /// Requesting user
    #[serde(default)]
    pub user_id: Option<String>,
    /// Session the request belongs to
    #[serde(default)]
    pub session_id: Option<String>,
    /// Arbitrary caller-supplied context
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl QueryRequest {
    /// Create a new request with just the question text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            user_id: None,
            session_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach user and session identity
    pub fn with_identity(
        mut self,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id.into());
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
