//! Request messages: method invocations awaiting a correlated response.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A message that makes the peer which sent it wait for a
/// [`Response`](crate::messages::Response).
///
/// The correlation id is generated on construction when not supplied
/// explicitly and is immutable afterwards. Equality and hashing are defined
/// solely by the id, so two requests with the same method and parameters
/// are still distinct invocations.
///
/// # Examples
///
/// ```
/// use lattice_net::messages::Request;
/// use serde_json::json;
///
/// let request = Request::new("echo").with_parameter("text", json!("hi"));
/// assert_eq!(request.method(), "echo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The correlation id linking this request to its eventual response.
    id: Uuid,
    /// The method which must match a registered receptor.
    method: String,
    /// The parameters the receptor requires to produce a response.
    #[serde(default)]
    parameters: HashMap<String, Value>,
}

impl Request {
    /// Creates a request for `method` with a fresh correlation id and no
    /// parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            parameters: HashMap::new(),
        }
    }

    /// Creates a request with an explicit correlation id.
    pub fn with_id(id: Uuid, method: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
            parameters: HashMap::new(),
        }
    }

    /// Returns a copy of this request carrying an additional parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns a copy of this request with its parameter map replaced.
    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// The correlation id of this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The method naming the receptor that should answer this request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The parameters of this request.
    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    /// Looks up a single parameter by key.
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Request {}

impl Hash for Request {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
