//! Request and response types for the executor.
//!
//! ## Key Types
//!
//! - [`RequestSpec`] - An immutable, validated description of one HTTP call
//! - [`QueryValue`] - The closed set of scalars a query parameter may carry
//! - [`Body`] - Request body encodings, including a raw escape hatch for malformed payloads
//! - [`Response`] - The normalized result of a call: status, body and headers
//!
//! Requests are validated when they are built, so the executor never sees a
//! path it cannot send.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessError;

/// HTTP methods the harness can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar query parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl QueryValue {
    /// The value as sent on the wire.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Request body encodings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Body {
    #[default]
    None,
    Json(Value),
    Form(BTreeMap<String, String>),
    /// Sent byte-for-byte with the given content type. Used to send payloads
    /// that structured serialization would refuse to produce.
    Raw { content: String, content_type: String },
}

impl Body {
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            Self::Raw { content_type, .. } => Some(content_type),
        }
    }

    /// A stable text rendering of the body, used to match recorded requests.
    ///
    /// JSON and raw bodies match what is sent. Form fields are percent-encoded
    /// with `%20` for spaces, which is not byte-for-byte what the live client
    /// sends (`+`).
    pub fn canonical_text(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Json(value) => Some(value.to_string()),
            Self::Form(fields) => Some(
                fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
            Self::Raw { content, .. } => Some(content.clone()),
        }
    }
}

/// A fully-formed HTTP request description. Build one with
/// [`RequestSpec::builder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: BTreeMap<String, QueryValue>,
    body: Body,
}

impl RequestSpec {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: Body::None,
        }
    }

    pub fn get(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(Method::Delete, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, QueryValue> {
        &self.query
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    method: Method,
    path: String,
    query: BTreeMap<String, QueryValue>,
    body: Body,
}

impl RequestSpecBuilder {
    pub fn query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Body::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn raw(mut self, content: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.body = Body::Raw {
            content: content.into(),
            content_type: content_type.into(),
        };
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<RequestSpec, HarnessError> {
        validate_path(&self.path)?;

        for (name, value) in &self.query {
            if name.is_empty() {
                return Err(HarnessError::MalformedRequestInput(
                    "query parameter name must not be empty".to_string(),
                ));
            }
            if let QueryValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(HarnessError::MalformedRequestInput(format!(
                        "query parameter `{}` is not a finite number",
                        name
                    )));
                }
            }
        }

        if let Body::Raw { content_type, .. } = &self.body {
            if content_type.trim().is_empty() || HeaderValue::from_str(content_type).is_err() {
                return Err(HarnessError::MalformedRequestInput(format!(
                    "invalid content type {:?} for raw body",
                    content_type
                )));
            }
        }

        Ok(RequestSpec {
            method: self.method,
            path: self.path,
            query: self.query,
            body: self.body,
        })
    }
}

fn validate_path(path: &str) -> Result<(), HarnessError> {
    let problem = if !path.starts_with('/') {
        Some("must start with '/'")
    } else if path.starts_with("//") || path.contains("://") {
        Some("must be relative to the base URL")
    } else if path.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if path.contains('?') || path.contains('#') {
        Some("must not contain a query or fragment; use query parameters instead")
    } else {
        None
    };

    match problem {
        Some(reason) => Err(HarnessError::MalformedRequestInput(format!(
            "path {:?} {}",
            path, reason
        ))),
        None => Ok(()),
    }
}

/// Response body: parsed JSON when possible, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// The normalized result of one call. A 4xx or 5xx is still a `Response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: ResponseBody,
    /// Lower-cased header names.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Response {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        self.body.json()
    }

    /// Looks up a JSON pointer in the body. `""` is the whole body.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.json().and_then(|value| value.pointer(pointer))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
