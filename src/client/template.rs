//! Request templates with `{{name}}` placeholders.
//!
//! A template is the serializable form of a [`RequestSpec`]. Placeholders in
//! the path, string query values, form values, raw bodies and string leaves of
//! a JSON body are resolved against fixture variables when the template is
//! rendered. Names starting with `$` are built-ins:
//!
//! - `{{$timestamp_ms}}` - current Unix time in milliseconds
//!
//! A JSON leaf or query value that consists of exactly one placeholder takes
//! the variable's own type, so `"{{item_id}}"` renders as a number when the
//! captured id was a number.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::types::{Body, Method, QueryValue, RequestSpec};
use crate::error::HarnessError;

pub type Variables = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,
    #[serde(default)]
    pub body: Body,
}

impl RequestTemplate {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: Body::None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Resolves every placeholder and validates the result.
    pub fn render(&self, vars: &Variables) -> Result<RequestSpec, HarnessError> {
        let resolver = Resolver::new(vars);

        let mut builder = RequestSpec::builder(self.method, resolver.substitute(&self.path)?);
        for (name, value) in &self.query {
            builder = builder.query(name.clone(), resolver.query_value(value)?);
        }

        let body = match &self.body {
            Body::None => Body::None,
            Body::Json(value) => Body::Json(resolver.json(value)?),
            Body::Form(fields) => Body::Form(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), resolver.substitute(v)?)))
                    .collect::<Result<_, HarnessError>>()?,
            ),
            Body::Raw {
                content,
                content_type,
            } => Body::Raw {
                content: resolver.substitute(content)?,
                content_type: content_type.clone(),
            },
        };

        builder.body(body).build()
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*(\$?[A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
    })
}

struct Resolver<'a> {
    vars: &'a Variables,
    timestamp_ms: i64,
}

impl<'a> Resolver<'a> {
    fn new(vars: &'a Variables) -> Self {
        Self {
            vars,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, HarnessError> {
        match name {
            "$timestamp_ms" => Ok(Value::from(self.timestamp_ms)),
            _ => self.vars.get(name).cloned().ok_or_else(|| {
                HarnessError::MalformedRequestInput(format!("unknown template variable `{}`", name))
            }),
        }
    }

    /// The variable named by `text` if the whole string is one placeholder.
    fn sole_placeholder(&self, text: &str) -> Option<Result<Value, HarnessError>> {
        let caps = placeholder().captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() == 0 && whole.end() == text.len() {
            Some(self.lookup(&caps[1]))
        } else {
            None
        }
    }

    fn substitute(&self, text: &str) -> Result<String, HarnessError> {
        let mut failure = None;
        let rendered = placeholder().replace_all(text, |caps: &Captures| match self.lookup(&caps[1]) {
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }

    fn query_value(&self, value: &QueryValue) -> Result<QueryValue, HarnessError> {
        let QueryValue::String(text) = value else {
            return Ok(value.clone());
        };

        match self.sole_placeholder(text) {
            Some(resolved) => Ok(match resolved? {
                Value::Bool(b) => QueryValue::Boolean(b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => QueryValue::Integer(i),
                    None => QueryValue::Float(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => QueryValue::String(s),
                other => QueryValue::String(other.to_string()),
            }),
            None => Ok(QueryValue::String(self.substitute(text)?)),
        }
    }

    fn json(&self, value: &Value) -> Result<Value, HarnessError> {
        Ok(match value {
            Value::String(text) => match self.sole_placeholder(text) {
                Some(resolved) => resolved?,
                None => Value::String(self.substitute(text)?),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.json(item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.json(v)?)))
                    .collect::<Result<_, HarnessError>>()?,
            ),
            other => other.clone(),
        })
    }
}
