//! Checks over a [`Response`].
//!
//! Every predicate has a human-readable description. Evaluation returns the
//! failure message on mismatch, naming what was expected and what was seen.
//! Fields are addressed with JSON pointers; `""` is the body itself.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{Response, ResponseBody};

/// A check over a response. Suite files name one by its `check` tag;
/// [`Predicate::Custom`] exists only in code, so suites are read from JSON
/// but never written back.
#[derive(Clone, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Predicate {
    Status {
        code: u16,
    },
    StatusIn {
        codes: Vec<u16>,
    },
    /// Any 2xx.
    StatusSuccess,
    /// Field exists and is not null.
    Present {
        field: String,
    },
    /// Field is missing or null.
    Absent {
        field: String,
    },
    Equals {
        field: String,
        value: Value,
    },
    /// Field is truthy: a non-empty string or collection, a non-zero number, or `true`.
    NonEmpty {
        field: String,
    },
    /// Inclusive numeric range; either bound may be left open.
    InRange {
        field: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    LengthEquals {
        #[serde(default)]
        field: String,
        len: usize,
    },
    LengthAtLeast {
        #[serde(default)]
        field: String,
        min: usize,
    },
    LengthAtMost {
        #[serde(default)]
        field: String,
        max: usize,
    },
    IsJson,
    #[serde(skip)]
    Custom(CustomPredicate),
}

/// A predicate supplied as code rather than data.
#[derive(Clone)]
pub struct CustomPredicate {
    description: String,
    check: Arc<dyn Fn(&Response) -> bool + Send + Sync>,
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.description())
    }
}

impl Predicate {
    pub fn status(code: u16) -> Self {
        Self::Status { code }
    }

    pub fn present(field: impl Into<String>) -> Self {
        Self::Present {
            field: field.into(),
        }
    }

    pub fn absent(field: impl Into<String>) -> Self {
        Self::Absent {
            field: field.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn non_empty(field: impl Into<String>) -> Self {
        Self::NonEmpty {
            field: field.into(),
        }
    }

    pub fn in_range(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::InRange {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn length(field: impl Into<String>, len: usize) -> Self {
        Self::LengthEquals {
            field: field.into(),
            len,
        }
    }

    pub fn custom(
        description: impl Into<String>,
        check: impl Fn(&Response) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(CustomPredicate {
            description: description.into(),
            check: Arc::new(check),
        })
    }

    pub fn description(&self) -> String {
        match self {
            Self::Status { code } => format!("status == {}", code),
            Self::StatusIn { codes } => format!("status in {:?}", codes),
            Self::StatusSuccess => "status is 2xx".to_string(),
            Self::Present { field } => format!("{} is present", field_name(field)),
            Self::Absent { field } => format!("{} is absent or null", field_name(field)),
            Self::Equals { field, value } => format!("{} == {}", field_name(field), value),
            Self::NonEmpty { field } => format!("{} is non-empty", field_name(field)),
            Self::InRange { field, min, max } => format!(
                "{} in [{}, {}]",
                field_name(field),
                min.map_or("-inf".to_string(), |m| m.to_string()),
                max.map_or("+inf".to_string(), |m| m.to_string())
            ),
            Self::LengthEquals { field, len } => format!("len({}) == {}", field_name(field), len),
            Self::LengthAtLeast { field, min } => format!("len({}) >= {}", field_name(field), min),
            Self::LengthAtMost { field, max } => format!("len({}) <= {}", field_name(field), max),
            Self::IsJson => "body is JSON".to_string(),
            Self::Custom(custom) => custom.description.clone(),
        }
    }

    /// `Ok(())` when the predicate holds, otherwise the failure description.
    pub fn evaluate(&self, response: &Response) -> Result<(), String> {
        let fail = |actual: String| Err(format!("expected {}, got {}", self.description(), actual));

        match self {
            Self::Status { code } => {
                if response.status == *code {
                    Ok(())
                } else {
                    fail(format!("status {}", response.status))
                }
            }
            Self::StatusIn { codes } => {
                if codes.contains(&response.status) {
                    Ok(())
                } else {
                    fail(format!("status {}", response.status))
                }
            }
            Self::StatusSuccess => {
                if response.is_success() {
                    Ok(())
                } else {
                    fail(format!("status {}", response.status))
                }
            }
            Self::Present { field } => match lookup(response, field) {
                Some(value) if !value.is_null() => Ok(()),
                other => fail(describe(other)),
            },
            Self::Absent { field } => match lookup(response, field) {
                None | Some(Value::Null) => Ok(()),
                Some(value) => fail(value.to_string()),
            },
            Self::Equals { field, value } => match lookup(response, field) {
                Some(actual) if values_equal(actual, value) => Ok(()),
                other => fail(describe(other)),
            },
            Self::NonEmpty { field } => match lookup(response, field) {
                Some(value) if is_truthy(value) => Ok(()),
                other => fail(describe(other)),
            },
            Self::InRange { field, min, max } => {
                let actual = lookup(response, field);
                match actual.and_then(Value::as_f64) {
                    Some(n) if min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m) => Ok(()),
                    _ => fail(describe(actual)),
                }
            }
            Self::LengthEquals { field, len } => check_length(response, field, |n| n == *len)
                .or_else(|actual| fail(actual)),
            Self::LengthAtLeast { field, min } => check_length(response, field, |n| n >= *min)
                .or_else(|actual| fail(actual)),
            Self::LengthAtMost { field, max } => check_length(response, field, |n| n <= *max)
                .or_else(|actual| fail(actual)),
            Self::IsJson => match &response.body {
                ResponseBody::Json(_) => Ok(()),
                ResponseBody::Text(text) => {
                    fail(format!("non-JSON body {:?}", truncate(text)))
                }
            },
            Self::Custom(custom) => {
                if (custom.check)(response) {
                    Ok(())
                } else {
                    fail(format!("status {} with body {}", response.status, body_preview(response)))
                }
            }
        }
    }
}

fn field_name(pointer: &str) -> String {
    if pointer.is_empty() {
        "body".to_string()
    } else {
        format!("`{}`", pointer)
    }
}

fn lookup<'a>(response: &'a Response, pointer: &str) -> Option<&'a Value> {
    response.pointer(pointer)
}

fn describe(value: Option<&Value>) -> String {
    match value {
        Some(v) => truncate(&v.to_string()),
        None => "nothing".to_string(),
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

fn body_preview(response: &Response) -> String {
    match &response.body {
        ResponseBody::Json(value) => truncate(&value.to_string()),
        ResponseBody::Text(text) => truncate(text),
    }
}

/// Numbers compare by value, so `100` equals `100.0`. Two integers compare
/// exactly, even beyond the range an `f64` represents without loss.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            if !a.is_f64() && !b.is_f64() {
                // One negative, one beyond i64.
                return false;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => a == b,
            }
        }
        _ => actual == expected,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn check_length(
    response: &Response,
    pointer: &str,
    holds: impl Fn(usize) -> bool,
) -> Result<(), String> {
    let len = match lookup(response, pointer) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        Some(Value::String(s)) => s.chars().count(),
        other => return Err(format!("no collection ({})", describe(other))),
    };

    if holds(len) {
        Ok(())
    } else {
        Err(format!("length {}", len))
    }
}
