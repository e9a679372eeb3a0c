//! Session fixtures: ephemeral state shared by one fixture group.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::template::Variables;
use crate::client::types::Response;
use crate::error::HarnessError;

/// Named values produced by a group's setup and by scenario captures.
///
/// Owned by exactly one group for the group's lifetime. Values are only ever
/// added; a later capture under an existing name replaces the old value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFixture {
    group: String,
    vars: Variables,
}

impl SessionFixture {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            vars: Variables::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn extend(&mut self, vars: Variables) {
        self.vars.extend(vars);
    }
}

/// Reads each `name -> pointer` capture out of `response`.
///
/// Resolves what it can; the first pointer that finds nothing (or null) is
/// returned as the error alongside the values that did resolve.
pub fn capture(
    response: &Response,
    captures: &BTreeMap<String, String>,
) -> (Variables, Option<HarnessError>) {
    let mut found = Variables::new();
    let mut missing = None;

    for (name, pointer) in captures {
        match response.pointer(pointer) {
            Some(value) if !value.is_null() => {
                found.insert(name.clone(), value.clone());
            }
            _ => {
                missing.get_or_insert_with(|| HarnessError::Capture {
                    name: name.clone(),
                    pointer: pointer.clone(),
                });
            }
        }
    }

    (found, missing)
}
