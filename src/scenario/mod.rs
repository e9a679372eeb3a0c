//! # Scenario Runner
//!
//! Declarative scenarios, the fixture groups they share state through, and the
//! runner that executes them and reports Pass/Fail/Skip.
//!
//! ## Modules
//!
//! - [`predicate`] - Checks over a response
//! - [`fixture`] - Per-group session state
//! - [`runner`] - Grouping, setup, execution and result collection
//! - [`report`] - Results, summaries and the process exit code
//!
//! ## Suite files
//!
//! A suite is JSON. Scenarios run in declaration order within their group;
//! a group's setup runs once, before its first scenario that is not skipped.
//!
//! ```json
//! {
//!   "groups": [{
//!     "name": "shopping-list",
//!     "setup": [{
//!       "name": "connect user",
//!       "request": {"method": "POST", "path": "/users/connect",
//!                   "body": {"type": "json", "content": {"username": "test-user-{{$timestamp_ms}}"}}},
//!       "capture": {"username": "/username", "hash": "/hash"}
//!     }]
//!   }],
//!   "scenarios": [{
//!     "name": "add item",
//!     "group": "shopping-list",
//!     "request": {"method": "POST", "path": "/mealplanner/{{username}}/shopping-list/items",
//!                 "query": {"hash": "{{hash}}"},
//!                 "body": {"type": "json", "content": {"item": "10 oz flour"}}},
//!     "expect": [{"check": "status", "code": 200}, {"check": "equals", "field": "/name", "value": "flour"}],
//!     "capture": {"item_id": "/id"}
//!   }]
//! }
//! ```

pub mod fixture;
pub mod predicate;
pub mod report;
pub mod runner;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::client::{auth::AuthMode, template::RequestTemplate};
use crate::error::HarnessError;

pub use fixture::SessionFixture;
pub use predicate::Predicate;
pub use report::{RunReport, ScenarioResult, ScenarioStatus};
pub use runner::Runner;

fn default_step_expectations() -> Vec<Predicate> {
    vec![Predicate::StatusSuccess]
}

/// A side-effecting call made to prepare state, e.g. connecting a user.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupStep {
    pub name: String,
    pub request: RequestTemplate,
    #[serde(default)]
    pub auth: AuthMode,
    /// Must all hold for the step to count as done. Defaults to a 2xx status.
    #[serde(default = "default_step_expectations")]
    pub expect: Vec<Predicate>,
    /// Variable name -> JSON pointer into the step's response.
    #[serde(default)]
    pub capture: BTreeMap<String, String>,
}

impl SetupStep {
    pub fn new(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            name: name.into(),
            request,
            auth: AuthMode::Configured,
            expect: default_step_expectations(),
            capture: BTreeMap::new(),
        }
    }

    pub fn capture(mut self, name: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.capture.insert(name.into(), pointer.into());
        self
    }

    pub fn expect(mut self, predicates: Vec<Predicate>) -> Self {
        self.expect = predicates;
        self
    }
}

/// Scenarios that share a [`SessionFixture`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureGroup {
    pub name: String,
    /// Run once, before the group's first scenario that is not skipped.
    #[serde(default)]
    pub setup: Vec<SetupStep>,
    /// Run once after the group's last scenario, if setup ran.
    #[serde(default)]
    pub teardown: Vec<SetupStep>,
}

impl FixtureGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn setup(mut self, step: SetupStep) -> Self {
        self.setup.push(step);
        self
    }

    pub fn teardown(mut self, step: SetupStep) -> Self {
        self.teardown.push(step);
        self
    }

    pub fn requires_credential(&self) -> bool {
        self.setup.iter().any(|step| step.auth.requires_credential())
    }
}

/// One test case: a request and what its response must satisfy.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub auth: AuthMode,
    /// Calls made just before the request; captures stay local to this scenario.
    #[serde(default)]
    pub prelude: Vec<SetupStep>,
    pub request: RequestTemplate,
    #[serde(default)]
    pub expect: Vec<Predicate>,
    /// Variable name -> JSON pointer, published to the group's fixture.
    #[serde(default)]
    pub capture: BTreeMap<String, String>,
    /// Extra attempts after a transport failure. Never applied to responses.
    #[serde(default)]
    pub retries: u32,
}

impl Scenario {
    pub fn new(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            name: name.into(),
            group: None,
            auth: AuthMode::Configured,
            prelude: Vec::new(),
            request,
            expect: Vec::new(),
            capture: BTreeMap::new(),
            retries: 0,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn prelude(mut self, step: SetupStep) -> Self {
        self.prelude.push(step);
        self
    }

    pub fn expect(mut self, predicate: Predicate) -> Self {
        self.expect.push(predicate);
        self
    }

    pub fn capture(mut self, name: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.capture.insert(name.into(), pointer.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Whether running this scenario needs the configured credential, given
    /// the group it belongs to.
    pub fn requires_credential(&self, group: Option<&FixtureGroup>) -> bool {
        self.auth.requires_credential()
            || self.prelude.iter().any(|step| step.auth.requires_credential())
            || group.is_some_and(FixtureGroup::requires_credential)
    }
}

/// Fixture groups and the ordered scenarios that use them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub groups: Vec<FixtureGroup>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: FixtureGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, HarnessError> {
        let suite: Self = serde_json::from_str(raw)
            .map_err(|e| HarnessError::Suite(format!("invalid suite: {}", e)))?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Suite(format!("cannot read suite {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            HarnessError::Suite(msg) => HarnessError::Suite(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Group names must be unique. Scenarios may name a group that has no
    /// definition; it then has no setup.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(HarnessError::Suite(format!(
                    "fixture group `{}` is defined more than once",
                    group.name
                )));
            }
        }
        Ok(())
    }

    pub fn find_group(&self, name: &str) -> Option<&FixtureGroup> {
        self.groups.iter().find(|group| group.name == name)
    }
}
