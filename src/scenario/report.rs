//! Scenario results and the run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::types::Response;

/// Lifecycle of one scenario: `Pending -> (Skipped | Running -> (Passed | Failed))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Pending,
    Running,
    Skipped,
    Passed,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Passed | Self::Failed)
    }

    pub fn can_become(&self, next: ScenarioState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Skipped)
                | (Self::Pending, Self::Running)
                | (Self::Running, Self::Passed)
                | (Self::Running, Self::Failed)
        )
    }

    /// The outcome for a terminal state.
    pub fn status(&self) -> Option<ScenarioStatus> {
        match self {
            Self::Skipped => Some(ScenarioStatus::Skip),
            Self::Passed => Some(ScenarioStatus::Pass),
            Self::Failed => Some(ScenarioStatus::Fail),
            Self::Pending | Self::Running => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScenarioStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub group: Option<String>,
    pub status: ScenarioStatus,
    /// Every failed predicate, not just the first.
    #[serde(default)]
    pub failures: Vec<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    /// Calls made for the primary request, retries included.
    pub attempts: u32,
    /// The primary response, kept for debugging.
    #[serde(default)]
    pub response: Option<Response>,
    pub duration_ms: u64,
}

impl ScenarioResult {
    pub fn skipped(name: &str, group: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            group: group.map(str::to_string),
            status: ScenarioStatus::Skip,
            failures: Vec::new(),
            skip_reason: Some(reason.into()),
            attempts: 0,
            response: None,
            duration_ms: 0,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{}::{}", group, self.name),
            None => self.name.clone(),
        }
    }
}

/// Ordered results of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioResult>) -> Self {
        Self {
            started_at,
            duration_ms,
            results,
        }
    }

    fn count(&self, status: ScenarioStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(ScenarioStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(ScenarioStatus::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(ScenarioStatus::Skip)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Non-zero iff something failed. Skips never affect it.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} scenarios: {} passed, {} failed, {} skipped in {}ms",
            self.results.len(),
            self.passed(),
            self.failed(),
            self.skipped(),
            self.duration_ms
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            write!(f, "{}  {}", result.status, result.qualified_name())?;
            if let Some(reason) = &result.skip_reason {
                write!(f, " ({})", reason)?;
            }
            writeln!(f)?;
            for failure in &result.failures {
                writeln!(f, "      - {}", failure)?;
            }
        }
        write!(f, "{}", self.summary())
    }
}
