//! Error types for the conformance harness.
//!
//! None of these abort a run. The runner turns each one into a Skip or a
//! Fail for the scenario it happened in.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The environment is not configured (e.g. no credential). Scenarios that
    /// depend on the missing value are skipped, not failed.
    #[error("configuration fault: {0}")]
    ConfigurationFault(String),

    /// The remote call never produced a response.
    #[error("transport failure{}: {message}", timeout_suffix(.timed_out))]
    TransportFailure { message: String, timed_out: bool },

    /// A request could not be built from its description.
    #[error("malformed request input: {0}")]
    MalformedRequestInput(String),

    /// A capture pointer did not resolve against the response it was read from.
    #[error("capture `{name}` failed: nothing at `{pointer}`")]
    Capture { name: String, pointer: String },

    /// A suite or cassette file could not be read or parsed.
    #[error("suite error: {0}")]
    Suite(String),
}

impl HarnessError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}

fn timeout_suffix(timed_out: &bool) -> &'static str {
    if *timed_out {
        " (timed out)"
    } else {
        ""
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
