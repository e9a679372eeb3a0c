//! Credential handling for the remote API.
//!
//! The API authenticates with a token passed as a query parameter rather than
//! an `Authorization` header. The token is read once at startup and never
//! changes for the rest of the run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// # API Credential
///
/// An opaque authentication token. `Debug` and `Display` only ever show a
/// short preview so the full key cannot end up in logs or reports.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Reads the credential from `var`. A missing or empty variable is a
    /// configuration fault.
    pub fn from_env(var: &str) -> Result<Self, HarnessError> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token)),
            _ => Err(HarnessError::ConfigurationFault(format!(
                "{} is not set. Export the variable with a valid API key.",
                var
            ))),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn preview(&self) -> String {
        let shown: String = self.token.chars().take(4).collect();
        format!("{}...", shown)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.preview()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

/// How a request carries the credential.
///
/// Negative-path scenarios need to send no key, an empty key or a bad key,
/// so the choice is part of the scenario rather than the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Attach the configured credential. Requires one to be configured.
    #[default]
    Configured,
    /// Send no auth parameter at all.
    Omit,
    /// Send this literal value instead of the configured credential.
    Override(String),
}

impl AuthMode {
    pub fn requires_credential(&self) -> bool {
        matches!(self, Self::Configured)
    }

    /// Picks the credential to attach. `Configured` with nothing configured
    /// is a configuration fault.
    pub fn resolve<'a>(
        &self,
        configured: Option<&'a Credential>,
    ) -> Result<Option<std::borrow::Cow<'a, Credential>>, HarnessError> {
        use std::borrow::Cow;

        match self {
            Self::Configured => configured
                .map(|c| Some(Cow::Borrowed(c)))
                .ok_or_else(|| {
                    HarnessError::ConfigurationFault("no API credential configured".to_string())
                }),
            Self::Omit => Ok(None),
            Self::Override(token) => Ok(Some(Cow::Owned(Credential::new(token.clone())))),
        }
    }
}
