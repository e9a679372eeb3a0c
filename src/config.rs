//! Process-wide configuration, read once at startup.

use std::env;
use std::time::Duration;

use crate::client::auth::Credential;
use crate::error::HarnessError;

pub const DEFAULT_BASE_URL: &str = "https://api.spoonacular.com";
pub const DEFAULT_AUTH_PARAM: &str = "apiKey";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const BASE_URL_VAR: &str = "CONFORMANCE_BASE_URL";
pub const API_KEY_VAR: &str = "CONFORMANCE_API_KEY";
pub const AUTH_PARAM_VAR: &str = "CONFORMANCE_AUTH_PARAM";
pub const TIMEOUT_VAR: &str = "CONFORMANCE_TIMEOUT_SECS";

/// Immutable run configuration.
///
/// A missing credential does not make the configuration invalid. It is kept
/// as a fault so the runner can skip the scenarios that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    /// Name of the query parameter that carries the credential.
    pub auth_param: String,
    /// Upper bound on a single remote call.
    pub timeout: Duration,
    credential: Option<Credential>,
    credential_fault: String,
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_param: DEFAULT_AUTH_PARAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credential: None,
            credential_fault: "no API credential configured".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, HarnessError> {
        let base_url = env::var(BASE_URL_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let auth_param =
            env::var(AUTH_PARAM_VAR).unwrap_or_else(|_| DEFAULT_AUTH_PARAM.to_string());

        let timeout = match env::var(TIMEOUT_VAR) {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    HarnessError::ConfigurationFault(format!(
                        "{} must be a whole number of seconds, got {:?}: {}",
                        TIMEOUT_VAR, raw, e
                    ))
                })?,
            Err(_) => DEFAULT_TIMEOUT,
        };

        let mut config = Self::new(base_url)
            .with_auth_param(auth_param)
            .with_timeout(timeout);

        match Credential::from_env(API_KEY_VAR) {
            Ok(credential) => {
                tracing::debug!("Using API credential {}", credential.preview());
                config.credential = Some(credential);
            }
            Err(e) => {
                tracing::warn!("{}", e);
                config.credential_fault = match e {
                    HarnessError::ConfigurationFault(reason) => reason,
                    other => other.to_string(),
                };
            }
        }

        Ok(config)
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_auth_param(mut self, auth_param: impl Into<String>) -> Self {
        self.auth_param = auth_param.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The credential, or the configuration fault explaining its absence.
    pub fn require_credential(&self) -> Result<&Credential, HarnessError> {
        self.credential
            .as_ref()
            .ok_or_else(|| HarnessError::ConfigurationFault(self.credential_fault.clone()))
    }
}
