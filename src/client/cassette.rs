//! Recorded responses ("cassettes") standing in for the remote service.
//!
//! Assertions on third-party behavior (exact classification labels, 400 vs
//! 500 for malformed input) are only as stable as the service. Recording a
//! live run once and replaying it turns those into golden fixtures.
//!
//! The configured credential is never written to a cassette. Requests that
//! carried it are stored as [`RecordedAuth::Configured`]; literal override
//! values such as an empty or bad key are stored as they were sent.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{
    auth::Credential,
    client::Executor,
    types::{Method, RequestSpec, Response},
};
use crate::error::HarnessError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedAuth {
    Configured,
    Omitted,
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub auth: RecordedAuth,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl RecordedRequest {
    pub fn capture(
        spec: &RequestSpec,
        credential: Option<&Credential>,
        configured: Option<&Credential>,
    ) -> Self {
        let auth = match credential {
            None => RecordedAuth::Omitted,
            Some(c) if Some(c) == configured => RecordedAuth::Configured,
            Some(c) => RecordedAuth::Literal(c.token().to_string()),
        };

        Self {
            method: spec.method(),
            path: spec.path().to_string(),
            query: spec
                .query()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_query_string()))
                .collect(),
            auth,
            content_type: spec.body().content_type().map(str::to_string),
            body: spec.body().canonical_text(),
        }
    }

    /// Same method, path, query and auth; the body may differ.
    pub fn same_target(&self, other: &Self) -> bool {
        self.method == other.method
            && self.path == other.path
            && self.query == other.query
            && self.auth == other.auth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub request: RecordedRequest,
    pub response: Response,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cassette {
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Suite(format!("cannot read cassette {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            HarnessError::Suite(format!("invalid cassette {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| HarnessError::Suite(format!("cannot serialize cassette: {}", e)))?;
        std::fs::write(path, raw).map_err(|e| {
            HarnessError::Suite(format!("cannot write cassette {}: {}", path.display(), e))
        })
    }
}

/// Wraps a live executor and records every exchange that produced a response.
pub struct RecordingExecutor<E> {
    inner: E,
    configured: Option<Credential>,
    interactions: Mutex<Vec<Interaction>>,
}

impl<E: Executor> RecordingExecutor<E> {
    pub fn new(inner: E, configured: Option<Credential>) -> Self {
        Self {
            inner,
            configured,
            interactions: Mutex::new(Vec::new()),
        }
    }

    pub fn cassette(&self) -> Cassette {
        let interactions = self
            .interactions
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        Cassette { interactions }
    }
}

#[async_trait]
impl<E: Executor> Executor for RecordingExecutor<E> {
    async fn execute(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<Response, HarnessError> {
        let response = self.inner.execute(spec, credential).await?;

        let interaction = Interaction {
            request: RecordedRequest::capture(spec, credential, self.configured.as_ref()),
            response: response.clone(),
        };
        match self.interactions.lock() {
            Ok(mut recorded) => recorded.push(interaction),
            Err(poisoned) => poisoned.into_inner().push(interaction),
        }

        Ok(response)
    }
}

/// Answers requests from a cassette without touching the network.
///
/// Each recorded interaction answers at most one request, in recording order,
/// so repeating an identical request replays the next recorded response. An
/// exact match wins over one that differs only in its body.
pub struct ReplayExecutor {
    cassette: Cassette,
    configured: Option<Credential>,
    consumed: Mutex<Vec<bool>>,
}

impl ReplayExecutor {
    pub fn new(cassette: Cassette, configured: Option<Credential>) -> Self {
        let consumed = Mutex::new(vec![false; cassette.interactions.len()]);
        Self {
            cassette,
            configured,
            consumed,
        }
    }

    pub fn remaining(&self) -> usize {
        match self.consumed.lock() {
            Ok(consumed) => consumed.iter().filter(|used| !**used).count(),
            Err(poisoned) => poisoned.into_inner().iter().filter(|used| !**used).count(),
        }
    }
}

#[async_trait]
impl Executor for ReplayExecutor {
    async fn execute(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<Response, HarnessError> {
        let wanted = RecordedRequest::capture(spec, credential, self.configured.as_ref());

        let mut consumed = match self.consumed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let unused = |i: &usize| !consumed[*i];
        let interactions = &self.cassette.interactions;
        // Bodies may embed per-run values such as timestamps, so fall back to
        // matching everything but the body.
        let found = interactions
            .iter()
            .enumerate()
            .find(|(i, interaction)| unused(i) && interaction.request == wanted)
            .or_else(|| {
                interactions
                    .iter()
                    .enumerate()
                    .find(|(i, interaction)| unused(i) && interaction.request.same_target(&wanted))
            });

        match found {
            Some((i, interaction)) => {
                consumed[i] = true;
                tracing::debug!("Replaying recorded {} -> {}", spec, interaction.response.status);
                Ok(interaction.response.clone())
            }
            None => Err(HarnessError::transport(format!(
                "no recorded interaction left for {}",
                spec
            ))),
        }
    }
}
