use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};

use crate::client::{
    auth::Credential,
    types::*,
};
use crate::config::Config;
use crate::error::HarnessError;

/// Sends one request and returns the normalized response.
///
/// Implementations never retry and never turn a non-2xx status into an error.
/// The only error they return is [`HarnessError::TransportFailure`].
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<Response, HarnessError>;
}

/// Live executor backed by `reqwest`.
pub struct ApiClient {
    base_url: String,
    auth_param: String,
    timeout: Duration,
    client: Client,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            auth_param: config.auth_param.clone(),
            timeout: config.timeout,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_param(&self) -> &str {
        &self.auth_param
    }

    /// Full URL for `spec`, with the credential appended when there is one.
    ///
    /// An attached credential always wins: a query parameter with the same
    /// name as the auth parameter is dropped.
    fn build_url(&self, spec: &RequestSpec, credential: Option<&Credential>) -> String {
        let mut url = format!("{}{}", self.base_url, spec.path());

        let mut params = vec![];
        if let Some(credential) = credential {
            params.push(format!(
                "{}={}",
                urlencoding::encode(&self.auth_param),
                urlencoding::encode(credential.token())
            ));
        }
        for (name, value) in spec.query() {
            if credential.is_some() && *name == self.auth_param {
                tracing::warn!(
                    "Ignoring query parameter `{}` on {}: the credential is attached under that name",
                    name,
                    spec
                );
                continue;
            }
            params.push(format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(&value.to_query_string())
            ));
        }

        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// The URL as it may be logged: the credential is replaced by a preview.
    fn loggable_url(&self, spec: &RequestSpec, credential: Option<&Credential>) -> String {
        let redacted = credential.map(|c| Credential::new(c.preview()));
        self.build_url(spec, redacted.as_ref())
    }

    fn map_error(&self, spec: &RequestSpec, error: reqwest::Error) -> HarnessError {
        let timed_out = error.is_timeout();
        // The URL carries the credential.
        let error = error.without_url();
        tracing::error!("Network error during {}: {}", spec, error);

        let message = if timed_out {
            format!(
                "{} did not complete within {}s: {}",
                spec,
                self.timeout.as_secs_f64(),
                error
            )
        } else {
            format!("Failed to reach {} for {}: {}", self.base_url, spec, error)
        };

        HarnessError::TransportFailure { message, timed_out }
    }
}

#[async_trait]
impl Executor for ApiClient {
    async fn execute(
        &self,
        spec: &RequestSpec,
        credential: Option<&Credential>,
    ) -> Result<Response, HarnessError> {
        let url = self.build_url(spec, credential);
        tracing::debug!("Making request: {} {}", spec.method(), self.loggable_url(spec, credential));

        let request = match spec.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        }
        .timeout(self.timeout);

        let request = match spec.body() {
            Body::None => request,
            Body::Json(value) => request.json(value),
            Body::Form(fields) => request.form(fields),
            Body::Raw {
                content,
                content_type,
            } => request
                .header(CONTENT_TYPE, content_type.as_str())
                .body(content.clone()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.map_error(spec, e))?;

        let status = response.status();
        tracing::debug!("{} response status: {}", spec, status);

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_error(spec, e))?;

        Ok(Response {
            status: status.as_u16(),
            body: ResponseBody::parse(text),
            headers,
        })
    }
}
