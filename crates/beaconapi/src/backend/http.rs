//! HTTP backend on a blocking `ureq` agent.

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{ApiRequest, ApiResponse, Method};
use std::time::Duration;

const USER_AGENT: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

/// Sends requests to a Beacon endpoint.
///
/// Non-2xx statuses are returned as responses, not errors, so the client
/// can categorize them.
pub struct HttpBackend {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend for `endpoint`, sending `token` as a bearer token.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn prepare<B>(&self, builder: ureq::RequestBuilder<B>, timeout: Duration) -> ureq::RequestBuilder<B> {
        let builder = builder
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .config()
            .timeout_global(Some(timeout))
            .build();
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }
}

impl Backend for HttpBackend {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        log::trace!("{} {}", request.method, url);

        let sent = match request.method {
            Method::Get => self.prepare(self.agent.get(&url), request.timeout).call(),
            Method::Delete => self.prepare(self.agent.delete(&url), request.timeout).call(),
            Method::Post | Method::Put => {
                let builder = if request.method == Method::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                let builder = self.prepare(builder, request.timeout);
                match &request.body {
                    Some(body) => builder.send_json(body),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = sent?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(ApiResponse { status, body })
    }
}
