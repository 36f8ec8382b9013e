//! # beaconapi
//!
//! Blocking client for the Beacon reliability platform REST API.
//!
//! Objects live in flat collections (`teams`, `services`, `slas`, ...) and
//! are addressed by numeric id:
//!
//! | call   | request                      |
//! |--------|------------------------------|
//! | create | `POST /<collection>`         |
//! | get    | `GET /<collection>/<id>`     |
//! | update | `PUT /<collection>/<id>`     |
//! | delete | `DELETE /<collection>/<id>`  |
//!
//! ## Example
//!
//! ```
//! use beaconapi::{CallOptions, Client, ClientConfig, MockBackend};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! let client = Client::with_backend(Arc::new(MockBackend::new()), ClientConfig::new("mock://"));
//! let opts = CallOptions::new();
//!
//! let team: Value = client.create(&opts, "teams", &json!({"name": "Platform"})).unwrap();
//! let id = team["id"].as_i64().unwrap();
//! let again: Value = client.get(&opts, "teams", id).unwrap();
//! assert_eq!(again["name"], "Platform");
//! ```

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::MockBackend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{ApiRequest, ApiResponse, CallOptions, ClientConfig, Method, RetryConfig};

use backend::Backend;
use backend::http::HttpBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// High-level client for Beacon API calls.
///
/// Every call honours the [`CallOptions`] deadline and cancel flag, and
/// retries transient failures according to the configured [`RetryConfig`].
/// Creates are only retried on rate limiting, since a failed POST may still
/// have created the object.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    config: ClientConfig,
}

impl Client {
    /// Create a client that talks HTTP to `config.endpoint`.
    pub fn new(config: ClientConfig) -> Self {
        let backend = HttpBackend::new(config.endpoint.clone(), config.token.clone());
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    /// Create a client with a custom backend (for testing).
    pub fn with_backend(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `POST /<collection>`
    pub fn create<B, T>(&self, opts: &CallOptions<'_>, collection: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = to_body(body)?;
        let response = self.call(opts, Method::Post, format!("/{collection}"), Some(body))?;
        decode(&response.body)
    }

    /// `GET /<collection>/<id>`
    pub fn get<T: DeserializeOwned>(&self, opts: &CallOptions<'_>, collection: &str, id: i64) -> Result<T> {
        let response = self.call(opts, Method::Get, format!("/{collection}/{id}"), None)?;
        decode(&response.body)
    }

    /// `PUT /<collection>/<id>`
    pub fn update<B, T>(
        &self,
        opts: &CallOptions<'_>,
        collection: &str,
        id: i64,
        body: &B,
    ) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = to_body(body)?;
        let response = self.call(opts, Method::Put, format!("/{collection}/{id}"), Some(body))?;
        decode(&response.body)
    }

    /// `DELETE /<collection>/<id>`
    pub fn delete(&self, opts: &CallOptions<'_>, collection: &str, id: i64) -> Result<()> {
        self.call(opts, Method::Delete, format!("/{collection}/{id}"), None)?;
        Ok(())
    }

    fn call(
        &self,
        opts: &CallOptions<'_>,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        let should_retry = |err: &Error| match method {
            Method::Post => err.category() == ErrorCategory::RateLimited,
            _ => err.is_retryable(),
        };

        retry::with_retry(&self.config.retry, opts, should_retry, || {
            let request = ApiRequest {
                method,
                path: path.clone(),
                body: body.clone(),
                timeout: opts.bound(self.config.timeout),
            };
            let response = self.backend.send(&request)?;
            log::debug!("{} {} -> {}", method, path, response.status);
            if response.is_success() {
                Ok(response)
            } else {
                Err(Error::from_response(response.status, &response.body))
            }
        })
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| Error::Config(format!("cannot encode request: {e}")))
}

/// Decode a success body. When the typed decode fails, the object id is
/// still recovered from the raw JSON if present.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| Error::Decode {
        id: None,
        message: e.to_string(),
    })?;
    T::deserialize(&value).map_err(|e| Error::Decode {
        id: value.get("id").and_then(serde_json::Value::as_i64),
        message: e.to_string(),
    })
}
