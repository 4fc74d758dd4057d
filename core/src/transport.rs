//! The transport layer that performs the actual HTTP round-trip.
//!
//! # Design
//! `Transport` is the seam between request preparation and network I/O.
//! `UreqTransport` is the stock implementation; tests and embedders can
//! supply their own. Connection reuse, TLS and DNS all belong to the
//! transport. Non-2xx statuses come back as data so the request's
//! `status_code_validator` decides what counts as success.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument, trace};

use crate::error::RequestError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::RequestMethod;

/// Executes `HttpRequest`s. Calls block the current thread; `Request` runs
/// them on a worker thread.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError>;
}

/// Default cap on a response body read into memory.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Settings shared by every request sent through a `UreqTransport`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub user_agent: String,
    pub max_redirects: u32,
    /// Larger bodies fail with `RequestError::Network`.
    pub max_body_bytes: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("reqkit/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl TransportConfig {
    /// Defaults overridden by `REQKIT_USER_AGENT`, `REQKIT_MAX_REDIRECTS`
    /// and `REQKIT_MAX_BODY_BYTES`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(user_agent) = std::env::var("REQKIT_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(max) = std::env::var("REQKIT_MAX_REDIRECTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_redirects = max;
        }
        if let Some(max) = std::env::var("REQKIT_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_body_bytes = max;
        }
        config
    }
}

/// `Transport` backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn agent(&self, timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .max_redirects(self.config.max_redirects)
            .user_agent(self.config.user_agent.as_str())
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        trace!(
            priority = request.priority.value(),
            allows_cellular_access = request.allows_cellular_access,
            "transport hints"
        );
        let agent = self.agent(request.timeout);
        let url = request.url.as_str();

        let result = match request.method {
            RequestMethod::Get => with_headers(agent.get(url), &request.headers).call(),
            RequestMethod::Head => with_headers(agent.head(url), &request.headers).call(),
            RequestMethod::Post => {
                let builder = with_headers(agent.post(url), &request.headers);
                match &request.body {
                    Some(body) => builder.send(body.as_slice()),
                    None => builder.send_empty(),
                }
            }
            RequestMethod::Put => {
                let builder = with_headers(agent.put(url), &request.headers);
                match &request.body {
                    Some(body) => builder.send(body.as_slice()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(map_ureq_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = if request.method == RequestMethod::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(self.config.max_body_bytes)
                .read_to_vec()
                .map_err(map_ureq_error)?
        };

        debug!(status, body_len = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_ureq_error(err: ureq::Error) -> RequestError {
    match err {
        ureq::Error::Timeout(_) => RequestError::Timeout,
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => RequestError::Timeout,
        other => RequestError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert!(config.user_agent.starts_with("reqkit/"));
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TransportConfig = serde_json::from_str(r#"{"user_agent":"app/2.0"}"#).unwrap();
        assert_eq!(config.user_agent, "app/2.0");
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);

        let config: TransportConfig = serde_json::from_str(r#"{"max_body_bytes":1024}"#).unwrap();
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn unreachable_host_is_network_error() {
        let transport = UreqTransport::default();
        let request = HttpRequest {
            method: RequestMethod::Get,
            url: "http://127.0.0.1:1/unreachable".to_string(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(2),
            allows_cellular_access: true,
            priority: Default::default(),
        };
        let err = transport.execute(&request).unwrap_err();
        assert!(matches!(err, RequestError::Network(_) | RequestError::Timeout));
    }
}
