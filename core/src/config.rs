//! Per-request configuration.
//!
//! # Design
//! A concrete request is a type implementing `RequestConfig`. Every accessor
//! has a default except the host and the two validators: those have no sane
//! baseline and must be supplied by the implementor. Accessors are
//! independent of one another and nothing validates combinations.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::RequestError;
use crate::multipart::MultipartForm;
use crate::types::{
    Credentials, RequestMethod, RequestPriority, RequestSerializerType, ResponseSerializerType,
    SchemeProtocol,
};

/// Default for `RequestConfig::request_timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Callback that appends parts to a multipart body.
pub type ConstructingBlock = Box<dyn FnOnce(&mut MultipartForm) + Send>;

/// Configuration surface of a request.
///
/// ```
/// use reqkit_core::{RequestConfig, RequestError, RequestMethod};
///
/// struct Login;
///
/// impl RequestConfig for Login {
///     fn host(&self) -> String {
///         "api.example.com".to_string()
///     }
///     fn path(&self) -> String {
///         "/api/v1/login".to_string()
///     }
///     fn request_method(&self) -> RequestMethod {
///         RequestMethod::Post
///     }
///     fn status_code_validator(&self, status: u16) -> bool {
///         status == 200
///     }
///     fn network_bad_validator(&self, error: &RequestError) -> bool {
///         matches!(error, RequestError::Timeout)
///     }
/// }
///
/// assert_eq!(Login.full_url().unwrap().as_str(), "https://api.example.com/api/v1/login");
/// ```
pub trait RequestConfig: Send + Sync + 'static {
    fn request_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    fn allows_cellular_access(&self) -> bool {
        true
    }

    fn request_method(&self) -> RequestMethod {
        RequestMethod::Get
    }

    fn request_serializer_type(&self) -> RequestSerializerType {
        RequestSerializerType::Http
    }

    fn response_serializer_type(&self) -> ResponseSerializerType {
        ResponseSerializerType::Json
    }

    /// Credentials sent as `Authorization: Basic ...`.
    fn authorization(&self) -> Option<Credentials> {
        None
    }

    /// Extra request headers.
    fn header_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn scheme(&self) -> SchemeProtocol {
        SchemeProtocol::Https
    }

    /// Host name, optionally with a port (`example.com`, `127.0.0.1:8080`).
    fn host(&self) -> String;

    /// Interface path (`/api/v1/login`).
    fn path(&self) -> String {
        String::new()
    }

    /// Full request URL. Joins scheme, host and path by default.
    fn full_url(&self) -> Result<Url, RequestError> {
        let host = self.host();
        let host = host.trim_end_matches('/');
        if host.is_empty() {
            return Err(RequestError::InvalidUrl("empty host".to_string()));
        }
        let path = self.path();
        let separator = if path.is_empty() || path.starts_with('/') { "" } else { "/" };
        let raw = format!("{}://{host}{separator}{path}", self.scheme().as_str());
        Url::parse(&raw).map_err(|e| RequestError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Request parameters. Must be a JSON object for form and query
    /// encoding; any JSON value is accepted by the JSON serializer.
    fn params(&self) -> Option<Value> {
        None
    }

    /// Multipart builder. When present, POST and PUT bodies are sent as
    /// `multipart/form-data`.
    fn constructing_body_block(&self) -> Option<ConstructingBlock> {
        None
    }

    fn priority(&self) -> RequestPriority {
        RequestPriority::Default
    }

    /// Whether `status` counts as a successful response.
    fn status_code_validator(&self, status: u16) -> bool;

    /// Whether `error` indicates poor connectivity.
    fn network_bad_validator(&self, error: &RequestError) -> bool;
}
