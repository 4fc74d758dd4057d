//! Configuration value types for a request.
//!
//! # Design
//! Each enum mirrors one knob of `RequestConfig`. They are plain `Copy`
//! values with serde support so they can be read from configuration files
//! and cross the FFI boundary as integers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Head,
    Put,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Head => "HEAD",
            RequestMethod::Put => "PUT",
        }
    }

    /// GET and HEAD carry their parameters in the query string.
    pub fn encodes_params_in_query(&self) -> bool {
        matches!(self, RequestMethod::Get | RequestMethod::Head)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request parameters are encoded into the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSerializerType {
    /// `application/x-www-form-urlencoded`.
    Http,
    /// `application/json`.
    Json,
}

/// How the response body is decoded into `response_object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSerializerType {
    /// Raw bytes, untouched.
    Http,
    /// Parsed as a JSON value.
    Json,
    /// Parsed as an XML element tree.
    Xml,
}

/// URL scheme used when building the full request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeProtocol {
    Http,
    Https,
}

impl SchemeProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeProtocol::Http => "http",
            SchemeProtocol::Https => "https",
        }
    }
}

/// Priority hint handed to the transport. Nothing in this crate schedules
/// by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    Low = -1,
    #[default]
    Default = 0,
    High = 1,
}

impl RequestPriority {
    pub fn value(self) -> i8 {
        self as i8
    }
}

/// Username and password sent as a `Basic` authorization header.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
