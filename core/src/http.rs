//! HTTP transport types exchanged with the `Transport`.
//!
//! # Design
//! Requests and responses are described as plain data. `client` builds an
//! `HttpRequest` from a `RequestConfig`, a `Transport` executes it and hands
//! back an `HttpResponse`, and `client` interprets that response. Keeping the
//! exchange as owned data keeps the build and parse halves deterministic and
//! lets tests swap in a fake transport.
//!
//! Timeout, cellular access and priority ride along as hints; honoring them
//! is up to the transport.

use std::time::Duration;

use crate::types::{RequestMethod, RequestPriority};

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: RequestMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub allows_cellular_access: bool,
    pub priority: RequestPriority,
}

impl HttpRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Split off the body, keeping status and headers.
    pub fn into_parts(self) -> (ResponseHead, Vec<u8>) {
        (
            ResponseHead {
                status: self.status,
                headers: self.headers,
            },
            self.body,
        )
    }
}

/// Status and headers of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
