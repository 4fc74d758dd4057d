//! HTTP server used by the integration tests.
//!
//! - `ANY /echo` reflects method, path, query, headers and body as JSON.
//! - `GET /status/{code}` answers with that status.
//! - `GET /delay/{ms}` answers after sleeping.
//! - `GET /xml` serves a small XML document.
//! - `GET /latin1` serves ISO-8859-1 text.
//! - `GET /gbk` serves GBK text.
//! - `GET /bytes/{n}` serves `n` bytes of `application/octet-stream`, up to
//!   `MAX_BYTES`.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Body returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub const XML_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config version="3"><name>reqkit</name><feature enabled="true"/></config>"#;

/// "café" in ISO-8859-1.
pub const LATIN1_BODY: [u8; 4] = [0x63, 0x61, 0x66, 0xE9];

/// "中文" in GBK.
pub const GBK_BODY: [u8; 4] = [0xD6, 0xD0, 0xCE, 0xC4];

/// Largest body `/bytes/{n}` will produce.
pub const MAX_BYTES: usize = 64 * 1024 * 1024;

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/delay/{ms}", get(delay))
        .route("/xml", get(xml))
        .route("/latin1", get(latin1))
        .route("/gbk", get(gbk))
        .route("/bytes/{n}", get(bytes))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(serde_json::json!({ "status": status.as_u16() })))
}

async fn delay(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "delayed_ms": ms }))
}

async fn xml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], XML_DOCUMENT)
}

async fn latin1() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=iso-8859-1")],
        LATIN1_BODY.to_vec(),
    )
}

async fn gbk() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=GBK")],
        GBK_BODY.to_vec(),
    )
}

async fn bytes(Path(n): Path<usize>) -> impl IntoResponse {
    if n > MAX_BYTES {
        return (StatusCode::PAYLOAD_TOO_LARGE, Vec::new()).into_response();
    }
    let body: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_to_json() {
        let echo = Echo {
            method: "GET".to_string(),
            path: "/echo".to_string(),
            query: None,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["query"], serde_json::Value::Null);
    }
}
