//! App-oriented HTTP request abstraction.
//!
//! # Overview
//! A request is a type implementing `RequestConfig`: method, serializers,
//! headers, credentials, scheme, host, path, parameters, multipart builder,
//! timeout, cellular flag and priority, plus two required validators.
//! `Request` starts it against a `Session`, runs the `Transport` on a worker
//! thread and delivers the outcome to a completion block and delegate on the
//! caller's `MainContext`, exactly once per start.
//!
//! # Design
//! - `client` is the deterministic half: `build_request` produces an
//!   `HttpRequest`, `parse_response` turns an `HttpResponse` into an
//!   `Outcome`. No I/O happens there.
//! - `Transport` is the I/O seam; `UreqTransport` is the stock one.
//! - Completions are marshaled through `ContextHandle`, so callbacks run on
//!   whichever thread drains the `MainContext`.
//! - There is no retry, caching, queueing or priority scheduling; every
//!   failure ends the attempt and is left to the caller.

pub mod client;
pub mod config;
pub mod context;
pub mod encoding;
pub mod error;
pub mod http;
pub mod multipart;
pub mod outcome;
pub mod request;
pub mod session;
pub mod task;
pub mod transport;
pub mod types;

pub use config::{ConstructingBlock, RequestConfig, DEFAULT_TIMEOUT};
pub use context::{ContextHandle, MainContext};
pub use encoding::{resolve_encoding, string_encoding, TextEncoding};
pub use error::RequestError;
pub use http::{HttpRequest, HttpResponse, ResponseHead};
pub use multipart::MultipartForm;
pub use outcome::{Outcome, ResponseObject, XmlElement};
pub use request::{CompletionBlock, Request, RequestDelegate};
pub use session::Session;
pub use task::{RequestTask, TaskState};
pub use transport::{Transport, TransportConfig, UreqTransport, DEFAULT_MAX_BODY_BYTES};
pub use types::{
    Credentials, RequestMethod, RequestPriority, RequestSerializerType, ResponseSerializerType,
    SchemeProtocol,
};
