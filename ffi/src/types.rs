//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each enum mirrors a core enum with explicit discriminants. Caller-owned
//! input (`FfiRequestConfig`, `FfiHeader`) is copied into owned Rust values
//! by `FfiConfig::from_raw`, so nothing borrowed from C outlives the call
//! that passed it. Output (`FfiOutcome`) is borrowed by the callback and
//! backed by an `OutcomeView` that owns the C strings.

use std::collections::BTreeMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;
use std::time::Duration;

use reqkit_core::{
    Credentials, MainContext, Outcome, Request, RequestConfig, RequestError, RequestMethod,
    RequestPriority, RequestSerializerType, ResponseSerializerType, SchemeProtocol, Session,
    DEFAULT_TIMEOUT,
};
use serde_json::Value;

/// Opaque handle owning the main context and the session bound to it.
/// Completions run on whichever thread calls `reqkit_context_drain`.
pub struct FfiContext {
    pub(crate) context: MainContext,
    pub(crate) session: Session,
}

/// Opaque handle to a request created by `reqkit_request_new`.
pub struct FfiRequest {
    pub(crate) inner: Request<FfiConfig>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiRequestMethod {
    Get = 0,
    Post = 1,
    Head = 2,
    Put = 3,
}

impl From<FfiRequestMethod> for RequestMethod {
    fn from(m: FfiRequestMethod) -> Self {
        match m {
            FfiRequestMethod::Get => RequestMethod::Get,
            FfiRequestMethod::Post => RequestMethod::Post,
            FfiRequestMethod::Head => RequestMethod::Head,
            FfiRequestMethod::Put => RequestMethod::Put,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiRequestSerializer {
    Http = 0,
    Json = 1,
}

impl From<FfiRequestSerializer> for RequestSerializerType {
    fn from(s: FfiRequestSerializer) -> Self {
        match s {
            FfiRequestSerializer::Http => RequestSerializerType::Http,
            FfiRequestSerializer::Json => RequestSerializerType::Json,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResponseSerializer {
    Http = 0,
    Json = 1,
    Xml = 2,
}

impl From<FfiResponseSerializer> for ResponseSerializerType {
    fn from(s: FfiResponseSerializer) -> Self {
        match s {
            FfiResponseSerializer::Http => ResponseSerializerType::Http,
            FfiResponseSerializer::Json => ResponseSerializerType::Json,
            FfiResponseSerializer::Xml => ResponseSerializerType::Xml,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiScheme {
    Http = 0,
    Https = 1,
}

impl From<FfiScheme> for SchemeProtocol {
    fn from(s: FfiScheme) -> Self {
        match s {
            FfiScheme::Http => SchemeProtocol::Http,
            FfiScheme::Https => SchemeProtocol::Https,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiPriority {
    Low = -1,
    Default = 0,
    High = 1,
}

impl From<FfiPriority> for RequestPriority {
    fn from(p: FfiPriority) -> Self {
        match p {
            FfiPriority::Low => RequestPriority::Low,
            FfiPriority::Default => RequestPriority::Default,
            FfiPriority::High => RequestPriority::High,
        }
    }
}

/// Error codes reported in `FfiOutcome` and returned by entry points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidUrl = 1,
    Serialization = 2,
    Network = 3,
    Timeout = 4,
    Cancelled = 5,
    InvalidStatus = 6,
    Deserialization = 7,
    TaskSpawn = 8,
    Panic = 9,
    NullArg = 10,
}

impl From<&RequestError> for FfiErrorCode {
    fn from(err: &RequestError) -> Self {
        match err {
            RequestError::InvalidUrl(_) => FfiErrorCode::InvalidUrl,
            RequestError::Serialization(_) => FfiErrorCode::Serialization,
            RequestError::Network(_) => FfiErrorCode::Network,
            RequestError::Timeout => FfiErrorCode::Timeout,
            RequestError::Cancelled => FfiErrorCode::Cancelled,
            RequestError::InvalidStatus { .. } => FfiErrorCode::InvalidStatus,
            RequestError::Deserialization(_) => FfiErrorCode::Deserialization,
            RequestError::TaskSpawn(_) => FfiErrorCode::TaskSpawn,
        }
    }
}

// ---------------------------------------------------------------------------
// Request configuration (caller-provided)
// ---------------------------------------------------------------------------

/// A single header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Decides whether a response status is acceptable.
pub type FfiStatusValidator = Option<extern "C" fn(status: u16, user_data: *mut c_void) -> bool>;

/// Decides whether a failure means the network is bad.
pub type FfiNetworkBadValidator =
    Option<extern "C" fn(error: FfiErrorCode, user_data: *mut c_void) -> bool>;

/// Called once per start with an outcome borrowed for the duration of the
/// call.
pub type FfiCompletion = Option<extern "C" fn(outcome: *const FfiOutcome, user_data: *mut c_void)>;

/// Request configuration described as C-compatible plain data.
///
/// Strings are NUL-terminated UTF-8. `path`, `params_json`, `username`,
/// `password` and `headers` may be null. `timeout_ms == 0` selects the
/// default timeout. Both validators are required. `validator_data` is
/// passed back to the validators unchanged and must stay valid for the
/// lifetime of the request.
#[repr(C)]
pub struct FfiRequestConfig {
    pub method: FfiRequestMethod,
    pub request_serializer: FfiRequestSerializer,
    pub response_serializer: FfiResponseSerializer,
    pub scheme: FfiScheme,
    pub priority: FfiPriority,
    pub host: *const c_char,
    pub path: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub params_json: *const c_char,
    pub username: *const c_char,
    pub password: *const c_char,
    pub timeout_ms: u64,
    pub allows_cellular_access: bool,
    pub status_code_validator: FfiStatusValidator,
    pub network_bad_validator: FfiNetworkBadValidator,
    pub validator_data: *mut c_void,
}

/// Pointer handed back to C untouched. The C side guarantees it is safe to
/// use from the worker and main threads.
#[derive(Clone, Copy)]
pub(crate) struct SendPtr(pub(crate) *mut c_void);

impl SendPtr {
    /// By value, so a closure captures the whole wrapper.
    pub(crate) fn get(self) -> *mut c_void {
        self.0
    }
}

unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

/// Owned copy of an `FfiRequestConfig`.
pub struct FfiConfig {
    method: RequestMethod,
    request_serializer: RequestSerializerType,
    response_serializer: ResponseSerializerType,
    scheme: SchemeProtocol,
    priority: RequestPriority,
    host: String,
    path: String,
    headers: BTreeMap<String, String>,
    params: Option<Value>,
    credentials: Option<Credentials>,
    timeout: Duration,
    allows_cellular_access: bool,
    status_code_validator: extern "C" fn(u16, *mut c_void) -> bool,
    network_bad_validator: extern "C" fn(FfiErrorCode, *mut c_void) -> bool,
    validator_data: SendPtr,
}

impl FfiConfig {
    /// Copy everything out of `raw`. Fails on a null host, a missing
    /// validator, non-UTF-8 strings or unparsable `params_json`.
    pub(crate) fn from_raw(raw: &FfiRequestConfig) -> Result<Self, String> {
        let host = c_string(raw.host, "host")?.ok_or("null argument: host")?;
        let path = c_string(raw.path, "path")?.unwrap_or_default();
        let status_code_validator = raw
            .status_code_validator
            .ok_or("status_code_validator is required")?;
        let network_bad_validator = raw
            .network_bad_validator
            .ok_or("network_bad_validator is required")?;

        let mut headers = BTreeMap::new();
        if !raw.headers.is_null() && raw.headers_len > 0 {
            let raw_headers =
                unsafe { std::slice::from_raw_parts(raw.headers, raw.headers_len as usize) };
            for h in raw_headers {
                let key = c_string(h.key, "header key")?.ok_or("null header key")?;
                let value = c_string(h.value, "header value")?.unwrap_or_default();
                headers.insert(key, value);
            }
        }

        let params = match c_string(raw.params_json, "params_json")? {
            Some(json) => Some(
                serde_json::from_str(&json).map_err(|e| format!("invalid params_json: {e}"))?,
            ),
            None => None,
        };

        let credentials = match c_string(raw.username, "username")? {
            Some(username) => {
                let password = c_string(raw.password, "password")?.unwrap_or_default();
                Some(Credentials::new(username, password))
            }
            None => None,
        };

        let timeout = match raw.timeout_ms {
            0 => DEFAULT_TIMEOUT,
            ms => Duration::from_millis(ms),
        };

        Ok(Self {
            method: raw.method.into(),
            request_serializer: raw.request_serializer.into(),
            response_serializer: raw.response_serializer.into(),
            scheme: raw.scheme.into(),
            priority: raw.priority.into(),
            host,
            path,
            headers,
            params,
            credentials,
            timeout,
            allows_cellular_access: raw.allows_cellular_access,
            status_code_validator,
            network_bad_validator,
            validator_data: SendPtr(raw.validator_data),
        })
    }
}

/// Read an optional C string. Null yields `None`.
pub(crate) fn c_string(ptr: *const c_char, name: &str) -> Result<Option<String>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

impl RequestConfig for FfiConfig {
    fn request_timeout(&self) -> Duration {
        self.timeout
    }
    fn allows_cellular_access(&self) -> bool {
        self.allows_cellular_access
    }
    fn request_method(&self) -> RequestMethod {
        self.method
    }
    fn request_serializer_type(&self) -> RequestSerializerType {
        self.request_serializer
    }
    fn response_serializer_type(&self) -> ResponseSerializerType {
        self.response_serializer
    }
    fn authorization(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
    fn header_fields(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }
    fn scheme(&self) -> SchemeProtocol {
        self.scheme
    }
    fn host(&self) -> String {
        self.host.clone()
    }
    fn path(&self) -> String {
        self.path.clone()
    }
    fn params(&self) -> Option<Value> {
        self.params.clone()
    }
    fn priority(&self) -> RequestPriority {
        self.priority
    }
    fn status_code_validator(&self, status: u16) -> bool {
        (self.status_code_validator)(status, self.validator_data.0)
    }
    fn network_bad_validator(&self, error: &RequestError) -> bool {
        (self.network_bad_validator)(error.into(), self.validator_data.0)
    }
}

// ---------------------------------------------------------------------------
// Outcome (borrowed by the completion callback)
// ---------------------------------------------------------------------------

/// What a finished request recorded, as seen from C.
///
/// Every pointer is borrowed and only valid during the completion callback.
/// `status` is 0 when no response arrived. `body` is null when no response
/// arrived. `string` is null when the request failed or the body could not
/// be decoded.
#[repr(C)]
pub struct FfiOutcome {
    pub error_code: FfiErrorCode,
    pub error_message: *const c_char,
    pub status: u16,
    pub network_bad: bool,
    pub body: *const u8,
    pub body_len: usize,
    pub string: *const c_char,
}

/// Owns the storage an `FfiOutcome` points into.
pub(crate) struct OutcomeView {
    _outcome: Option<Arc<Outcome>>,
    _message: Option<CString>,
    _string: Option<CString>,
    pub(crate) raw: FfiOutcome,
}

impl OutcomeView {
    pub(crate) fn new(outcome: Option<Arc<Outcome>>) -> Self {
        let error = outcome.as_ref().and_then(|o| o.error.as_ref());
        let message = error.and_then(|e| CString::new(e.to_string()).ok());
        let string = outcome
            .as_ref()
            .and_then(|o| o.response_string.as_deref())
            .and_then(|s| CString::new(s).ok());
        let (body, body_len) = match outcome.as_ref().and_then(|o| o.response_data.as_deref()) {
            Some(data) => (data.as_ptr(), data.len()),
            None => (std::ptr::null(), 0),
        };

        let raw = FfiOutcome {
            error_code: error.map_or(FfiErrorCode::Ok, FfiErrorCode::from),
            error_message: message.as_ref().map_or(std::ptr::null(), |m| m.as_ptr()),
            status: outcome.as_ref().and_then(|o| o.status_code()).unwrap_or(0),
            network_bad: outcome.as_ref().is_some_and(|o| o.network_bad),
            body,
            body_len,
            string: string.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
        };
        Self {
            _outcome: outcome,
            _message: message,
            _string: string,
            raw,
        }
    }
}
