//! C-ABI wrapper around `reqkit-core`.
//!
//! # Overview
//! Lets any language with a C FFI configure requests, start and stop them,
//! and receive completions on its own main thread. The caller creates a
//! context, creates requests against it, and periodically calls
//! `reqkit_context_drain` from the thread that should run callbacks.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Configuration is copied into Rust-owned values at `reqkit_request_new`;
//!   validators are C function pointers called with `validator_data`.
//! - The completion callback receives an `FfiOutcome` borrowed for the
//!   duration of the call. Nothing in it needs to be freed.
//! - The C caller owns context and request handles and must release them
//!   with the matching `reqkit_*_free` function.

pub mod types;

use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use reqkit_core::{resolve_encoding, MainContext, Request, ResponseSerializerType, Session};
use tracing::warn;

use types::*;

// ---------------------------------------------------------------------------
// Context lifecycle
// ---------------------------------------------------------------------------

/// Create a main context with a session using the default transport.
///
/// Returns null if an internal panic occurs. The caller must free the
/// returned pointer with `reqkit_context_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_context_new() -> *mut FfiContext {
    catch_unwind(|| {
        let context = MainContext::new();
        let session = Session::with_default_transport(&context);
        Box::into_raw(Box::new(FfiContext { context, session }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a context created by `reqkit_context_new`. Completions still queued
/// are discarded. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_context_free(ctx: *mut FfiContext) {
    if !ctx.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(ctx) });
        }));
    }
}

/// Run every completion queued so far on the calling thread.
///
/// Returns how many ran, or 0 if `ctx` is null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_context_drain(ctx: *const FfiContext) -> u32 {
    catch_unwind(AssertUnwindSafe(|| {
        if ctx.is_null() {
            return 0;
        }
        let ctx = unsafe { &*ctx };
        u32::try_from(ctx.context.run_pending()).unwrap_or(u32::MAX)
    }))
    .unwrap_or(0)
}

/// Block up to `timeout_ms` for one completion and run it on the calling
/// thread. Returns true if a completion ran.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_context_wait(ctx: *const FfiContext, timeout_ms: u64) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if ctx.is_null() {
            return false;
        }
        let ctx = unsafe { &*ctx };
        ctx.context.run_next(Duration::from_millis(timeout_ms))
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create a request from `config`, bound to `ctx`.
///
/// Returns null if either argument is null, the host is null, a validator
/// is missing, a string is not UTF-8 or `params_json` does not parse. The
/// caller must free the returned pointer with `reqkit_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_new(
    ctx: *const FfiContext,
    config: *const FfiRequestConfig,
) -> *mut FfiRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if ctx.is_null() || config.is_null() {
            return std::ptr::null_mut();
        }
        let ctx = unsafe { &*ctx };
        let raw = unsafe { &*config };
        match FfiConfig::from_raw(raw) {
            Ok(config) => Box::into_raw(Box::new(FfiRequest {
                inner: Request::new(config, &ctx.session),
            })),
            Err(reason) => {
                warn!(%reason, "rejected request configuration");
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Start the request. `callback` fires exactly once, during a later
/// `reqkit_context_drain` or `reqkit_context_wait`, with `user_data`. A null
/// `callback` starts without one.
///
/// Starting a request that is already executing is ignored. After
/// `reqkit_request_stop` a new start is accepted immediately.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_start(
    req: *const FfiRequest,
    callback: FfiCompletion,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        let req = unsafe { &*req };
        match callback {
            Some(callback) => {
                let user_data = SendPtr(user_data);
                req.inner.start_with_completion(move |request| {
                    let view = OutcomeView::new(request.outcome());
                    callback(&view.raw, user_data.get());
                });
            }
            None => {
                req.inner.set_completion_block(|_| {});
                req.inner.start();
            }
        }
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Cancel the in-flight request. Its callback still fires, with
/// `FfiErrorCode::Cancelled` unless the request had already failed for a
/// non-network reason, and the request may be started again right away. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_stop(req: *const FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*req }.inner.stop();
        }));
    }
}

/// Drop every pending callback of this request so none of them fire. Safe
/// to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_clear_completion(req: *const FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*req }.inner.clear_completion_block();
        }));
    }
}

/// True from start until the callback has been delivered or the request
/// was stopped.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_is_executing(req: *const FfiRequest) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        !req.is_null() && unsafe { &*req }.inner.is_executing()
    }))
    .unwrap_or(false)
}

/// Free a request created by `reqkit_request_new`. A request still in
/// flight keeps running and its callback still fires unless
/// `reqkit_request_clear_completion` was called first. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_request_free(req: *mut FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(req) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Encoding resolver
// ---------------------------------------------------------------------------

/// Resolve the text encoding for a response, given the request's
/// `Content-Type` and `Accept-Charset` header values. Either may be null.
///
/// Returns the canonical encoding name (`"UTF-8"`, `"GBK"`,
/// `"windows-1252"`, ...), or null if an internal panic occurs. The caller
/// must free the result with `reqkit_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_string_encoding(
    response_serializer: FfiResponseSerializer,
    content_type: *const c_char,
    accept_charset: *const c_char,
) -> *mut c_char {
    catch_unwind(|| {
        let mut headers = BTreeMap::new();
        if let Ok(Some(value)) = c_string(content_type, "content_type") {
            headers.insert("Content-Type".to_string(), value);
        }
        if let Ok(Some(value)) = c_string(accept_charset, "accept_charset") {
            headers.insert("Accept-Charset".to_string(), value);
        }
        let encoding =
            resolve_encoding(ResponseSerializerType::from(response_serializer), &headers);
        match CString::new(encoding.label()) {
            Ok(label) => label.into_raw(),
            Err(e) => {
                warn!(error = %e, "encoding label is not a C string");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a string returned by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn reqkit_string_free(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { CString::from_raw(s) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::{CStr, CString};
    use std::net::SocketAddr;

    extern "C" fn accept_2xx(status: u16, _user_data: *mut c_void) -> bool {
        (200..300).contains(&status)
    }

    extern "C" fn reject_all(_status: u16, _user_data: *mut c_void) -> bool {
        false
    }

    extern "C" fn transport_is_bad(error: FfiErrorCode, _user_data: *mut c_void) -> bool {
        matches!(error, FfiErrorCode::Network | FfiErrorCode::Timeout)
    }

    #[derive(Debug, Default, Clone)]
    struct Seen {
        code: Option<FfiErrorCode>,
        message: Option<String>,
        status: u16,
        network_bad: bool,
        body: Option<Vec<u8>>,
        string: Option<String>,
    }

    type Calls = RefCell<Vec<Seen>>;

    extern "C" fn record(outcome: *const FfiOutcome, user_data: *mut c_void) {
        let calls = unsafe { &*(user_data as *const Calls) };
        let o = unsafe { &*outcome };
        let text = |ptr: *const c_char| {
            (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string())
        };
        calls.borrow_mut().push(Seen {
            code: Some(o.error_code),
            message: text(o.error_message),
            status: o.status,
            network_bad: o.network_bad,
            body: (!o.body.is_null())
                .then(|| unsafe { std::slice::from_raw_parts(o.body, o.body_len) }.to_vec()),
            string: text(o.string),
        });
    }

    fn config(host: &CStr, path: &CStr) -> FfiRequestConfig {
        FfiRequestConfig {
            method: FfiRequestMethod::Get,
            request_serializer: FfiRequestSerializer::Http,
            response_serializer: FfiResponseSerializer::Json,
            scheme: FfiScheme::Http,
            priority: FfiPriority::Default,
            host: host.as_ptr(),
            path: path.as_ptr(),
            headers: std::ptr::null(),
            headers_len: 0,
            params_json: std::ptr::null(),
            username: std::ptr::null(),
            password: std::ptr::null(),
            timeout_ms: 5_000,
            allows_cellular_access: true,
            status_code_validator: Some(accept_2xx),
            network_bad_validator: Some(transport_is_bad),
            validator_data: std::ptr::null_mut(),
        }
    }

    fn start_server() -> SocketAddr {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });
        addr
    }

    /// Start `req` with the recording callback and wait for it.
    fn run(ctx: *mut FfiContext, req: *mut FfiRequest) -> Seen {
        let calls: Calls = RefCell::new(Vec::new());
        let code = reqkit_request_start(req, Some(record), &calls as *const Calls as *mut c_void);
        assert_eq!(code, FfiErrorCode::Ok);
        assert!(reqkit_context_wait(ctx, 10_000));
        assert_eq!(reqkit_context_drain(ctx), 0);
        let calls = calls.into_inner();
        assert_eq!(calls.len(), 1);
        calls[0].clone()
    }

    // --- context ---

    #[test]
    fn context_new_and_free() {
        let ctx = reqkit_context_new();
        assert!(!ctx.is_null());
        assert_eq!(reqkit_context_drain(ctx), 0);
        assert!(!reqkit_context_wait(ctx, 10));
        reqkit_context_free(ctx);
    }

    #[test]
    fn context_null_is_safe() {
        reqkit_context_free(std::ptr::null_mut());
        assert_eq!(reqkit_context_drain(std::ptr::null()), 0);
        assert!(!reqkit_context_wait(std::ptr::null(), 10));
    }

    // --- request_new ---

    #[test]
    fn request_new_and_free() {
        let ctx = reqkit_context_new();
        let host = CString::new("example.com").unwrap();
        let path = CString::new("/v1/ping").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));
        assert!(!req.is_null());
        assert!(!reqkit_request_is_executing(req));
        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn request_new_null_args_return_null() {
        let ctx = reqkit_context_new();
        let host = CString::new("example.com").unwrap();
        let path = CString::new("/").unwrap();
        assert!(reqkit_request_new(std::ptr::null(), &config(&host, &path)).is_null());
        assert!(reqkit_request_new(ctx, std::ptr::null()).is_null());

        let mut cfg = config(&host, &path);
        cfg.host = std::ptr::null();
        assert!(reqkit_request_new(ctx, &cfg).is_null());
        reqkit_context_free(ctx);
    }

    #[test]
    fn request_new_requires_validators() {
        let ctx = reqkit_context_new();
        let host = CString::new("example.com").unwrap();
        let path = CString::new("/").unwrap();

        let mut cfg = config(&host, &path);
        cfg.status_code_validator = None;
        assert!(reqkit_request_new(ctx, &cfg).is_null());

        let mut cfg = config(&host, &path);
        cfg.network_bad_validator = None;
        assert!(reqkit_request_new(ctx, &cfg).is_null());
        reqkit_context_free(ctx);
    }

    #[test]
    fn request_new_rejects_bad_params_json() {
        let ctx = reqkit_context_new();
        let host = CString::new("example.com").unwrap();
        let path = CString::new("/").unwrap();
        let params = CString::new("{not json").unwrap();
        let mut cfg = config(&host, &path);
        cfg.params_json = params.as_ptr();
        assert!(reqkit_request_new(ctx, &cfg).is_null());
        reqkit_context_free(ctx);
    }

    #[test]
    fn request_functions_null_are_safe() {
        let code = reqkit_request_start(std::ptr::null(), None, std::ptr::null_mut());
        assert_eq!(code, FfiErrorCode::NullArg);
        reqkit_request_stop(std::ptr::null());
        reqkit_request_clear_completion(std::ptr::null());
        assert!(!reqkit_request_is_executing(std::ptr::null()));
        reqkit_request_free(std::ptr::null_mut());
    }

    // --- delivery ---

    #[test]
    fn invalid_url_is_delivered_through_callback() {
        let ctx = reqkit_context_new();
        let host = CString::new("").unwrap();
        let path = CString::new("/").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));
        assert!(!req.is_null());

        let seen = run(ctx, req);
        assert_eq!(seen.code, Some(FfiErrorCode::InvalidUrl));
        assert!(seen.message.unwrap().starts_with("invalid url"));
        assert_eq!(seen.status, 0);
        assert!(seen.body.is_none());
        assert!(seen.string.is_none());
        assert!(!seen.network_bad);

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn cleared_completion_never_fires() {
        let ctx = reqkit_context_new();
        let host = CString::new("").unwrap();
        let path = CString::new("/").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));

        let calls: Calls = RefCell::new(Vec::new());
        reqkit_request_start(req, Some(record), &calls as *const Calls as *mut c_void);
        reqkit_request_clear_completion(req);
        assert_eq!(reqkit_context_drain(ctx), 1);
        assert!(calls.borrow().is_empty());

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn get_with_params_and_headers_round_trip() {
        let addr = start_server();
        let ctx = reqkit_context_new();
        let host = CString::new(addr.to_string()).unwrap();
        let path = CString::new("/echo").unwrap();
        let params = CString::new(r#"{"q":"ffi"}"#).unwrap();
        let key = CString::new("X-Client").unwrap();
        let value = CString::new("c").unwrap();
        let headers = [FfiHeader {
            key: key.as_ptr(),
            value: value.as_ptr(),
        }];
        let user = CString::new("user").unwrap();
        let pass = CString::new("pass").unwrap();

        let mut cfg = config(&host, &path);
        cfg.params_json = params.as_ptr();
        cfg.headers = headers.as_ptr();
        cfg.headers_len = 1;
        cfg.username = user.as_ptr();
        cfg.password = pass.as_ptr();
        let req = reqkit_request_new(ctx, &cfg);

        let seen = run(ctx, req);
        assert_eq!(seen.code, Some(FfiErrorCode::Ok));
        assert!(seen.message.is_none());
        assert_eq!(seen.status, 200);
        let echo: mock_server::Echo = serde_json::from_slice(&seen.body.unwrap()).unwrap();
        assert_eq!(echo.query.as_deref(), Some("q=ffi"));
        assert_eq!(echo.headers.get("x-client").map(String::as_str), Some("c"));
        assert_eq!(
            echo.headers.get("authorization").map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
        assert!(seen.string.unwrap().contains("\"path\":\"/echo\""));

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn post_json_body_round_trip() {
        let addr = start_server();
        let ctx = reqkit_context_new();
        let host = CString::new(addr.to_string()).unwrap();
        let path = CString::new("/echo").unwrap();
        let params = CString::new(r#"{"title":"Buy milk"}"#).unwrap();
        let mut cfg = config(&host, &path);
        cfg.method = FfiRequestMethod::Post;
        cfg.request_serializer = FfiRequestSerializer::Json;
        cfg.params_json = params.as_ptr();
        let req = reqkit_request_new(ctx, &cfg);

        let seen = run(ctx, req);
        let echo: mock_server::Echo = serde_json::from_slice(&seen.body.unwrap()).unwrap();
        assert_eq!(echo.method, "POST");
        assert_eq!(echo.body, r#"{"title":"Buy milk"}"#);

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn status_validator_rejection_keeps_body() {
        let addr = start_server();
        let ctx = reqkit_context_new();
        let host = CString::new(addr.to_string()).unwrap();
        let path = CString::new("/echo").unwrap();
        let mut cfg = config(&host, &path);
        cfg.status_code_validator = Some(reject_all);
        let req = reqkit_request_new(ctx, &cfg);

        let seen = run(ctx, req);
        assert_eq!(seen.code, Some(FfiErrorCode::InvalidStatus));
        assert_eq!(seen.status, 200);
        assert!(seen.body.is_some());
        assert!(seen.string.is_none());
        assert!(!seen.network_bad);

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn refused_connection_is_network_bad() {
        let ctx = reqkit_context_new();
        let host = CString::new("127.0.0.1:1").unwrap();
        let path = CString::new("/").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));

        let seen = run(ctx, req);
        assert_eq!(seen.code, Some(FfiErrorCode::Network));
        assert!(seen.network_bad);
        assert_eq!(seen.status, 0);

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn stop_reports_cancelled() {
        let addr = start_server();
        let ctx = reqkit_context_new();
        let host = CString::new(addr.to_string()).unwrap();
        let path = CString::new("/delay/300").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));

        let calls: Calls = RefCell::new(Vec::new());
        reqkit_request_start(req, Some(record), &calls as *const Calls as *mut c_void);
        assert!(reqkit_request_is_executing(req));
        reqkit_request_stop(req);
        assert!(reqkit_context_wait(ctx, 10_000));

        let calls = calls.into_inner();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, Some(FfiErrorCode::Cancelled));
        assert!(!reqkit_request_is_executing(req));

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    #[test]
    fn restart_after_stop_runs_a_new_request() {
        let addr = start_server();
        let ctx = reqkit_context_new();
        let host = CString::new(addr.to_string()).unwrap();
        let path = CString::new("/delay/300").unwrap();
        let req = reqkit_request_new(ctx, &config(&host, &path));

        let stopped: Calls = RefCell::new(Vec::new());
        let restarted: Calls = RefCell::new(Vec::new());
        reqkit_request_start(req, Some(record), &stopped as *const Calls as *mut c_void);
        reqkit_request_stop(req);
        assert!(!reqkit_request_is_executing(req));
        reqkit_request_start(req, Some(record), &restarted as *const Calls as *mut c_void);
        assert!(reqkit_request_is_executing(req));

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while restarted.borrow().is_empty() && std::time::Instant::now() < deadline {
            reqkit_context_wait(ctx, 100);
        }

        let stopped = stopped.into_inner();
        let restarted = restarted.into_inner();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].code, Some(FfiErrorCode::Cancelled));
        assert_eq!(restarted.len(), 1);
        assert_eq!(restarted[0].code, Some(FfiErrorCode::Ok));
        assert_eq!(restarted[0].status, 200);

        reqkit_request_free(req);
        reqkit_context_free(ctx);
    }

    // --- encoding ---

    fn encoding_label(
        serializer: FfiResponseSerializer,
        content_type: Option<&str>,
        accept_charset: Option<&str>,
    ) -> String {
        let content_type = content_type.map(|v| CString::new(v).unwrap());
        let accept_charset = accept_charset.map(|v| CString::new(v).unwrap());
        let raw = reqkit_string_encoding(
            serializer,
            content_type.as_ref().map_or(std::ptr::null(), |v| v.as_ptr()),
            accept_charset.as_ref().map_or(std::ptr::null(), |v| v.as_ptr()),
        );
        assert!(!raw.is_null());
        let label = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        reqkit_string_free(raw);
        label
    }

    #[test]
    fn string_encoding_defaults_to_utf8() {
        assert_eq!(encoding_label(FfiResponseSerializer::Json, None, None), "UTF-8");
    }

    #[test]
    fn string_encoding_prefers_content_type_charset() {
        let label = encoding_label(
            FfiResponseSerializer::Http,
            Some("text/plain; charset=GBK"),
            Some("utf-16be"),
        );
        assert_eq!(label, "GBK");
    }

    #[test]
    fn string_encoding_falls_back_to_accept_charset() {
        let label = encoding_label(
            FfiResponseSerializer::Xml,
            None,
            Some("utf-16be, utf-8;q=0.5"),
        );
        assert_eq!(label, "UTF-16BE");
    }

    #[test]
    fn string_free_null_is_safe() {
        reqkit_string_free(std::ptr::null_mut());
    }
}
