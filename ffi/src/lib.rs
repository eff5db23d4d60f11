//! C-ABI wrapper around `ajax-core`.
//!
//! # Overview
//! Exposes the deferred request API through `extern "C"` functions. The C
//! caller is the transport: it takes the request a call wants to send,
//! executes it however it likes, and reports the response (or a connection
//! failure) back. Handlers are C function pointers with a `user_data`
//! context pointer, and obey the same late-binding rules as in Rust.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - One `FfiCall` per request, created by `ajax_request_new` and freed by
//!   `ajax_call_free`. Freeing a call the host never completed resolves it
//!   as a transport failure, which fires its `fail`/`always` handlers.
//! - A null callback is a no-op registration.
//! - The C caller owns returned request pointers and must release them with
//!   `ajax_free_request`.

pub mod types;

use std::ffi::c_void;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use ajax_core::{Ajax, HostTransport, Settings, TransportError};

use types::*;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse the settings argument: a JSON object, a JSON string, or a bare URL.
fn parse_settings(raw: &str) -> Option<Settings> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('"') {
        Settings::from_json(raw).ok()
    } else {
        Some(Settings::new(raw))
    }
}

// ---------------------------------------------------------------------------
// Call lifecycle
// ---------------------------------------------------------------------------

/// Create a call from `settings` (JSON object or bare URL).
///
/// A call whose settings lack a url is created already errored (status 900)
/// and has no request to take. Returns null if `settings` is null, is
/// malformed JSON, or if an internal panic occurs.
/// The caller must free the returned pointer with `ajax_call_free`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_request_new(settings: *const c_char) -> *mut FfiCall {
    catch_unwind(|| {
        if settings.is_null() {
            return std::ptr::null_mut();
        }
        let raw = unsafe { read_c_str(settings) };
        let Some(settings) = parse_settings(&raw) else {
            log::warn!("ajax_request_new: settings are not a JSON object, string or url");
            return std::ptr::null_mut();
        };

        let host = HostTransport::new();
        let call = Ajax::new(host.clone()).request(settings);
        let (request, completer) = match host.next_exchange() {
            Some(exchange) => (Some(exchange.request), Some(exchange.completer)),
            None => (None, None),
        };
        Box::into_raw(Box::new(FfiCall {
            call,
            request: Mutex::new(request),
            completer: Mutex::new(completer),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a call created by `ajax_request_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_free(call: *mut FfiCall) {
    if !call.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(call) });
        }));
    }
}

/// Current phase of the call. Null reads as `Idle`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_state(call: *const FfiCall) -> FfiCallState {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return FfiCallState::Idle;
        }
        let call = unsafe { &*call };
        call.call.state().into()
    }))
    .unwrap_or(FfiCallState::Idle)
}

// ---------------------------------------------------------------------------
// Host transport side
// ---------------------------------------------------------------------------

/// Take the request the host must execute for this call.
///
/// Returns null if `call` is null, the request was already taken, or the
/// call never produced one (missing url).
/// The caller must free the returned pointer with `ajax_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_take_request(call: *const FfiCall) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return std::ptr::null_mut();
        }
        let call = unsafe { &*call };
        match lock(&call.request).take() {
            Some(request) => FfiHttpRequest::from_core(request),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Report the response the host received. Fires the call's handlers.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_complete(
    call: *const FfiCall,
    response: *const FfiHttpResponse,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() || response.is_null() {
            return FfiErrorCode::NullArg;
        }
        let call = unsafe { &*call };
        let response = unsafe { (*response).to_core() };
        let Some(completer) = lock(&call.completer).take() else {
            log::debug!("call {} already completed", call.call.id());
            return FfiErrorCode::AlreadyCompleted;
        };
        completer.load(response);
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Report that the host could not obtain a response. `message` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_fail_transport(
    call: *const FfiCall,
    message: *const c_char,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return FfiErrorCode::NullArg;
        }
        let call = unsafe { &*call };
        let message = unsafe { read_c_str(message) };
        let Some(completer) = lock(&call.completer).take() else {
            return FfiErrorCode::AlreadyCompleted;
        };
        completer.error(TransportError::Connection(message));
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Handler registration
// ---------------------------------------------------------------------------

/// Register `callback` to run on any resolution. Runs immediately if the
/// call has already resolved.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_always(
    call: *const FfiCall,
    callback: Option<FfiOutcomeCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return FfiErrorCode::NullArg;
        }
        let call = unsafe { &*call };
        let user_data = UserData(user_data);
        call.call.register_always(callback.map(|cb| {
            Arc::new(move |outcome: &ajax_core::Outcome| invoke(cb, outcome, user_data))
                as ajax_core::call::AlwaysFn
        }));
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Register `callback` to run on success. Runs immediately if the call has
/// already succeeded.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_done(
    call: *const FfiCall,
    callback: Option<FfiOutcomeCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return FfiErrorCode::NullArg;
        }
        let call = unsafe { &*call };
        let user_data = UserData(user_data);
        call.call.register_done(callback.map(|cb| {
            Arc::new(move |_: &ajax_core::Body, outcome: &ajax_core::Outcome| {
                invoke(cb, outcome, user_data)
            }) as ajax_core::call::DoneFn
        }));
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Register `callback` to run on error. Runs immediately if the call has
/// already errored.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_fail(
    call: *const FfiCall,
    callback: Option<FfiOutcomeCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() {
            return FfiErrorCode::NullArg;
        }
        let call = unsafe { &*call };
        let user_data = UserData(user_data);
        call.call.register_fail(callback.map(|cb| {
            Arc::new(move |outcome: &ajax_core::Outcome| invoke(cb, outcome, user_data))
                as ajax_core::call::FailFn
        }));
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// `ajax_call_done(done)` followed by `ajax_call_fail(fail)`, sharing
/// `user_data`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_then(
    call: *const FfiCall,
    done: Option<FfiOutcomeCallback>,
    fail: Option<FfiOutcomeCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    match ajax_call_done(call, done, user_data) {
        FfiErrorCode::Ok => ajax_call_fail(call, fail, user_data),
        err => err,
    }
}

/// Value of a response header by case-insensitive name. Null when the call
/// has not resolved with a response carrying that header.
/// The caller must free the returned string with `ajax_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_call_header(call: *const FfiCall, name: *const c_char) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if call.is_null() || name.is_null() {
            return std::ptr::null_mut();
        }
        let call = unsafe { &*call };
        let name = unsafe { read_c_str(name) };
        call.call
            .outcome()
            .and_then(|outcome| outcome.header(&name).map(|v| into_raw_string(v.to_string())))
            .unwrap_or(std::ptr::null_mut())
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a string returned by `ajax_call_header`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { free_raw_string(s) }));
}

/// Free a request returned by `ajax_call_take_request`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let mut req = unsafe { Box::from_raw(req) };
        unsafe { req.free_fields() };
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    /// Records every outcome a callback sees.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(FfiOutcomeKind, u16, Option<String>)>>,
    }

    impl Recorder {
        fn as_user_data(&self) -> *mut c_void {
            self as *const Recorder as *mut c_void
        }

        fn seen(&self) -> Vec<(FfiOutcomeKind, u16, Option<String>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    extern "C" fn record(outcome: *const FfiOutcome, user_data: *mut c_void) {
        let recorder = unsafe { &*(user_data as *const Recorder) };
        let outcome = unsafe { &*outcome };
        let body = if outcome.body.is_null() {
            None
        } else {
            Some(
                unsafe { CStr::from_ptr(outcome.body) }
                    .to_str()
                    .unwrap()
                    .to_string(),
            )
        };
        recorder
            .seen
            .lock()
            .unwrap()
            .push((outcome.kind, outcome.status, body));
    }

    fn new_call(settings: &str) -> *mut FfiCall {
        let settings = CString::new(settings).unwrap();
        ajax_request_new(settings.as_ptr())
    }

    fn respond(call: *mut FfiCall, status: u16, body: &str) -> FfiErrorCode {
        respond_with_headers(call, status, &[], body)
    }

    fn respond_with_headers(
        call: *mut FfiCall,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> FfiErrorCode {
        let status_text = CString::new("OK").unwrap();
        let body = CString::new(body).unwrap();
        let owned: Vec<(CString, CString)> = headers
            .iter()
            .map(|(k, v)| (CString::new(*k).unwrap(), CString::new(*v).unwrap()))
            .collect();
        let ffi_headers: Vec<FfiHeader> = owned
            .iter()
            .map(|(k, v)| FfiHeader {
                key: k.as_ptr() as *mut c_char,
                value: v.as_ptr() as *mut c_char,
            })
            .collect();
        let resp = FfiHttpResponse {
            status,
            status_text: status_text.as_ptr(),
            headers: if ffi_headers.is_empty() {
                std::ptr::null()
            } else {
                ffi_headers.as_ptr()
            },
            headers_len: ffi_headers.len(),
            body: body.as_ptr(),
        };
        ajax_call_complete(call, &resp)
    }

    fn header_of(call: *mut FfiCall, name: &str) -> Option<String> {
        let name = CString::new(name).unwrap();
        let value = ajax_call_header(call, name.as_ptr());
        if value.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(value) }.to_str().unwrap().to_string();
        ajax_free_string(value);
        Some(text)
    }

    #[test]
    fn request_new_null_returns_null() {
        assert!(ajax_request_new(std::ptr::null()).is_null());
    }

    #[test]
    fn request_new_malformed_json_returns_null() {
        assert!(new_call("{not json").is_null());
    }

    #[test]
    fn bare_url_produces_get_request() {
        let call = new_call("http://localhost:3000/text");
        assert!(!call.is_null());
        assert_eq!(ajax_call_state(call), FfiCallState::Pending);

        let req = ajax_call_take_request(call);
        assert!(!req.is_null());
        let req_ref = unsafe { &*req };
        assert_eq!(unsafe { CStr::from_ptr(req_ref.method) }.to_str().unwrap(), "GET");
        assert_eq!(
            unsafe { CStr::from_ptr(req_ref.url) }.to_str().unwrap(),
            "http://localhost:3000/text"
        );
        assert_eq!(req_ref.headers_len, 0);
        assert!(req_ref.headers.is_null());
        assert!(req_ref.body.is_null());
        assert!(req_ref.user.is_null());

        assert!(ajax_call_take_request(call).is_null(), "taken only once");

        ajax_free_request(req);
        ajax_call_free(call);
    }

    #[test]
    fn post_settings_produce_form_header_and_body() {
        let call = new_call(
            r#"{"url":"http://localhost:3000/echo","method":"post","data":"a=1","user":"u","password":"p"}"#,
        );
        let req = ajax_call_take_request(call);
        let req_ref = unsafe { &*req };
        assert_eq!(unsafe { CStr::from_ptr(req_ref.method) }.to_str().unwrap(), "POST");
        assert_eq!(req_ref.headers_len, 1);
        let headers = unsafe { std::slice::from_raw_parts(req_ref.headers, 1) };
        assert_eq!(
            unsafe { CStr::from_ptr(headers[0].key) }.to_str().unwrap(),
            "Content-Type"
        );
        assert_eq!(
            unsafe { CStr::from_ptr(headers[0].value) }.to_str().unwrap(),
            ajax_core::FORM_CONTENT_TYPE
        );
        assert_eq!(unsafe { CStr::from_ptr(req_ref.body) }.to_str().unwrap(), "a=1");
        assert_eq!(unsafe { CStr::from_ptr(req_ref.user) }.to_str().unwrap(), "u");
        assert_eq!(unsafe { CStr::from_ptr(req_ref.password) }.to_str().unwrap(), "p");

        ajax_free_request(req);
        ajax_call_free(call);
    }

    #[test]
    fn missing_url_is_errored_immediately() {
        let recorder = Recorder::default();
        let call = new_call(r#"{"method":"post"}"#);
        assert!(!call.is_null());
        assert_eq!(ajax_call_state(call), FfiCallState::Errored);
        assert!(ajax_call_take_request(call).is_null());

        ajax_call_fail(call, Some(record), recorder.as_user_data());
        ajax_call_done(call, Some(record), recorder.as_user_data());
        assert_eq!(
            recorder.seen(),
            vec![(FfiOutcomeKind::InvalidRequest, 900, None)]
        );
        assert_eq!(respond(call, 200, ""), FfiErrorCode::AlreadyCompleted);

        ajax_call_free(call);
    }

    #[test]
    fn early_done_fires_on_complete_with_parsed_json() {
        let recorder = Recorder::default();
        let call = new_call(r#"{"url":"http://localhost:3000/json","dataType":"json"}"#);
        assert_eq!(
            ajax_call_done(call, Some(record), recorder.as_user_data()),
            FfiErrorCode::Ok
        );
        assert!(recorder.seen().is_empty());

        assert_eq!(respond(call, 200, r#"{"a":1}"#), FfiErrorCode::Ok);
        assert_eq!(ajax_call_state(call), FfiCallState::Succeeded);
        assert_eq!(
            recorder.seen(),
            vec![(FfiOutcomeKind::Success, 200, Some(r#"{"a":1}"#.to_string()))]
        );

        ajax_call_free(call);
    }

    #[test]
    fn late_always_fires_immediately() {
        let recorder = Recorder::default();
        let call = new_call("http://localhost:3000/text");
        respond(call, 500, "boom");

        ajax_call_always(call, Some(record), recorder.as_user_data());
        assert_eq!(
            recorder.seen(),
            vec![(FfiOutcomeKind::Http, 500, Some("boom".to_string()))]
        );
        ajax_call_free(call);
    }

    #[test]
    fn then_routes_to_fail_on_transport_error() {
        let recorder = Recorder::default();
        let call = new_call("http://localhost:1/");
        ajax_call_then(call, Some(record), Some(record), recorder.as_user_data());

        let message = CString::new("connection refused").unwrap();
        assert_eq!(
            ajax_call_fail_transport(call, message.as_ptr()),
            FfiErrorCode::Ok
        );
        assert_eq!(recorder.seen(), vec![(FfiOutcomeKind::Transport, 0, None)]);
        assert_eq!(
            ajax_call_fail_transport(call, std::ptr::null()),
            FfiErrorCode::AlreadyCompleted
        );
        ajax_call_free(call);
    }

    #[test]
    fn null_callback_is_a_no_op() {
        let recorder = Recorder::default();
        let call = new_call("http://localhost:3000/text");
        ajax_call_done(call, Some(record), recorder.as_user_data());
        ajax_call_done(call, None, std::ptr::null_mut());

        respond(call, 200, "hi");
        assert_eq!(recorder.seen().len(), 1);
        ajax_call_free(call);
    }

    #[test]
    fn freeing_uncompleted_call_fires_fail() {
        let recorder = Recorder::default();
        let call = new_call("http://localhost:3000/text");
        ajax_call_fail(call, Some(record), recorder.as_user_data());
        ajax_call_free(call);
        assert_eq!(recorder.seen(), vec![(FfiOutcomeKind::Transport, 0, None)]);
    }

    #[test]
    fn null_args_are_reported() {
        assert_eq!(
            ajax_call_complete(std::ptr::null(), std::ptr::null()),
            FfiErrorCode::NullArg
        );
        assert_eq!(
            ajax_call_always(std::ptr::null(), Some(record), std::ptr::null_mut()),
            FfiErrorCode::NullArg
        );
        assert_eq!(ajax_call_state(std::ptr::null()), FfiCallState::Idle);
    }

    #[test]
    fn response_headers_are_readable_after_completion() {
        let call = new_call("http://localhost:3000/json");
        assert_eq!(header_of(call, "content-type"), None);

        respond_with_headers(
            call,
            200,
            &[("Content-Type", "application/json"), ("X-Trace", "t1")],
            r#"{"a":1}"#,
        );
        assert_eq!(
            header_of(call, "content-type").as_deref(),
            Some("application/json")
        );
        assert_eq!(header_of(call, "X-TRACE").as_deref(), Some("t1"));
        assert_eq!(header_of(call, "x-missing"), None);
        ajax_call_free(call);
    }

    #[test]
    fn object_data_is_sent_as_json_text() {
        let call = new_call(r#"{"url":"http://localhost:3000/echo","method":"POST","data":{"a":1}}"#);
        assert!(!call.is_null());
        let req = ajax_call_take_request(call);
        let req_ref = unsafe { &*req };
        assert_eq!(
            unsafe { CStr::from_ptr(req_ref.body) }.to_str().unwrap(),
            r#"{"a":1}"#
        );
        ajax_free_request(req);
        ajax_call_free(call);
    }

    #[test]
    fn outcome_kind_covers_every_error() {
        use ajax_core::{AjaxError, DataType};
        let cases = [
            (AjaxError::InvalidRequest, FfiOutcomeKind::InvalidRequest),
            (
                AjaxError::Http {
                    status: 500,
                    status_text: String::new(),
                },
                FfiOutcomeKind::Http,
            ),
            (
                AjaxError::Transport(TransportError::Abandoned),
                FfiOutcomeKind::Transport,
            ),
            (
                AjaxError::Deserialization {
                    data_type: DataType::Json,
                    message: String::new(),
                },
                FfiOutcomeKind::Deserialization,
            ),
            (
                AjaxError::InvalidSettings(String::new()),
                FfiOutcomeKind::InvalidSettings,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(FfiOutcomeKind::from_error(Some(&error)), kind);
        }
        assert_eq!(FfiOutcomeKind::from_error(None), FfiOutcomeKind::Success);
    }

    #[test]
    fn free_functions_accept_null() {
        ajax_call_free(std::ptr::null_mut());
        ajax_free_request(std::ptr::null_mut());
        ajax_free_string(std::ptr::null_mut());
        assert!(ajax_call_header(std::ptr::null(), std::ptr::null()).is_null());
    }
}
