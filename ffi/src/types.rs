//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion functions live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use ajax_core::{AjaxError, Body, Call, CallState, Completer, HttpRequest, HttpResponse, Outcome};

/// Opaque handle to one call. C callers receive a pointer to this and pass
/// it back into every `ajax_call_*` function.
pub struct FfiCall {
    pub(crate) call: Call,
    pub(crate) request: Mutex<Option<HttpRequest>>,
    pub(crate) completer: Mutex<Option<Completer>>,
}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Result of an `ajax_call_*` function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    AlreadyCompleted = 2,
    Panic = 3,
}

/// Phase of a call as seen from C.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiCallState {
    Idle = 0,
    Pending = 1,
    Succeeded = 2,
    Errored = 3,
}

impl From<CallState> for FfiCallState {
    fn from(state: CallState) -> Self {
        match state {
            CallState::Idle => FfiCallState::Idle,
            CallState::Pending => FfiCallState::Pending,
            CallState::Succeeded => FfiCallState::Succeeded,
            CallState::Errored => FfiCallState::Errored,
        }
    }
}

/// Why an outcome errored; `Success` when it did not.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOutcomeKind {
    Success = 0,
    InvalidRequest = 1,
    Http = 2,
    Transport = 3,
    Deserialization = 4,
    InvalidSettings = 5,
}

impl FfiOutcomeKind {
    fn of(outcome: &Outcome) -> Self {
        Self::from_error(outcome.error())
    }

    pub(crate) fn from_error(error: Option<&AjaxError>) -> Self {
        match error {
            None => FfiOutcomeKind::Success,
            Some(AjaxError::InvalidRequest) => FfiOutcomeKind::InvalidRequest,
            Some(AjaxError::Http { .. }) => FfiOutcomeKind::Http,
            Some(AjaxError::Transport(_)) => FfiOutcomeKind::Transport,
            Some(AjaxError::Deserialization { .. }) => FfiOutcomeKind::Deserialization,
            Some(AjaxError::InvalidSettings(_)) => FfiOutcomeKind::InvalidSettings,
        }
    }
}

// ---------------------------------------------------------------------------
// Request output (heap-allocated by us, freed with `ajax_free_request`)
// ---------------------------------------------------------------------------

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request the C host must execute.
///
/// `body`, `user` and `password` are null when absent.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: *mut c_char,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: usize,
    pub body: *mut c_char,
    pub user: *mut c_char,
    pub password: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let headers_len = req.headers.len();
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: into_raw_string(k),
                    value: into_raw_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };
        let (user, password) = match req.credentials {
            Some(credentials) => (
                into_raw_string(credentials.user),
                credentials
                    .password
                    .map_or(std::ptr::null_mut(), into_raw_string),
            ),
            None => (std::ptr::null_mut(), std::ptr::null_mut()),
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: into_raw_string(req.method.as_str().to_string()),
            url: into_raw_string(req.url),
            headers,
            headers_len,
            body: req.body.map_or(std::ptr::null_mut(), into_raw_string),
            user,
            password,
        }))
    }

    /// Free every string and the header array owned by this request.
    ///
    /// # Safety
    /// `self` must have been produced by `from_core` and not freed before.
    pub(crate) unsafe fn free_fields(&mut self) {
        free_raw_string(self.method);
        free_raw_string(self.url);
        free_raw_string(self.body);
        free_raw_string(self.user);
        free_raw_string(self.password);
        if !self.headers.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(self.headers, self.headers_len);
            let headers = Box::from_raw(slice);
            for header in headers.iter() {
                free_raw_string(header.key);
                free_raw_string(header.value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing the request,
/// then passes a pointer to `ajax_call_complete`. The FFI layer reads but
/// does not free these fields. Null strings read as empty; `headers` may be
/// null when `headers_len` is 0.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub status_text: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: usize,
    pub body: *const c_char,
}

impl FfiHttpResponse {
    /// # Safety
    /// Non-null string fields must be valid NUL-terminated C strings, and a
    /// non-null `headers` must point to `headers_len` valid entries.
    pub(crate) unsafe fn to_core(&self) -> HttpResponse {
        let mut response = HttpResponse::new(
            self.status,
            read_c_str(self.status_text),
            read_c_str(self.body),
        );
        if !self.headers.is_null() {
            response.headers = std::slice::from_raw_parts(self.headers, self.headers_len)
                .iter()
                .filter(|header| !header.key.is_null())
                .map(|header| (read_c_str(header.key), read_c_str(header.value)))
                .collect();
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Outcome (borrowed by callbacks)
// ---------------------------------------------------------------------------

/// An outcome as seen by a C callback.
///
/// Every pointer is borrowed and only valid for the duration of the
/// callback. `body` is the raw text, or the re-serialized document for JSON
/// and XML bodies, and null when there is no body.
#[repr(C)]
pub struct FfiOutcome {
    pub kind: FfiOutcomeKind,
    pub status: u16,
    pub status_text: *const c_char,
    pub body: *const c_char,
    pub error_message: *const c_char,
}

/// Owns the C strings an `FfiOutcome` points into.
pub(crate) struct OutcomeStrings {
    kind: FfiOutcomeKind,
    status: u16,
    status_text: CString,
    body: Option<CString>,
    error_message: Option<CString>,
}

impl OutcomeStrings {
    pub(crate) fn new(outcome: &Outcome) -> Self {
        Self {
            kind: FfiOutcomeKind::of(outcome),
            status: outcome.status,
            status_text: to_c_string(outcome.status_text.clone()),
            body: body_text(&outcome.body).map(to_c_string),
            error_message: outcome.error().map(|e| to_c_string(e.to_string())),
        }
    }

    pub(crate) fn as_ffi(&self) -> FfiOutcome {
        FfiOutcome {
            kind: self.kind,
            status: self.status,
            status_text: self.status_text.as_ptr(),
            body: self.body.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            error_message: self
                .error_message
                .as_ref()
                .map_or(std::ptr::null(), |s| s.as_ptr()),
        }
    }
}

fn body_text(body: &Body) -> Option<String> {
    match body {
        Body::Empty => None,
        Body::Text(text) => Some(text.clone()),
        Body::Json(value) => Some(value.to_string()),
        Body::Xml(element) => {
            let mut out = Vec::new();
            element.write(&mut out).ok()?;
            String::from_utf8(out).ok()
        }
    }
}

/// Signature of every outcome callback. `user_data` is passed through
/// untouched.
pub type FfiOutcomeCallback = extern "C" fn(outcome: *const FfiOutcome, user_data: *mut c_void);

/// Caller-owned context pointer carried into handlers.
///
/// The C caller is responsible for the pointee being usable from whichever
/// thread completes the call.
#[derive(Clone, Copy)]
pub(crate) struct UserData(pub(crate) *mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Invoke `callback` with a borrowed view of `outcome`.
pub(crate) fn invoke(callback: FfiOutcomeCallback, outcome: &Outcome, user_data: UserData) {
    let strings = OutcomeStrings::new(outcome);
    let ffi = strings.as_ffi();
    callback(&ffi, user_data.0);
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Interior NULs cannot cross into C; they are dropped.
pub(crate) fn to_c_string(s: String) -> CString {
    match CString::new(s) {
        Ok(c) => c,
        Err(e) => {
            let mut bytes = e.into_vec();
            bytes.retain(|b| *b != 0);
            CString::new(bytes).unwrap_or_default()
        }
    }
}

pub(crate) fn into_raw_string(s: String) -> *mut c_char {
    to_c_string(s).into_raw()
}

/// # Safety
/// `s` must be null or a pointer returned by `into_raw_string`.
pub(crate) unsafe fn free_raw_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// # Safety
/// `s` must be null or a valid NUL-terminated C string.
pub(crate) unsafe fn read_c_str(s: *const c_char) -> String {
    if s.is_null() {
        return String::new();
    }
    CStr::from_ptr(s).to_string_lossy().into_owned()
}
