//! HTTP transport types and the `Transport` seam.
//!
//! # Design
//! Requests and responses are plain data. The controller builds an
//! `HttpRequest` (what an XHR would receive through `open`,
//! `setRequestHeader` and `send`) and hands it to a `Transport` together
//! with a `Completer`. The transport reports back through exactly one of
//! the completer's two notifications, `load` or `error`.
//!
//! All fields use owned types so values can cross thread and FFI boundaries
//! without lifetime concerns.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::call::Completer;

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Any other verb, stored uppercased.
    Other(String),
}

impl HttpMethod {
    /// Parse a verb case-insensitively. An empty verb means `GET`.
    pub fn parse(verb: &str) -> Self {
        let verb = verb.trim().to_ascii_uppercase();
        match verb.as_str() {
            "" | "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Other(verb),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Other(verb) => verb,
        }
    }

    /// POST and PUT get a form content type when no custom headers are set.
    pub fn wants_form_content_type(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User and password forwarded to the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl Credentials {
    /// Value for an HTTP Basic `Authorization` header.
    pub fn basic_authorization(&self) -> String {
        let password = self.password.as_deref().unwrap_or("");
        let token = STANDARD.encode(format!("{}:{password}", self.user));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An HTTP request described as plain data.
///
/// Built by the controller from a `RequestDescriptor`. The transport is
/// responsible for executing it and reporting through the `Completer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub credentials: Option<Credentials>,
}

impl HttpRequest {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by a transport after executing an `HttpRequest`. Any status
/// is a completed response here; classification happens in the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Shorthand for a response with no headers.
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// The network capability the controller dispatches through.
///
/// `send` may report synchronously (before returning) or later from any
/// thread; the controller handles both orders.
pub trait Transport: Send + Sync {
    /// Whether this transport can issue cross-origin requests. When a call
    /// asks for `cors` and this returns false, the client falls back to its
    /// configured CORS transport.
    fn supports_cors(&self) -> bool {
        true
    }

    fn send(&self, request: HttpRequest, completer: Completer);
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn supports_cors(&self) -> bool {
        (**self).supports_cors()
    }

    fn send(&self, request: HttpRequest, completer: Completer) {
        (**self).send(request, completer)
    }
}
