//! Error types for the request facade.
//!
//! # Design
//! Failures are never returned from `Ajax::request`; they are carried inside
//! an errored `Outcome` and delivered to `fail`/`always` handlers. These
//! enums describe *why* an outcome errored so a handler can branch on it
//! without decoding the status code by hand.

use thiserror::Error;

use crate::types::DataType;

/// Connection-level failures reported by a `Transport`.
///
/// These map to the XHR `error` notification: no HTTP response reached the
/// caller, so the outcome carries status 0.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The host could not be reached (DNS, refused connection, TLS, ...).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request could not be expressed by the transport (bad URL, bad
    /// header name, unsupported method).
    #[error("malformed request: {0}")]
    Request(String),

    /// The response arrived but its body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The transport dropped its completer without reporting a result.
    #[error("transport dropped the request before completing it")]
    Abandoned,
}

/// Why an outcome ended up on the error path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AjaxError {
    /// The effective settings had no `url`.
    #[error("invalid request object: missing url")]
    InvalidRequest,

    /// The server answered with a status outside [200, 400).
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// No response reached us.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A success response whose body did not parse as the requested type.
    #[error("failed to decode {data_type} body: {message}")]
    Deserialization { data_type: DataType, message: String },

    /// A settings document could not be parsed.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
