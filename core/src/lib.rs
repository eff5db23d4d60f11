//! Deferred, chainable HTTP request facade.
//!
//! # Overview
//! `Ajax::request` takes a URL or `Settings`, merges them over
//! `{method: "GET"}`, dispatches one request through a `Transport` and
//! returns a `Call`. Handlers registered on the call with `always`, `done`,
//! `fail` or `then` fire exactly once, whether they were registered before
//! or after the response arrived.
//!
//! # Design
//! - Failures are never returned to the caller. A missing url (status 900),
//!   an HTTP error status, a transport failure and an undecodable body all
//!   resolve the call as errored and reach `fail`/`always`.
//! - The transport is a trait. `UreqTransport` (feature `ureq`) performs
//!   blocking I/O; `HostTransport` queues requests for a host that does the
//!   I/O itself.
//! - Resolution is explicit (`CallState`), never inferred from the status.
//!
//! ```no_run
//! use ajax_core::{Ajax, DataType, Settings, UreqTransport};
//!
//! let ajax = Ajax::new(UreqTransport::new());
//! ajax.request(Settings::new("http://localhost:3000/json").data_type(DataType::Json))
//!     .done(|body, _| println!("got {body:?}"))
//!     .fail(|outcome| eprintln!("failed with {}", outcome.status));
//! ```

pub mod call;
pub mod client;
pub mod error;
pub mod host;
pub mod http;
pub mod outcome;
pub mod settings;
pub mod types;
#[cfg(feature = "ureq")]
pub mod ureq_transport;

pub use call::{Call, CallState, Callbacks, Completer};
pub use client::{Ajax, FORM_CONTENT_TYPE};
pub use error::{AjaxError, TransportError};
pub use host::{Exchange, HostTransport};
pub use http::{Credentials, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use outcome::{Outcome, Resolution, Source};
pub use settings::{RequestDescriptor, Settings};
pub use types::{Body, DataType};
#[cfg(feature = "ureq")]
pub use ureq_transport::UreqTransport;
