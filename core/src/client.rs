//! Request entry point.
//!
//! # Design
//! `Ajax` holds the transports chosen at construction and the client-level
//! default settings, and carries no per-call state. Each `request` merges
//! `{method: "GET"}`, the defaults and the caller's settings, validates the
//! result, builds the `HttpRequest` and hands it to the selected transport.
//! The returned `Call` is live before the transport is invoked, so a
//! transport that reports synchronously is handled like one that reports
//! later.

use std::fmt;
use std::sync::Arc;

use crate::call::{Call, Callbacks};
use crate::http::{HttpRequest, Transport};
use crate::outcome::Outcome;
use crate::settings::{RequestDescriptor, Settings};

/// Content type sent with POST and PUT requests that carry no custom headers.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Client for issuing calls through a transport.
#[derive(Clone)]
pub struct Ajax {
    transport: Arc<dyn Transport>,
    cors_transport: Option<Arc<dyn Transport>>,
    defaults: Settings,
}

impl Ajax {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            cors_transport: None,
            defaults: Settings::default(),
        }
    }

    /// Transport used for `cors` calls when the primary transport reports
    /// no CORS support.
    pub fn with_cors_transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.cors_transport = Some(Arc::new(transport));
        self
    }

    /// Settings merged under every call's own settings.
    pub fn with_defaults(mut self, defaults: Settings) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Issue a request. Accepts a bare URL or `Settings`.
    pub fn request(&self, settings: impl Into<Settings>) -> Call {
        self.request_with(settings, Callbacks::default())
    }

    /// Issue a request with handlers registered before dispatch, so they
    /// also observe a call that resolves synchronously.
    pub fn request_with(&self, settings: impl Into<Settings>, callbacks: Callbacks) -> Call {
        let settings = Settings::base().extend([self.defaults.clone(), settings.into()]);
        let call = Call::new();
        call.register(callbacks);

        let descriptor = match settings.into_descriptor() {
            Ok(descriptor) => descriptor,
            Err(settings) => {
                log::debug!("call {}: rejected, no url", call.id());
                call.resolve(Outcome::invalid(settings));
                return call;
            }
        };

        let transport = self.select_transport(&descriptor);
        let request = build_request(&descriptor);
        log::debug!(
            "call {}: dispatching {} {}",
            call.id(),
            request.method,
            request.url
        );
        call.mark_pending();
        transport.send(request, call.completer(descriptor.data_type));
        call
    }

    fn select_transport(&self, descriptor: &RequestDescriptor) -> &Arc<dyn Transport> {
        if descriptor.cors && !self.transport.supports_cors() {
            if let Some(cors_transport) = &self.cors_transport {
                return cors_transport;
            }
        }
        &self.transport
    }
}

impl fmt::Debug for Ajax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ajax")
            .field("cors_transport", &self.cors_transport.is_some())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Translate a descriptor into what the transport is opened and sent with.
///
/// Custom headers are applied verbatim; without them, POST and PUT get the
/// form content type.
pub fn build_request(descriptor: &RequestDescriptor) -> HttpRequest {
    let headers = match &descriptor.headers {
        Some(headers) => headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None if descriptor.method.wants_form_content_type() => {
            vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())]
        }
        None => Vec::new(),
    };

    HttpRequest {
        method: descriptor.method.clone(),
        url: descriptor.url.clone(),
        headers,
        body: descriptor.data.clone(),
        credentials: descriptor.credentials.clone(),
    }
}
