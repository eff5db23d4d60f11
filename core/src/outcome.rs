//! Outcome of a call and the classification of transport results.
//!
//! # Design
//! Every completion path (pre-flight validation, HTTP response, transport
//! failure) produces one `Outcome` plus a `Resolution`. The resolution is
//! decided here, explicitly, instead of being re-derived from the status
//! code at registration time.

use crate::error::{AjaxError, TransportError};
use crate::http::HttpResponse;
use crate::settings::Settings;
use crate::types::{Body, DataType};

/// Status synthesized for a request that failed local validation.
pub const INVALID_REQUEST_STATUS: u16 = 900;

/// Status text synthesized for a request that failed local validation.
pub const INVALID_REQUEST_STATUS_TEXT: &str = "Invalid request object.";

/// Which terminal state a call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Succeeded,
    Errored,
}

/// Whether a status counts as success. Redirect statuses are success.
pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// What produced an outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// The transport completed with an HTTP response (any status).
    Response(HttpResponse),
    /// The transport reported a connection-level failure.
    Transport(TransportError),
    /// The settings failed pre-flight validation; nothing was sent.
    Invalid(Settings),
}

/// The result of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: u16,
    pub status_text: String,
    pub body: Body,
    pub source: Source,
    error: Option<AjaxError>,
}

impl Outcome {
    /// Outcome of settings with no url.
    pub(crate) fn invalid(settings: Settings) -> (Self, Resolution) {
        let outcome = Self {
            status: INVALID_REQUEST_STATUS,
            status_text: INVALID_REQUEST_STATUS_TEXT.to_string(),
            body: Body::Empty,
            source: Source::Invalid(settings),
            error: Some(AjaxError::InvalidRequest),
        };
        (outcome, Resolution::Errored)
    }

    /// Outcome of a connection-level failure. No response reached us, so the
    /// status is 0.
    pub(crate) fn transport_error(error: TransportError) -> (Self, Resolution) {
        let outcome = Self {
            status: 0,
            status_text: String::new(),
            body: Body::Empty,
            error: Some(AjaxError::Transport(error.clone())),
            source: Source::Transport(error),
        };
        (outcome, Resolution::Errored)
    }

    /// Classify a completed response and post-process its body.
    ///
    /// Error responses keep their raw body whatever `data_type` says. A
    /// success response whose body fails to decode is errored.
    pub(crate) fn from_response(response: HttpResponse, data_type: DataType) -> (Self, Resolution) {
        let status = response.status;
        let status_text = response.status_text.clone();

        if !is_success(status) {
            let outcome = Self {
                status,
                body: Body::Text(response.body.clone()),
                error: Some(AjaxError::Http {
                    status,
                    status_text: status_text.clone(),
                }),
                status_text,
                source: Source::Response(response),
            };
            return (outcome, Resolution::Errored);
        }

        let (body, error) = match decode_body(&response.body, data_type) {
            Ok(body) => (body, None),
            Err(error) => (Body::Text(response.body.clone()), Some(error)),
        };
        let resolution = if error.is_some() {
            Resolution::Errored
        } else {
            Resolution::Succeeded
        };
        let outcome = Self {
            status,
            status_text,
            body,
            source: Source::Response(response),
            error,
        };
        (outcome, resolution)
    }

    /// Why this outcome errored, or `None` for a successful one.
    pub fn error(&self) -> Option<&AjaxError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The transport response, when one was received.
    pub fn response(&self) -> Option<&HttpResponse> {
        match &self.source {
            Source::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Response header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response()?
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn decode_body(raw: &str, data_type: DataType) -> Result<Body, AjaxError> {
    let failed = |message: String| AjaxError::Deserialization { data_type, message };
    match data_type {
        DataType::Raw => Ok(Body::Text(raw.to_string())),
        DataType::Json => serde_json::from_str(raw)
            .map(Body::Json)
            .map_err(|e| failed(e.to_string())),
        DataType::Xml => xmltree::Element::parse(raw.as_bytes())
            .map(Body::Xml)
            .map_err(|e| failed(e.to_string())),
    }
}
