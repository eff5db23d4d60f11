//! Blocking transport backed by a `ureq` agent.
//!
//! `send` runs the request to completion before returning, so the call is
//! already resolved when `Ajax::request` hands back the `Call`. Handlers
//! registered afterwards fire immediately.

use crate::call::Completer;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Agent that returns 4xx/5xx responses as data rather than `Err`, so
    /// status classification stays with the controller.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent. It should have `http_status_as_error`
    /// disabled or error statuses will surface as transport errors.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            mut headers,
            body,
            credentials,
        } = request;
        if let Some(credentials) = &credentials {
            headers.push(("Authorization".to_string(), credentials.basic_authorization()));
        }
        let url = url.as_str();

        // POST/PUT/PATCH always carry a body. DELETE and OPTIONS carry one
        // only when `data` is set. GET and HEAD never do, as with XHR.
        let result = match &method {
            HttpMethod::Get | HttpMethod::Head => {
                if body.is_some() {
                    log::debug!("ureq: {method} {url}: request body is not sent");
                }
                let builder = match method {
                    HttpMethod::Head => self.agent.head(url),
                    _ => self.agent.get(url),
                };
                with_headers(builder, &headers).call()
            }
            HttpMethod::Post => {
                with_headers(self.agent.post(url), &headers).send(body.unwrap_or_default())
            }
            HttpMethod::Put => {
                with_headers(self.agent.put(url), &headers).send(body.unwrap_or_default())
            }
            HttpMethod::Patch => {
                with_headers(self.agent.patch(url), &headers).send(body.unwrap_or_default())
            }
            HttpMethod::Delete | HttpMethod::Options => {
                let builder = match method {
                    HttpMethod::Options => self.agent.options(url),
                    _ => self.agent.delete(url),
                };
                let builder = with_headers(builder, &headers);
                match body {
                    Some(body) => builder.force_send_body().send(body),
                    None => builder.call(),
                }
            }
            HttpMethod::Other(verb) => {
                let mut builder = ureq::http::Request::builder().method(verb.as_str()).uri(url);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match body {
                    Some(body) => self.agent.run(
                        builder
                            .body(body)
                            .map_err(|e| TransportError::Request(e.to_string()))?,
                    ),
                    None => self.agent.run(
                        builder
                            .body(())
                            .map_err(|e| TransportError::Request(e.to_string()))?,
                    ),
                }
            }
        };
        let mut response = result.map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest, completer: Completer) {
        log::trace!("ureq: {} {}", request.method, request.url);
        match self.execute(request) {
            Ok(response) => completer.load(response),
            Err(error) => completer.error(error),
        }
    }
}
