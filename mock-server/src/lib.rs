use std::collections::BTreeMap;

use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const TEXT_FIXTURE: &str = "hello, world";
pub const JSON_FIXTURE: &str = r#"{"a":1}"#;
pub const XML_FIXTURE: &str = "<note><to>Tove</to><from>Jani</from></note>";
pub const MALFORMED_FIXTURE: &str = "{not json";

/// What `/echo` saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/text", get(text))
        .route("/json", get(json))
        .route("/xml", get(xml))
        .route("/malformed", get(malformed))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn text() -> &'static str {
    TEXT_FIXTURE
}

async fn json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], JSON_FIXTURE)
}

async fn xml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], XML_FIXTURE)
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], MALFORMED_FIXTURE)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    log::debug!("/status responding {status}");
    Ok((status, status.canonical_reason().unwrap_or_default().to_string()))
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        body,
    })
}
