//! Response body types.
//!
//! # Design
//! `DataType` selects how a successful response body is post-processed and
//! `Body` holds the result. Anything other than `json` or `xml` is treated
//! as raw text, so an unrecognised `dataType` string never fails a request.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use xmltree::Element;

/// Requested post-processing of a successful response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    /// Leave the body as the transport delivered it.
    #[default]
    Raw,
    Json,
    Xml,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Raw => "text",
            DataType::Json => "json",
            DataType::Xml => "xml",
        }
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => DataType::Json,
            "xml" => DataType::Xml,
            _ => DataType::Raw,
        })
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(data_type) => data_type,
            Err(never) => match never {},
        }
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of an `Outcome`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No response body exists (invalid request, transport failure).
    Empty,
    /// Raw text as delivered by the transport.
    Text(String),
    /// Parsed JSON, when `dataType` was `json`.
    Json(serde_json::Value),
    /// Parsed XML document root, when `dataType` was `xml`.
    Xml(Element),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&Element> {
        match self {
            Body::Xml(element) => Some(element),
            _ => None,
        }
    }

    /// Deserialize a JSON body into a typed value.
    ///
    /// Returns `None` if the body is not JSON or does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        self.as_json()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}
