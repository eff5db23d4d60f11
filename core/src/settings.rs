//! Request settings and the shallow merge that produces a call's effective
//! configuration.
//!
//! # Design
//! `Settings` is the merge input: every field is optional and a present
//! field in a later source replaces the same field in an earlier one.
//! Merging is per field and shallow, so a later `headers` map replaces an
//! earlier one wholesale. `RequestDescriptor` is the validated result with
//! the method normalized and the url guaranteed non-empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AjaxError;
use crate::http::{Credentials, HttpMethod};
use crate::types::DataType;

/// Caller-supplied request configuration. A bare URL converts into
/// `Settings { url: Some(..), .. }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<bool>,
    /// Request body. In a JSON settings document a non-string value is
    /// sent as its JSON text.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "data_as_text"
    )]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Settings {
    /// The default every call starts from: `{method: "GET"}`.
    pub fn base() -> Self {
        Self {
            method: Some("GET".to_string()),
            ..Self::default()
        }
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON settings document. A JSON string is taken as a bare URL.
    pub fn from_json(json: &str) -> Result<Self, AjaxError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| AjaxError::InvalidSettings(e.to_string()))?;
        match value {
            serde_json::Value::String(url) => Ok(Self::new(url)),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| AjaxError::InvalidSettings(e.to_string())),
            other => Err(AjaxError::InvalidSettings(format!(
                "expected an object or a url string, got {other}"
            ))),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn cors(mut self, cors: bool) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Overlay `source` onto `self`; present fields in `source` win.
    pub fn merge(mut self, source: impl Into<Settings>) -> Self {
        let source = source.into();
        overlay(&mut self.method, source.method);
        overlay(&mut self.url, source.url);
        overlay(&mut self.headers, source.headers);
        overlay(&mut self.cors, source.cors);
        overlay(&mut self.data, source.data);
        overlay(&mut self.data_type, source.data_type);
        overlay(&mut self.user, source.user);
        overlay(&mut self.password, source.password);
        self
    }

    /// Merge each source in order onto `self`. With no sources, `self` is
    /// returned unchanged.
    pub fn extend<I>(self, sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Settings>,
    {
        sources
            .into_iter()
            .fold(self, |merged, source| merged.merge(source))
    }

    /// Validate and normalize. Settings without a usable url are handed back
    /// so the caller can attach them to the invalid-request outcome.
    pub fn into_descriptor(self) -> Result<RequestDescriptor, Settings> {
        if self.url.as_deref().unwrap_or("").is_empty() {
            return Err(self);
        }
        let url = self.url.unwrap_or_default();
        let method = HttpMethod::parse(self.method.as_deref().unwrap_or("GET"));
        let credentials = self.user.map(|user| Credentials {
            user,
            password: self.password,
        });
        Ok(RequestDescriptor {
            method,
            url,
            headers: self.headers,
            cors: self.cors.unwrap_or(false),
            data: self.data,
            data_type: self.data_type.unwrap_or_default(),
            credentials,
        })
    }
}

fn data_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn overlay<T>(target: &mut Option<T>, source: Option<T>) {
    if source.is_some() {
        *target = source;
    }
}

impl From<&str> for Settings {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Settings {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl From<&Settings> for Settings {
    fn from(settings: &Settings) -> Self {
        settings.clone()
    }
}

/// The effective configuration of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Option<BTreeMap<String, String>>,
    pub cors: bool,
    pub data: Option<String>,
    pub data_type: DataType,
    pub credentials: Option<Credentials>,
}
