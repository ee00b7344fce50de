//! URL construction for amoCRM endpoints.
//!
//! # Design
//! Every URL the client sends goes through [`UrlBuilder::url_for`], so the
//! query-string rules live in one place:
//!
//! 1. `type=json` comes first when the response format is JSON.
//! 2. Caller parameters follow in insertion order. A caller key equal to an
//!    existing one replaces its value in place and keeps its position.
//! 3. Pairs render as `key=value` joined by `&`. A request with no
//!    parameters still ends in a bare `?`.
//!
//! [`QueryEncoding`] picks whether keys and values are percent-encoded or
//! inserted verbatim. The verbatim form exists for servers that expect the
//! legacy behaviour.

use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::error::ApiError;

/// Whether responses are decoded as JSON or handed back as raw bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Raw,
}

impl ResponseFormat {
    /// Query parameter announcing the format to the server, if any.
    fn indicator(self) -> Option<(&'static str, &'static str)> {
        match self {
            ResponseFormat::Json => Some(("type", "json")),
            ResponseFormat::Raw => None,
        }
    }
}

/// How query keys and values are written into the URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryEncoding {
    #[default]
    Percent,
    /// Verbatim insertion, no escaping.
    Legacy,
}

impl QueryEncoding {
    fn render(self, key: &str, value: &str) -> String {
        match self {
            QueryEncoding::Percent => {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            }
            QueryEncoding::Legacy => format!("{key}={value}"),
        }
    }
}

/// Ordered query parameters with last-write-wins on duplicate keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn extend_from(&mut self, other: &QueryParams) {
        for (k, v) in &other.pairs {
            self.insert(k.clone(), v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Dynamic input must be a JSON object of scalars.
impl TryFrom<&Value> for QueryParams {
    type Error = ApiError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(ApiError::InvalidArgument(format!(
                "extra query parameters must be a key-value mapping, got {}",
                json_kind(value)
            )));
        };
        let mut params = QueryParams::new();
        for (key, v) in map {
            let rendered = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ApiError::InvalidArgument(format!(
                        "query parameter '{key}' must be a scalar, got {}",
                        json_kind(v)
                    )))
                }
            };
            params.insert(key.clone(), rendered);
        }
        Ok(params)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Builds fully-qualified request URLs for one account.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    registry: EndpointRegistry,
    subdomain: String,
    base_url: String,
    format: ResponseFormat,
    encoding: QueryEncoding,
}

impl UrlBuilder {
    pub fn new(registry: EndpointRegistry, subdomain: &str, format: ResponseFormat) -> Self {
        let base_url = registry.base_url_for(subdomain);
        Self {
            registry,
            subdomain: subdomain.to_string(),
            base_url,
            format,
            encoding: QueryEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: QueryEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    pub fn encoding(&self) -> QueryEncoding {
        self.encoding
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn build_query_params(&self, extra: Option<&QueryParams>) -> String {
        let mut params = QueryParams::new();
        if let Some((key, value)) = self.format.indicator() {
            params.insert(key, value);
        }
        if let Some(extra) = extra {
            params.extend_from(extra);
        }
        params
            .iter()
            .map(|(k, v)| self.encoding.render(k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url_for(&self, endpoint: Endpoint, extra: Option<&QueryParams>) -> String {
        format!(
            "{}{}?{}",
            self.base_url,
            self.registry.path(endpoint),
            self.build_query_params(extra)
        )
    }

    /// Like [`url_for`](Self::url_for) but resolves a string tag first.
    pub fn url_for_name(&self, name: &str, extra: Option<&QueryParams>) -> Result<String, ApiError> {
        let endpoint: Endpoint = name.parse()?;
        Ok(self.url_for(endpoint, extra))
    }
}
