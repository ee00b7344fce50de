//! Client configuration loaded from TOML.
//!
//! ```toml
//! subdomain = "acme"
//! login = "user@example.com"
//! hash = "0123abcd"
//! response_format = "json"
//! query_encoding = "percent"
//! base_url = "https://{subdomain}.amocrm.ru/"
//! timeout_secs = 30
//!
//! [endpoints]
//! set_leads = "api/v2/leads"
//! ```
//!
//! Only `subdomain` is required. Credentials may come from the environment
//! instead (`AMOCRM_LOGIN`, `AMOCRM_HASH`, `AMOCRM_SUBDOMAIN`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::endpoint::{Endpoint, EndpointRegistry, DEFAULT_BASE_URL, SUBDOMAIN_PLACEHOLDER};
use crate::error::ConfigError;
use crate::types::Credentials;
use crate::url::{QueryEncoding, ResponseFormat};

pub const ENV_SUBDOMAIN: &str = "AMOCRM_SUBDOMAIN";
pub const ENV_LOGIN: &str = "AMOCRM_LOGIN";
pub const ENV_HASH: &str = "AMOCRM_HASH";

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub subdomain: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub query_encoding: QueryEncoding,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Path overrides keyed by endpoint tag.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("subdomain", &self.subdomain)
            .field("login", &self.login)
            .field("response_format", &self.response_format)
            .field("query_encoding", &self.query_encoding)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Config for `subdomain` with every other field at its default.
    pub fn new(subdomain: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            login: String::new(),
            hash: String::new(),
            response_format: ResponseFormat::default(),
            query_encoding: QueryEncoding::default(),
            base_url: default_base_url(),
            timeout_secs: None,
            endpoints: BTreeMap::new(),
        }
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Override subdomain and credentials from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(subdomain) = lookup(ENV_SUBDOMAIN) {
            self.subdomain = subdomain;
        }
        if let Some(login) = lookup(ENV_LOGIN) {
            self.login = login;
        }
        if let Some(hash) = lookup(ENV_HASH) {
            self.hash = hash;
        }
        self
    }

    /// Checks:
    /// - the subdomain is non-empty
    /// - the base URL contains `{subdomain}`
    /// - every endpoint override names a known endpoint and is non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subdomain.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "subdomain must not be empty".to_string(),
            });
        }
        if !self.base_url.contains(SUBDOMAIN_PLACEHOLDER) {
            return Err(ConfigError::Validation {
                message: format!(
                    "base_url '{}' must contain {SUBDOMAIN_PLACEHOLDER}",
                    self.base_url
                ),
            });
        }
        self.registry().map(|_| ())
    }

    /// Endpoint registry with this config's base URL and path overrides.
    pub fn registry(&self) -> Result<EndpointRegistry, ConfigError> {
        let mut registry = EndpointRegistry::with_base_url(&self.base_url);
        for (name, path) in &self.endpoints {
            let endpoint: Endpoint = name.parse().map_err(|_| ConfigError::UnknownEndpoint {
                name: name.clone(),
            })?;
            if path.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("path for endpoint '{name}' must not be empty"),
                });
            }
            registry.set_path(endpoint, path.clone());
        }
        Ok(registry)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.login.clone(), self.hash.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
