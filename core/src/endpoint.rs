//! Endpoint registry for the amoCRM API.
//!
//! # Design
//! Client operations name endpoints through the closed [`Endpoint`] enum, so a
//! missing registry entry is a compile error there. String tags still show up
//! at the edges (config files, ad-hoc lookups) and go through
//! [`Endpoint::from_str`], which rejects anything outside the registry.

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Base URL used when none is configured. `{subdomain}` is replaced with the
/// account subdomain.
pub const DEFAULT_BASE_URL: &str = "https://{subdomain}.amocrm.ru/";

/// Placeholder substituted in the base URL template.
pub const SUBDOMAIN_PLACEHOLDER: &str = "{subdomain}";

/// A logical amoCRM endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Login,
    GetPipelines,
    SetPipelines,
    DeletePipelines,
    SetLeads,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Login,
        Endpoint::GetPipelines,
        Endpoint::SetPipelines,
        Endpoint::DeletePipelines,
        Endpoint::SetLeads,
    ];

    /// Stable string tag, as used in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::GetPipelines => "get_pipelines",
            Endpoint::SetPipelines => "set_pipelines",
            Endpoint::DeletePipelines => "delete_pipelines",
            Endpoint::SetLeads => "set_leads",
        }
    }

    pub fn default_path(self) -> &'static str {
        match self {
            Endpoint::Login => "private/api/auth.php",
            Endpoint::GetPipelines => "private/api/v2/json/pipelines/list",
            Endpoint::SetPipelines => "private/api/v2/json/pipelines/set",
            Endpoint::DeletePipelines => "private/api/v2/json/pipelines/delete",
            Endpoint::SetLeads => "api/v2/leads",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ApiError::UnknownEndpoint(s.to_string()))
    }
}

/// Base URL template plus one path per [`Endpoint`].
///
/// Immutable once handed to a `UrlBuilder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRegistry {
    base_url: String,
    login: String,
    get_pipelines: String,
    set_pipelines: String,
    delete_pipelines: String,
    set_leads: String,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login: Endpoint::Login.default_path().to_string(),
            get_pipelines: Endpoint::GetPipelines.default_path().to_string(),
            set_pipelines: Endpoint::SetPipelines.default_path().to_string(),
            delete_pipelines: Endpoint::DeletePipelines.default_path().to_string(),
            set_leads: Endpoint::SetLeads.default_path().to_string(),
        }
    }
}

impl EndpointRegistry {
    /// Default paths under a custom base URL template.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn base_url_template(&self) -> &str {
        &self.base_url
    }

    /// Base URL with the subdomain substituted in.
    pub fn base_url_for(&self, subdomain: &str) -> String {
        self.base_url.replace(SUBDOMAIN_PLACEHOLDER, subdomain)
    }

    pub fn path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Login => &self.login,
            Endpoint::GetPipelines => &self.get_pipelines,
            Endpoint::SetPipelines => &self.set_pipelines,
            Endpoint::DeletePipelines => &self.delete_pipelines,
            Endpoint::SetLeads => &self.set_leads,
        }
    }

    /// Replace the path template for one endpoint.
    pub fn set_path(&mut self, endpoint: Endpoint, path: impl Into<String>) {
        let slot = match endpoint {
            Endpoint::Login => &mut self.login,
            Endpoint::GetPipelines => &mut self.get_pipelines,
            Endpoint::SetPipelines => &mut self.set_pipelines,
            Endpoint::DeletePipelines => &mut self.delete_pipelines,
            Endpoint::SetLeads => &mut self.set_leads,
        };
        *slot = path.into();
    }
}
