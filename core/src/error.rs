//! Error types for the amoCRM client.
//!
//! # Design
//! Validation failures (`UnknownEndpoint`, `InvalidArgument`) are raised before
//! any request leaves the process. Remote failures keep the status code so the
//! caller can tell "the server said no" apart from "there is no data".
//! `Unauthorized` and `NotFound` get dedicated variants because they are the
//! two statuses callers branch on most: an expired session and a missing
//! record.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by `CrmClient` operations and the URL builder.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A string endpoint tag does not name any entry in the registry.
    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    /// A value that must be a key-value mapping had another shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server rejected the session (401/403). Usually `login` was not
    /// called or the session expired.
    #[error("not authorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// Any other non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// HTTP status carried by remote failures, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status } | ApiError::Http { status, .. } => Some(*status),
            ApiError::NotFound => Some(404),
            _ => None,
        }
    }
}

/// Errors that can occur when loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    #[error("config names unknown endpoint '{name}'")]
    UnknownEndpoint { name: String },

    #[error("config validation failed: {message}")]
    Validation { message: String },
}
