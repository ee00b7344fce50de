//! Blocking client for the amoCRM pipelines and leads API.
//!
//! # Overview
//! [`CrmClient`] owns one authenticated cookie session and exposes one method
//! per CRM action: login, list/get/add/update/delete pipelines, add/get leads
//! and moving a lead to another status. Each method builds its URL through
//! [`UrlBuilder`] and sends the request over the session. The response comes
//! back as a [`Payload`], either decoded JSON or raw bytes.
//!
//! # Design
//! - Endpoints form the closed [`Endpoint`] enum. String tags are resolved
//!   only at the edges and fail with [`ApiError::UnknownEndpoint`].
//! - Every operation has a pure `build_*` counterpart that returns the
//!   [`HttpRequest`] it would send, so request shapes can be tested without
//!   I/O.
//! - [`Transport`] is the I/O seam. [`UreqTransport`] is the production
//!   implementation and its cookie jar is the session.
//! - Failures are explicit `Result`s. Non-2xx responses become
//!   [`ApiError`] variants that carry the status code.
//! - Log events go through `tracing`. A client can carry its own
//!   [`tracing::Dispatch`] via [`CrmClient::with_logger`].
//!
//! ```no_run
//! use amocrm_core::{CrmClient, ResponseFormat};
//!
//! let client = CrmClient::new("user@example.com", "api-hash", "acme", ResponseFormat::Json);
//! client.login()?;
//! let pipelines = client.get_pipelines()?;
//! println!("{:?}", pipelines.as_json());
//! # Ok::<(), amocrm_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod types;
pub mod url;

pub use client::{CrmClient, LEADS_PAGE_SIZE};
pub use config::ClientConfig;
pub use endpoint::{Endpoint, EndpointRegistry};
pub use error::{ApiError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{
    Credentials, LeadStatusUpdate, NewLead, NewPipeline, Payload, PipelineUpdate, Status, Statuses,
};
pub use url::{QueryEncoding, QueryParams, ResponseFormat, UrlBuilder};
