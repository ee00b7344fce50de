//! Domain types for the amoCRM API.
//!
//! Field names on the serialized types match amoCRM's wire format
//! (`is_main`, `pipeline_id`, `USER_LOGIN`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::url::json_kind;

/// Login credentials, serialized as the auth endpoint expects them.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(rename = "USER_LOGIN")]
    pub login: String,
    #[serde(rename = "USER_HASH")]
    pub hash: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            hash: hash.into(),
        }
    }
}

// The hash is a secret; keep it out of debug output and logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("hash", &"<redacted>")
            .finish()
    }
}

/// A stage within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    pub color: String,
    pub name: String,
    pub sort: i64,
}

impl Status {
    pub fn new(name: impl Into<String>, color: impl Into<String>, sort: i64) -> Self {
        Self {
            color: color.into(),
            name: name.into(),
            sort,
        }
    }
}

/// Statuses keyed by the caller's status key.
pub type Statuses = BTreeMap<String, Status>;

/// A pipeline record for the `add` section of a set-pipelines request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPipeline {
    pub name: String,
    pub statuses: Statuses,
    pub is_main: bool,
    pub sort: i64,
}

/// Fields sent when updating a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineUpdate {
    pub name: String,
    pub is_main: bool,
    pub sort: i64,
}

/// A lead record for the `add` section of a set-leads request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub pipeline_id: i64,
    pub status_id: i64,
    pub extra: Map<String, Value>,
}

impl NewLead {
    /// Build a lead, validating that `extra` (if given) is a JSON object.
    pub fn new(
        name: impl Into<String>,
        pipeline_id: i64,
        status_id: i64,
        extra: Option<Value>,
    ) -> Result<Self, ApiError> {
        let extra = match extra {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ApiError::InvalidArgument(format!(
                    "lead extra fields must be a key-value mapping, got {}",
                    json_kind(&other)
                )))
            }
        };
        Ok(Self {
            name: name.into(),
            pipeline_id,
            status_id,
            extra,
        })
    }

    /// Flatten into the wire record. Extra fields override the named ones.
    pub fn into_record(self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("name".to_string(), Value::String(self.name));
        record.insert("pipeline_id".to_string(), Value::from(self.pipeline_id));
        record.insert("status_id".to_string(), Value::from(self.status_id));
        record.extend(self.extra);
        record
    }
}

/// A lead record for the `update` section of a set-leads request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadStatusUpdate {
    pub id: i64,
    pub status_id: i64,
    pub updated_at: i64,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }
}
