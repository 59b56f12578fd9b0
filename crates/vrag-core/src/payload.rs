//! Payload records stored with each vector
//!
//! A stored payload always carries the chunk text plus the access-control
//! fields used by filtered search. Anything else the caller supplies lives in
//! the `extra` map and is flattened into the stored payload.
//!
//! Author: hephaex@gmail.com

use crate::{Result, VragError, RESERVED_PAYLOAD_KEYS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Roles allowed to read a chunk
///
/// Stored either as a single keyword or as a list of keywords. A keyword
/// match in the vector store succeeds when the stored value equals the role
/// or, for lists, contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowRoles {
    One(String),
    Many(Vec<String>),
}

impl AllowRoles {
    /// Build from a list, collapsing a single role to a plain keyword
    pub fn from_list(mut roles: Vec<String>) -> Self {
        if roles.len() == 1 {
            Self::One(roles.remove(0))
        } else {
            Self::Many(roles)
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        match self {
            Self::One(r) => r == role,
            Self::Many(rs) => rs.iter().any(|r| r == role),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(rs) => rs.is_empty(),
        }
    }
}

impl Default for AllowRoles {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<&str> for AllowRoles {
    fn from(role: &str) -> Self {
        Self::One(role.to_string())
    }
}

impl From<String> for AllowRoles {
    fn from(role: String) -> Self {
        Self::One(role)
    }
}

impl From<Vec<String>> for AllowRoles {
    fn from(roles: Vec<String>) -> Self {
        Self::from_list(roles)
    }
}

/// Caller-supplied metadata for a chunk, before the text is merged in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Clearance level of the uploader; readers need at least this level
    #[serde(default)]
    pub uploader_level: i64,

    /// Owning department
    #[serde(default)]
    pub dept: String,

    /// Owning project
    #[serde(default)]
    pub project: String,

    /// Roles allowed to read the chunk
    #[serde(default)]
    pub allow_roles: AllowRoles,

    /// Open extension map for anything else
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    pub fn new(
        uploader_level: i64,
        dept: impl Into<String>,
        project: impl Into<String>,
        allow_roles: impl Into<AllowRoles>,
    ) -> Self {
        Self {
            uploader_level,
            dept: dept.into(),
            project: project.into(),
            allow_roles: allow_roles.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra metadata field
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Reject extra keys that would shadow reserved payload fields
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = self
            .extra
            .keys()
            .find(|k| RESERVED_PAYLOAD_KEYS.contains(&k.as_str()))
        {
            return Err(VragError::ValidationError(format!(
                "extra metadata key '{key}' is reserved"
            )));
        }
        Ok(())
    }
}

/// Full payload stored with a vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Original chunk text
    #[serde(default)]
    pub text: String,

    #[serde(flatten)]
    pub metadata: ChunkMetadata,
}

impl ChunkPayload {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Flatten into a JSON object, the shape the vector store receives
    pub fn to_json_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(VragError::ValidationError(format!(
                "payload serialized to non-object: {other}"
            ))),
            Err(e) => Err(VragError::ValidationError(format!(
                "payload serialization failed: {e}"
            ))),
        }
    }

    /// Rebuild from a stored JSON object; missing reserved fields take defaults
    pub fn from_json_map(map: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| VragError::SearchError(format!("malformed payload: {e}")))
    }

    /// Rebuild from a stored JSON object, never dropping the point
    ///
    /// Reserved fields of the wrong type fall back to their defaults; a
    /// non-string `text` is kept as its JSON rendering.
    pub fn from_stored_map(map: Map<String, Value>) -> Self {
        if let Ok(payload) = Self::from_json_map(map.clone()) {
            return payload;
        }

        let mut payload = Self::default();
        for (key, value) in map {
            match key.as_str() {
                crate::TEXT_KEY => {
                    payload.text = match value {
                        Value::String(text) => text,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    }
                }
                crate::UPLOADER_LEVEL_KEY => {
                    payload.metadata.uploader_level = value.as_i64().unwrap_or_default()
                }
                crate::DEPT_KEY => {
                    payload.metadata.dept = value.as_str().unwrap_or_default().to_string()
                }
                crate::PROJECT_KEY => {
                    payload.metadata.project = value.as_str().unwrap_or_default().to_string()
                }
                crate::ALLOW_ROLES_KEY => {
                    payload.metadata.allow_roles = serde_json::from_value(value).unwrap_or_default()
                }
                _ => {
                    payload.metadata.extra.insert(key, value);
                }
            }
        }
        payload
    }
}

/// A passage returned by search: chunk text plus its full payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub payload: ChunkPayload,
}

impl From<ChunkPayload> for Passage {
    fn from(payload: ChunkPayload) -> Self {
        Self {
            text: payload.text.clone(),
            payload,
        }
    }
}

/// A passage with its re-rank similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPassage {
    pub passage: Passage,
    pub score: f32,
}
