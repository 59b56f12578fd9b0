//! Caller identity for access-filtered search
//!
//! Author: hephaex@gmail.com

use crate::payload::ChunkMetadata;
use serde::{Deserialize, Serialize};

/// Identity and clearance of the user issuing a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Clearance level; chunks uploaded at a higher level stay hidden
    pub level: i64,
    pub role: String,
    pub dept: String,
    pub project: String,
}

impl UserContext {
    pub fn new(
        level: i64,
        role: impl Into<String>,
        dept: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            level,
            role: role.into(),
            dept: dept.into(),
            project: project.into(),
        }
    }

    /// Check whether this user may read a chunk with the given metadata
    ///
    /// All conditions must hold: uploader level at or below the user's level,
    /// same department, same project, and the user's role allowed.
    pub fn permits(&self, metadata: &ChunkMetadata) -> bool {
        metadata.uploader_level <= self.level
            && metadata.dept == self.dept
            && metadata.project == self.project
            && metadata.allow_roles.contains(&self.role)
    }
}
