//! Contract of the object store behind the tree.
//!
//! The store identifies objects by opaque *real paths*. Two collaborators are
//! consumed here:
//!
//! - [`BackendClient`] performs the six structural mutations (copy, move and
//!   rename, each for files and directories) and answers with a
//!   [`BackendReply`] describing the affected object.
//! - [`NodeLoader`] answers lookups and listings when the registry misses.
//!
//! Both are object-safe so they can be shared as `Arc<dyn ...>`.

use crate::error::{TreeError, TreeResult};
use crate::node::NodeKind;
use crate::overwrite::OverwritePolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The referenced object does not exist.
    #[error("Object not found: {real_path}")]
    NotFound {
        /// Real path the store could not find.
        real_path: String,
    },

    /// The destination name is taken and the policy was fail-on-conflict.
    #[error("Destination exists: {name}")]
    Conflict {
        /// The conflicting leaf name.
        name: String,
    },

    /// The request never got an answer (timeout, connection reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with an error code.
    #[error("API error {code}: {message}")]
    Api {
        /// Store-specific error code.
        code: i64,
        /// Store-supplied message.
        message: String,
    },
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// An object as the store describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Leaf name.
    pub name: String,
    /// Store identifier.
    pub real_path: String,
    /// File or directory.
    pub kind: NodeKind,
}

impl ObjectInfo {
    /// Describe a file.
    pub fn file(name: impl Into<String>, real_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            real_path: real_path.into(),
            kind: NodeKind::File,
        }
    }

    /// Describe a directory.
    pub fn directory(name: impl Into<String>, real_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            real_path: real_path.into(),
            kind: NodeKind::Directory,
        }
    }
}

/// Reply envelope of a mutating call: `{ "result": { "items": [ ... ] } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendReply {
    /// Absent when the store had nothing to report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplyResult>,
}

/// The `result` member of a [`BackendReply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyResult {
    /// Affected objects; the last one describes the mutated entry.
    #[serde(default)]
    pub items: Vec<ReplyItem>,
}

/// Metadata of one object in a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyItem {
    /// New real path of the object, when the store assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Leaf name as stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Size in bytes (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u64>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReplyItem {
    /// An item carrying only a real path.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

impl BackendReply {
    /// Build a reply from result items.
    pub fn with_items(items: Vec<ReplyItem>) -> Self {
        Self {
            result: Some(ReplyResult { items }),
        }
    }

    /// The item describing the mutated entry (the last one).
    pub fn last_item(&self) -> Option<&ReplyItem> {
        self.result.as_ref().and_then(|r| r.items.last())
    }

    /// The real path the store assigned to the mutated entry.
    ///
    /// `Ok(None)` means the item did not carry a (non-empty) path and the
    /// previously known real path stays valid. A reply without any result
    /// item is an [`TreeError::InvalidState`].
    pub fn updated_real_path(&self) -> TreeResult<Option<&str>> {
        let item = self
            .last_item()
            .ok_or_else(|| TreeError::InvalidState("reply has no result item".to_string()))?;
        Ok(item.path.as_deref().filter(|p| !p.is_empty()))
    }
}

/// Structural mutations offered by the object store.
///
/// Every method takes the source's real path, the new leaf name and the
/// overwrite policy; copies and moves also take the real path of the
/// destination parent. Retry and timeout policy belong to implementations.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Copy a file under `dest_parent_real_path` as `name`.
    async fn copy_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;

    /// Copy a directory tree under `dest_parent_real_path` as `name`.
    async fn copy_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;

    /// Move a file under `dest_parent_real_path` as `name`.
    async fn move_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;

    /// Move a directory tree under `dest_parent_real_path` as `name`.
    async fn move_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;

    /// Rename a file in place.
    async fn rename_file(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;

    /// Rename a directory in place.
    async fn rename_directory(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply>;
}

/// Read access used by the registry on cache misses.
#[async_trait]
pub trait NodeLoader: Send + Sync {
    /// Find the child `name` of the directory `parent_real_path`.
    async fn lookup(&self, parent_real_path: &str, name: &str) -> BackendResult<Option<ObjectInfo>>;

    /// List the children of the directory `parent_real_path`.
    async fn list(&self, parent_real_path: &str) -> BackendResult<Vec<ObjectInfo>>;
}
