//! Cached filesystem entries.
//!
//! A [`Node`] is owned by the [`NodeRegistry`](crate::NodeRegistry) and
//! shared as `Arc<Node>`. Its identity (`name`, `path`, `real_path`) sits
//! behind a single `RwLock` so the three fields are always replaced together.
//! Directories additionally carry a [`DirectoryCache`] behind a per-node
//! mutex, which serializes child-set and `children_fetched` updates.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Registry-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two kinds of entries the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

impl NodeKind {
    /// Returns true for directories.
    pub fn is_directory(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Directory => f.write_str("directory"),
        }
    }
}

/// Where an entry lives, virtually and in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Leaf name.
    pub name: String,
    /// Normalized virtual path.
    pub path: String,
    /// Store identifier.
    pub real_path: String,
}

/// Cached listing state of a directory.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    /// Whether `children` reflects the store's current listing.
    pub children_fetched: bool,
    /// Known children (non-owning; resolve through the registry).
    pub children: BTreeSet<NodeId>,
}

/// A cached file or directory.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    identity: RwLock<NodeIdentity>,
    /// `Some` for directories only.
    directory: Option<Mutex<DirectoryCache>>,
}

impl Node {
    /// Create a node. Directories start with an unfetched, empty child set.
    pub fn new(id: NodeId, kind: NodeKind, identity: NodeIdentity) -> Self {
        let directory = kind
            .is_directory()
            .then(|| Mutex::new(DirectoryCache::default()));
        Self {
            id,
            kind,
            identity: RwLock::new(identity),
            directory,
        }
    }

    /// Registry identifier.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// File or directory.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns true for directories.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Snapshot of name, path and real path taken under one read lock.
    pub fn identity(&self) -> NodeIdentity {
        self.identity.read().clone()
    }

    /// Leaf name.
    pub fn name(&self) -> String {
        self.identity.read().name.clone()
    }

    /// Normalized virtual path.
    pub fn path(&self) -> String {
        self.identity.read().path.clone()
    }

    /// Store identifier.
    pub fn real_path(&self) -> String {
        self.identity.read().real_path.clone()
    }

    /// Replace name, path and real path in one critical section.
    ///
    /// Returns the previous identity.
    pub fn replace_identity(&self, identity: NodeIdentity) -> NodeIdentity {
        std::mem::replace(&mut *self.identity.write(), identity)
    }

    /// Overwrite the real path only.
    pub fn set_real_path(&self, real_path: impl Into<String>) {
        self.identity.write().real_path = real_path.into();
    }

    /// Whether the cached child set can be trusted. Always `true` for files.
    pub fn children_fetched(&self) -> bool {
        self.directory
            .as_ref()
            .is_none_or(|dir| dir.lock().children_fetched)
    }

    /// Set the `children_fetched` flag. No-op for files.
    ///
    /// Setting it to `false` is idempotent.
    pub fn set_children_fetched(&self, fetched: bool) {
        if let Some(dir) = &self.directory {
            dir.lock().children_fetched = fetched;
        }
    }

    /// Known children (empty for files).
    pub fn children(&self) -> Vec<NodeId> {
        self.directory
            .as_ref()
            .map(|dir| dir.lock().children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if `child` is in the cached child set.
    pub fn has_child(&self, child: NodeId) -> bool {
        self.directory
            .as_ref()
            .is_some_and(|dir| dir.lock().children.contains(&child))
    }

    /// Link a child. Returns false for files or if already linked.
    pub fn add_child(&self, child: NodeId) -> bool {
        self.directory
            .as_ref()
            .is_some_and(|dir| dir.lock().children.insert(child))
    }

    /// Unlink a child. Returns false for files or if it was not linked.
    pub fn remove_child(&self, child: NodeId) -> bool {
        self.directory
            .as_ref()
            .is_some_and(|dir| dir.lock().children.remove(&child))
    }

    /// Replace the child set with a fresh listing and mark it fetched.
    pub fn replace_children(&self, children: impl IntoIterator<Item = NodeId>) {
        if let Some(dir) = &self.directory {
            let mut cache = dir.lock();
            cache.children = children.into_iter().collect();
            cache.children_fetched = true;
        }
    }

    /// Serializable snapshot used by registry persistence.
    pub fn to_record(&self) -> NodeRecord {
        let identity = self.identity();
        let (children_fetched, children) = match &self.directory {
            Some(dir) => {
                let cache = dir.lock();
                (
                    Some(cache.children_fetched),
                    cache.children.iter().copied().collect(),
                )
            }
            None => (None, Vec::new()),
        };
        NodeRecord {
            id: self.id,
            kind: self.kind,
            name: identity.name,
            path: identity.path,
            real_path: identity.real_path,
            children_fetched,
            children,
        }
    }
}

/// Persisted state of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Registry identifier.
    pub id: NodeId,
    /// File or directory.
    pub kind: NodeKind,
    /// Leaf name.
    pub name: String,
    /// Virtual path.
    pub path: String,
    /// Store identifier.
    pub real_path: String,
    /// `None` for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_fetched: Option<bool>,
    /// Known children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}
