//! Process-wide cache of virtual path → node.
//!
//! The registry owns node lifetime. It is built on two `DashMap`s, in the
//! same shape as a path table:
//!
//! - `path_to_id`: normalized virtual path → [`NodeId`]
//! - `nodes`: [`NodeId`] → `Arc<Node>`
//!
//! Nodes are created on the first resolution of a path (asking the
//! [`NodeLoader`] for every missing component), re-keyed when the tree
//! mutator moves them, and evicted when their cached paths become stale.
//!
//! Persistence is two-phase: [`NodeRegistry::persist`] stages a node and
//! [`NodeRegistry::flush`] commits every staged node as a [`NodeRecord`].
//! [`NodeRegistry::mark_dirty`] bumps a per-directory version used by the
//! protocol layer as an ETag source.

use crate::backend::{NodeLoader, ObjectInfo};
use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeId, NodeIdentity, NodeRecord};
use crate::path;
use crate::stats::TreeStats;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Identifier of the root directory.
pub const ROOT_ID: NodeId = NodeId(1);

/// Shared node cache. Pass it around as `Arc<NodeRegistry>`.
pub struct NodeRegistry {
    /// Read access to the store for cache misses.
    loader: Arc<dyn NodeLoader>,
    /// The root directory, never evicted.
    root: Arc<Node>,
    /// Maps normalized virtual paths to node IDs.
    path_to_id: DashMap<String, NodeId>,
    /// Maps node IDs to nodes.
    nodes: DashMap<NodeId, Arc<Node>>,
    /// Next available ID.
    next_id: AtomicU64,
    /// Nodes staged by `persist`, committed by `flush`.
    pending: Mutex<Vec<Arc<Node>>>,
    /// Committed node state.
    persisted: DashMap<NodeId, NodeRecord>,
    /// Per-directory version counters bumped by `mark_dirty`.
    versions: DashMap<String, u64>,
    stats: Arc<TreeStats>,
}

impl NodeRegistry {
    /// Create a registry whose root directory has the given real path.
    pub fn new(loader: Arc<dyn NodeLoader>, root_real_path: impl Into<String>) -> Self {
        Self::with_stats(loader, root_real_path, Arc::new(TreeStats::new()))
    }

    /// Create a registry reporting into existing statistics.
    pub fn with_stats(
        loader: Arc<dyn NodeLoader>,
        root_real_path: impl Into<String>,
        stats: Arc<TreeStats>,
    ) -> Self {
        let root = Arc::new(Node::new(
            ROOT_ID,
            crate::NodeKind::Directory,
            NodeIdentity {
                name: String::new(),
                path: path::ROOT.to_string(),
                real_path: root_real_path.into(),
            },
        ));

        let path_to_id = DashMap::new();
        path_to_id.insert(path::ROOT.to_string(), ROOT_ID);
        let nodes = DashMap::new();
        nodes.insert(ROOT_ID, Arc::clone(&root));

        Self {
            loader,
            root,
            path_to_id,
            nodes,
            next_id: AtomicU64::new(ROOT_ID.0 + 1),
            pending: Mutex::new(Vec::new()),
            persisted: DashMap::new(),
            versions: DashMap::new(),
            stats,
        }
    }

    /// Wrap in an `Arc` for sharing across request handlers.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Statistics shared with the tree mutator.
    pub fn stats(&self) -> Arc<TreeStats> {
        Arc::clone(&self.stats)
    }

    /// The root directory.
    pub fn root(&self) -> Arc<Node> {
        Arc::clone(&self.root)
    }

    /// Cached node for a path, without asking the store.
    pub fn get(&self, path: &str) -> Option<Arc<Node>> {
        let id = self.path_to_id.get(&path::normalize(path)).map(|r| *r)?;
        self.get_by_id(id)
    }

    /// Cached node by ID.
    pub fn get_by_id(&self, id: NodeId) -> Option<Arc<Node>> {
        self.nodes.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Number of cached nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if only the root is cached.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Every cached `(path, id)` pair, sorted by path.
    pub fn entries(&self) -> Vec<(String, NodeId)> {
        let mut entries: Vec<(String, NodeId)> = self
            .path_to_id
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort();
        entries
    }

    /// Resolve a path to its node, loading missing components from the store.
    ///
    /// Fails with [`TreeError::NotFound`] if any component does not exist or
    /// an intermediate component is a file.
    #[instrument(level = "trace", skip(self))]
    pub async fn resolve(&self, path: &str) -> TreeResult<Arc<Node>> {
        let normalized = path::normalize(path);
        if let Some(node) = self.get(&normalized) {
            self.stats.record_hit();
            trace!(path = %normalized, "registry hit");
            return Ok(node);
        }
        self.stats.record_miss();

        let mut current = self.root();
        for component in path::components(&normalized) {
            let child_path = path::join(&current.path(), component);
            if let Some(node) = self.get(&child_path) {
                current = node;
                continue;
            }
            if !current.is_directory() {
                return Err(TreeError::NotFound(normalized.clone()));
            }

            let found = self
                .loader
                .lookup(&current.real_path(), component)
                .await
                .map_err(|e| TreeError::from_backend(e, &normalized))?;
            let Some(info) = found else {
                debug!(path = %normalized, missing = %child_path, "path does not resolve");
                return Err(TreeError::NotFound(normalized.clone()));
            };
            trace!(path = %child_path, real_path = %info.real_path, "registry miss, loaded");
            current = self.insert_loaded(&current, component, info);
        }
        Ok(current)
    }

    /// Resolve a path that must be a directory.
    pub async fn resolve_directory(&self, path: &str) -> TreeResult<Arc<Node>> {
        let node = self.resolve(path).await?;
        if node.is_directory() {
            Ok(node)
        } else {
            Err(TreeError::NotADirectory(node.path()))
        }
    }

    /// Children of a directory, re-listing from the store unless the cached
    /// child set is marked fetched.
    #[instrument(level = "trace", skip(self, dir), fields(dir = %dir.path()))]
    pub async fn children(&self, dir: &Arc<Node>) -> TreeResult<Vec<Arc<Node>>> {
        if !dir.is_directory() {
            return Err(TreeError::NotADirectory(dir.path()));
        }

        if dir.children_fetched() {
            let cached: Option<Vec<Arc<Node>>> = dir
                .children()
                .into_iter()
                .map(|id| self.get_by_id(id))
                .collect();
            if let Some(children) = cached {
                self.stats.record_hit();
                return Ok(children);
            }
            // A linked child was evicted; the listing can no longer be trusted.
        }
        self.stats.record_miss();

        let listing = self
            .loader
            .list(&dir.real_path())
            .await
            .map_err(|e| TreeError::from_backend(e, &dir.path()))?;

        let previous = dir.children();
        let children: Vec<Arc<Node>> = listing
            .into_iter()
            .map(|info| {
                let name = info.name.clone();
                self.insert_loaded(dir, &name, info)
            })
            .collect();

        let current: HashSet<NodeId> = children.iter().map(|n| n.id()).collect();
        let dir_path = dir.path();
        for gone in previous.into_iter().filter(|id| !current.contains(id)) {
            // Entries moved elsewhere keep living under their new parent.
            let still_here = self
                .get_by_id(gone)
                .is_some_and(|node| path::split(&node.path()).0 == dir_path);
            if still_here {
                self.evict_node(gone);
            }
        }
        dir.replace_children(current);
        debug!(count = children.len(), "directory listing fetched");
        Ok(children)
    }

    /// Re-key a node after its identity changed from `old_path`.
    ///
    /// A different node cached at the new path (an overwritten destination)
    /// is evicted together with its cached descendants, so no two nodes share
    /// a path.
    pub fn relocate(&self, node: &Node, old_path: &str) {
        let new_path = node.path();
        if new_path == old_path {
            return;
        }
        let id = node.id();
        self.path_to_id.remove_if(old_path, |_, v| *v == id);

        let evicted = self.evict_descendants(&new_path);
        if let Some(previous) = self.path_to_id.insert(new_path.clone(), id)
            && previous != id
        {
            let (parent_path, _) = path::split(&new_path);
            if let Some(parent) = self.get(&parent_path) {
                parent.remove_child(previous);
            }
            self.nodes.remove(&previous);
            self.persisted.remove(&previous);
            self.stats.record_evictions(1);
            debug!(path = %new_path, replaced = %previous, "evicted overwritten destination");
        }
        trace!(from = %old_path, to = %new_path, evicted, "node relocated");
    }

    /// Evict every cached node strictly below `prefix`.
    ///
    /// Returns the number of evicted nodes.
    pub fn evict_descendants(&self, prefix: &str) -> usize {
        let prefix = path::normalize(prefix);
        let doomed: Vec<(String, NodeId)> = self
            .path_to_id
            .iter()
            .filter(|e| path::is_descendant(e.key(), &prefix))
            .map(|e| (e.key().clone(), *e.value()))
            .collect();

        for (path, id) in &doomed {
            self.path_to_id.remove_if(path, |_, v| v == id);
            self.nodes.remove(id);
            self.persisted.remove(id);
        }
        if !doomed.is_empty() {
            self.stats.record_evictions(doomed.len() as u64);
            debug!(prefix = %prefix, count = doomed.len(), "evicted cached descendants");
        }
        doomed.len()
    }

    /// Evict the node cached at `path` together with its cached descendants.
    ///
    /// Returns the number of evicted nodes. The root is never evicted.
    pub fn evict(&self, path: &str) -> usize {
        match self.path_to_id.get(&path::normalize(path)).map(|r| *r) {
            Some(id) => self.evict_node(id),
            None => 0,
        }
    }

    /// Stage a node for persistence.
    pub fn persist(&self, node: &Arc<Node>) {
        self.pending.lock().push(Arc::clone(node));
    }

    /// Commit every staged node. Returns the number of records written.
    pub fn flush(&self) -> usize {
        let staged = std::mem::take(&mut *self.pending.lock());
        let mut written = HashSet::new();
        for node in staged {
            // Evicted nodes are not written back.
            if self.nodes.contains_key(&node.id()) {
                self.persisted.insert(node.id(), node.to_record());
                written.insert(node.id());
            }
        }
        trace!(count = written.len(), "flushed node records");
        written.len()
    }

    /// Committed state of a node.
    pub fn persisted(&self, id: NodeId) -> Option<NodeRecord> {
        self.persisted.get(&id).map(|r| r.value().clone())
    }

    /// Number of committed records.
    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    /// Number of nodes staged but not flushed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Bump the version of a directory. Returns the new version.
    pub fn mark_dirty(&self, path: &str) -> u64 {
        let mut version = self.versions.entry(path::normalize(path)).or_insert(0);
        *version += 1;
        *version
    }

    /// Current version of a directory (0 if never marked dirty).
    pub fn version(&self, path: &str) -> u64 {
        self.versions
            .get(&path::normalize(path))
            .map_or(0, |v| *v)
    }

    /// Cache a store object found under `parent` and link it as a child.
    fn insert_loaded(&self, parent: &Node, name: &str, info: ObjectInfo) -> Arc<Node> {
        let child_path = path::join(&parent.path(), name);
        let node = match self.get(&child_path) {
            Some(existing) if existing.kind() == info.kind => {
                if existing.real_path() != info.real_path {
                    existing.set_real_path(info.real_path);
                }
                existing
            }
            Some(stale) => {
                self.evict_node(stale.id());
                self.create_node(child_path, name, info)
            }
            None => self.create_node(child_path, name, info),
        };
        parent.add_child(node.id());
        node
    }

    fn create_node(&self, child_path: String, name: &str, info: ObjectInfo) -> Arc<Node> {
        match self.path_to_id.entry(child_path.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(node) = self.nodes.get(occupied.get()) {
                    return Arc::clone(node.value());
                }
                let node = self.allocate(child_path, name, info);
                occupied.insert(node.id());
                node
            }
            Entry::Vacant(vacant) => {
                let node = self.allocate(child_path, name, info);
                vacant.insert(node.id());
                node
            }
        }
    }

    fn allocate(&self, child_path: String, name: &str, info: ObjectInfo) -> Arc<Node> {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = Arc::new(Node::new(
            id,
            info.kind,
            NodeIdentity {
                name: name.to_string(),
                path: child_path,
                real_path: info.real_path,
            },
        ));
        self.nodes.insert(id, Arc::clone(&node));
        node
    }

    /// Evict one node and its cached descendants. The root is never evicted.
    fn evict_node(&self, id: NodeId) -> usize {
        if id == ROOT_ID {
            return 0;
        }
        let Some((_, node)) = self.nodes.remove(&id) else {
            return 0;
        };
        let node_path = node.path();
        self.path_to_id.remove_if(&node_path, |_, v| *v == id);
        self.persisted.remove(&id);
        self.stats.record_evictions(1);
        1 + self.evict_descendants(&node_path)
    }
}
