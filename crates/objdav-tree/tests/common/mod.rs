//! Shared fixtures for tree integration tests.

#![allow(dead_code)]

use objdav_tree::testing::ScriptedBackend;
use objdav_tree::{MemoryBackend, Node, NodeRegistry, TreeMutator};
use std::sync::Arc;

/// A store, a recording backend over it, and a registry + mutator on top.
pub struct Fixture {
    pub store: Arc<MemoryBackend>,
    pub backend: Arc<ScriptedBackend>,
    pub registry: Arc<NodeRegistry>,
    pub mutator: TreeMutator,
}

impl Fixture {
    /// Seed the store with `paths` (trailing `/` for directories).
    pub fn with_paths(paths: &[&str]) -> Self {
        let store = Arc::new(MemoryBackend::new());
        for path in paths {
            store.seed(path).unwrap();
        }
        let backend = Arc::new(ScriptedBackend::new(store.clone()));
        let registry = NodeRegistry::new(store.clone(), store.root_real_path()).into_shared();
        let mutator = TreeMutator::new(backend.clone(), registry.clone());
        Self {
            store,
            backend,
            registry,
            mutator,
        }
    }

    /// Resolve and list a directory so its children are marked fetched.
    pub async fn fetched_dir(&self, path: &str) -> Arc<Node> {
        let dir = self.registry.resolve_directory(path).await.unwrap();
        self.registry.children(&dir).await.unwrap();
        assert!(dir.children_fetched(), "{path} should be fetched");
        dir
    }

    /// Real path the store currently has for a virtual path.
    pub fn store_real_path(&self, path: &str) -> String {
        self.store
            .stat(path)
            .unwrap_or_else(|| panic!("{path} missing from store"))
            .real_path
    }
}

/// Assert that every cached node is keyed by its own path and, where the
/// store has that path, carries the store's real path and kind.
pub fn assert_registry_consistent(fixture: &Fixture) {
    let mut seen = std::collections::HashSet::new();
    for (path, id) in fixture.registry.entries() {
        assert!(seen.insert(id), "{id} cached under two paths");
        let node = fixture
            .registry
            .get_by_id(id)
            .unwrap_or_else(|| panic!("{path} maps to evicted {id}"));
        assert_eq!(node.path(), path, "{id} keyed under a stale path");

        let info = fixture
            .store
            .stat(&path)
            .unwrap_or_else(|| panic!("{path} is cached but gone from the store"));
        assert_eq!(node.real_path(), info.real_path, "stale real path for {path}");
        assert_eq!(node.kind(), info.kind, "stale kind for {path}");
    }
}
