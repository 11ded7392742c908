//! Cached virtual tree over a path-addressed object store.
//!
//! A protocol layer (WebDAV in `objdav-webdav`) exposes paths like
//! `/docs/report.txt`; the store addresses objects by opaque *real paths*.
//! This crate keeps a cache of [`Node`]s in a [`NodeRegistry`] and performs
//! COPY and MOVE through a [`TreeMutator`], reconciling the cache with what
//! the store reports back.
//!
//! # Layers
//!
//! - [`path`]: pure helpers (normalize, split, join).
//! - [`NodeRegistry`]: path → node cache; loads missing entries through a
//!   [`NodeLoader`] and stages persistence.
//! - [`TreeMutator`]: copy/move orchestration over a [`BackendClient`].
//! - [`MemoryBackend`]: in-process store implementing both traits.
//!
//! # Example
//!
//! ```
//! use objdav_tree::{MemoryBackend, NodeRegistry, OverwritePolicy, TreeMutator};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryBackend::new());
//! store.seed("/docs/report.txt").unwrap();
//! store.seed("/archive/").unwrap();
//!
//! let registry = NodeRegistry::new(store.clone(), store.root_real_path()).into_shared();
//! let mutator = TreeMutator::new(store.clone(), registry.clone());
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     mutator
//!         .move_entry("/docs/report.txt", "/archive/report.txt", OverwritePolicy::Fail)
//!         .await
//!         .unwrap();
//! });
//! assert!(registry.get("/archive/report.txt").is_some());
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod mutator;
pub mod node;
pub mod overwrite;
pub mod path;
pub mod registry;
pub mod stats;
pub mod testing;

pub use backend::{
    BackendClient, BackendError, BackendReply, BackendResult, NodeLoader, ObjectInfo, ReplyItem,
    ReplyResult,
};
pub use error::{ErrorCategory, TreeError, TreeResult};
pub use memory::MemoryBackend;
pub use mutator::TreeMutator;
pub use node::{Node, NodeId, NodeIdentity, NodeKind, NodeRecord};
pub use overwrite::OverwritePolicy;
pub use registry::{NodeRegistry, ROOT_ID};
pub use stats::{TreeStats, TreeStatsSnapshot};
