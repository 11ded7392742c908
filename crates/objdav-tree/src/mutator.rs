//! COPY and MOVE over the cached tree.
//!
//! [`TreeMutator`] turns a (source path, destination path) pair into one
//! backend call and then reconciles the registry with what the backend did:
//!
//! | operation                     | backend call                          |
//! |-------------------------------|---------------------------------------|
//! | copy of a file / directory    | `copy_file` / `copy_directory`        |
//! | move within the same parent   | `rename_file` / `rename_directory`    |
//! | move to another parent        | `move_file` / `move_directory`        |
//!
//! Every node the operation touches is resolved before the backend call, and
//! local state is only changed after the call succeeded. The apply phase does
//! not await, so dropping the future at any point leaves the registry either
//! untouched or fully updated.

use crate::backend::{BackendClient, BackendError, BackendReply, BackendResult};
use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeIdentity, NodeKind};
use crate::overwrite::OverwritePolicy;
use crate::path;
use crate::registry::NodeRegistry;
use crate::stats::TreeStats;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Structural operation requested from the backend.
#[derive(Debug)]
enum Transfer {
    /// Duplicate under `dest_parent` (a real path).
    Copy { dest_parent: String },
    /// Re-parent under `dest_parent` (a real path).
    Move { dest_parent: String },
    /// Change the leaf name in place.
    Rename,
}

/// Where a moved node ends up relative to its old parent.
enum Placement {
    /// Same parent directory.
    Rename,
    /// Different parent directory.
    Move {
        source_parent: Arc<Node>,
        dest_parent: Arc<Node>,
    },
}

/// Orchestrates copies, moves and renames against the backend.
#[derive(Clone)]
pub struct TreeMutator {
    backend: Arc<dyn BackendClient>,
    registry: Arc<NodeRegistry>,
    stats: Arc<TreeStats>,
}

impl TreeMutator {
    /// Create a mutator over an injected backend and registry.
    pub fn new(backend: Arc<dyn BackendClient>, registry: Arc<NodeRegistry>) -> Self {
        let stats = registry.stats();
        Self {
            backend,
            registry,
            stats,
        }
    }

    /// The registry this mutator keeps consistent.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Statistics for this mutator and its registry.
    pub fn stats(&self) -> Arc<TreeStats> {
        Arc::clone(&self.stats)
    }

    /// Copy the entry at `source_path` to `destination_path`.
    ///
    /// The source node is never modified. On success the destination
    /// parent's cached listing is invalidated.
    #[instrument(level = "debug", skip(self))]
    pub async fn copy(
        &self,
        source_path: &str,
        destination_path: &str,
        overwrite: OverwritePolicy,
    ) -> TreeResult<()> {
        let start = Instant::now();
        let result = self.copy_entry(source_path, destination_path, overwrite).await;
        self.finish(start, &result);
        result
    }

    /// Move or rename the entry at `source_path` to `destination_path`.
    ///
    /// Same-parent moves are renames. Nothing local changes unless the
    /// backend call succeeds.
    #[instrument(level = "debug", skip(self))]
    pub async fn move_entry(
        &self,
        source_path: &str,
        destination_path: &str,
        overwrite: OverwritePolicy,
    ) -> TreeResult<()> {
        let start = Instant::now();
        let result = self.move_inner(source_path, destination_path, overwrite).await;
        self.finish(start, &result);
        result
    }

    async fn copy_entry(
        &self,
        source_path: &str,
        destination_path: &str,
        overwrite: OverwritePolicy,
    ) -> TreeResult<()> {
        let source = self.registry.resolve(source_path).await?;

        let dest_path = path::normalize(destination_path);
        let (dest_dir, dest_name) = path::split(&dest_path);
        if !path::is_valid_name(&dest_name) {
            return Err(TreeError::InvalidPath(dest_path));
        }
        let dest_parent = self.registry.resolve_directory(&dest_dir).await?;

        let source_identity = source.identity();
        if dest_path == source_identity.path
            || path::is_descendant(&dest_path, &source_identity.path)
            || path::is_descendant(&source_identity.path, &dest_path)
        {
            return Err(TreeError::InvalidPath(dest_path));
        }
        debug!(
            from = %source_identity.path,
            to = %dest_path,
            kind = %source.kind(),
            %overwrite,
            "Copying"
        );

        let transfer = Transfer::Copy {
            dest_parent: dest_parent.real_path(),
        };
        self.dispatch(
            source.kind(),
            &transfer,
            &source_identity.real_path,
            &dest_name,
            overwrite,
        )
        .await
        .map_err(|e| backend_failure(e, &source_identity.path, &dest_path))?;

        // A replaced destination has a new real path; drop what was cached.
        if overwrite.allows_overwrite() {
            self.registry.evict(&dest_path);
        }
        self.invalidate(&dest_parent);
        self.registry.mark_dirty(&dest_dir);
        self.registry.persist(&dest_parent);
        self.registry.flush();
        self.stats.record_copy();
        Ok(())
    }

    async fn move_inner(
        &self,
        source_path: &str,
        destination_path: &str,
        overwrite: OverwritePolicy,
    ) -> TreeResult<()> {
        let (source_dir, source_name) = path::split(source_path);
        let (dest_dir, dest_name) = path::split(destination_path);
        if source_name.is_empty() {
            return Err(TreeError::InvalidPath(path::normalize(source_path)));
        }
        if !path::is_valid_name(&dest_name) {
            return Err(TreeError::InvalidPath(path::normalize(destination_path)));
        }

        let node = self.registry.resolve(source_path).await?;
        let old = node.identity();
        let new_path = path::normalize(destination_path);
        if new_path == old.path
            || path::is_descendant(&new_path, &old.path)
            || path::is_descendant(&old.path, &new_path)
        {
            return Err(TreeError::InvalidPath(new_path));
        }

        let placement = if source_dir == dest_dir {
            Placement::Rename
        } else {
            Placement::Move {
                source_parent: self.registry.resolve_directory(&source_dir).await?,
                dest_parent: self.registry.resolve_directory(&dest_dir).await?,
            }
        };

        let transfer = match &placement {
            Placement::Rename => {
                debug!(from = %source_name, to = %dest_name, kind = %node.kind(), %overwrite, "Renaming");
                Transfer::Rename
            }
            Placement::Move { dest_parent, .. } => {
                debug!(from = %old.path, to = %new_path, kind = %node.kind(), %overwrite, "Moving");
                Transfer::Move {
                    dest_parent: dest_parent.real_path(),
                }
            }
        };

        let reply = self
            .dispatch(node.kind(), &transfer, &old.real_path, &dest_name, overwrite)
            .await
            .map_err(|e| backend_failure(e, &old.path, &new_path))?;

        // Backend confirmed: swap in the new identity.
        let real_path = reconciled_real_path(&reply, &old.real_path);
        node.replace_identity(NodeIdentity {
            name: dest_name,
            path: new_path,
            real_path,
        });
        self.registry.relocate(&node, &old.path);
        if node.is_directory() {
            // Cached descendants are keyed by the old path.
            self.registry.evict_descendants(&old.path);
        }

        match placement {
            Placement::Rename => {
                if node.is_directory() {
                    self.invalidate(&node);
                }
                self.stats.record_rename();
            }
            Placement::Move {
                source_parent,
                dest_parent,
            } => {
                if node.kind() == NodeKind::File {
                    source_parent.remove_child(node.id());
                    dest_parent.add_child(node.id());
                }
                // The backend's structural side effects are not observable;
                // re-fetch all three listings.
                self.invalidate(&node);
                self.invalidate(&source_parent);
                self.invalidate(&dest_parent);

                self.registry.persist(&source_parent);
                self.registry.persist(&dest_parent);
                self.stats.record_move();
            }
        }

        self.registry.persist(&node);
        self.registry.flush();
        self.registry.mark_dirty(&source_dir);
        self.registry.mark_dirty(&dest_dir);
        Ok(())
    }

    /// Single dispatch point from (operation, kind) to a backend method.
    async fn dispatch(
        &self,
        kind: NodeKind,
        transfer: &Transfer,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let backend = self.backend.as_ref();
        match (transfer, kind) {
            (Transfer::Copy { dest_parent }, NodeKind::File) => {
                backend.copy_file(source_real_path, dest_parent, name, overwrite).await
            }
            (Transfer::Copy { dest_parent }, NodeKind::Directory) => {
                backend.copy_directory(source_real_path, dest_parent, name, overwrite).await
            }
            (Transfer::Move { dest_parent }, NodeKind::File) => {
                backend.move_file(source_real_path, dest_parent, name, overwrite).await
            }
            (Transfer::Move { dest_parent }, NodeKind::Directory) => {
                backend.move_directory(source_real_path, dest_parent, name, overwrite).await
            }
            (Transfer::Rename, NodeKind::File) => {
                backend.rename_file(source_real_path, name, overwrite).await
            }
            (Transfer::Rename, NodeKind::Directory) => {
                backend.rename_directory(source_real_path, name, overwrite).await
            }
        }
    }

    fn invalidate(&self, node: &Node) {
        if node.is_directory() {
            node.set_children_fetched(false);
            self.stats.record_invalidation();
        }
    }

    fn finish(&self, start: Instant, result: &TreeResult<()>) {
        if let Err(e) = result {
            self.stats.record_error();
            debug!(error = %e, "tree mutation failed");
        }
        self.stats.record_latency(start.elapsed());
    }
}

/// Real path to keep after a successful move or rename.
///
/// A reply without result items keeps the previous identifier.
fn reconciled_real_path(reply: &BackendReply, previous: &str) -> String {
    match reply.updated_real_path() {
        Ok(Some(updated)) => {
            if updated != previous {
                debug!(from = %previous, to = %updated, "Updating real path");
            }
            updated.to_string()
        }
        Ok(None) => previous.to_string(),
        Err(e) => {
            warn!(error = %e, real_path = %previous, "Keeping previous real path");
            previous.to_string()
        }
    }
}

/// Map a backend failure onto the paths involved in the operation.
fn backend_failure(err: BackendError, source_path: &str, dest_path: &str) -> TreeError {
    match err {
        BackendError::Conflict { .. } => TreeError::from_backend(err, dest_path),
        other => TreeError::from_backend(other, source_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ReplyItem;

    #[test]
    fn test_reconciled_real_path() {
        let reply = BackendReply::with_items(vec![ReplyItem::with_path("/new")]);
        assert_eq!(reconciled_real_path(&reply, "/old"), "/new");

        let reply = BackendReply::with_items(vec![ReplyItem::default()]);
        assert_eq!(reconciled_real_path(&reply, "/old"), "/old");

        assert_eq!(reconciled_real_path(&BackendReply::default(), "/old"), "/old");
    }

    #[test]
    fn test_backend_failure_mapping() {
        let err = backend_failure(
            BackendError::Conflict {
                name: "b".to_string(),
            },
            "/a",
            "/b",
        );
        assert!(matches!(err, TreeError::Conflict(p) if p == "/b"));

        let err = backend_failure(
            BackendError::NotFound {
                real_path: "/r".to_string(),
            },
            "/a",
            "/b",
        );
        assert!(matches!(err, TreeError::NotFound(p) if p == "/a"));

        let err = backend_failure(BackendError::Transport("reset".to_string()), "/a", "/b");
        assert!(matches!(err, TreeError::Backend(_)));
    }
}
