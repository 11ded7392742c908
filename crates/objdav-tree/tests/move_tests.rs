//! MOVE and rename tests for the tree mutator.
//!
//! Covers:
//! - Cross-directory moves of files and directories
//! - Same-directory renames
//! - Real path reconciliation from backend replies
//! - Failure paths leaving the registry untouched

mod common;

use common::{assert_registry_consistent, Fixture};
use objdav_tree::testing::BackendOp;
use objdav_tree::{BackendError, BackendReply, OverwritePolicy, ReplyItem, TreeError};

// ============================================================================
// File moves
// ============================================================================

#[tokio::test]
async fn test_move_file_takes_real_path_from_reply() {
    let fx = Fixture::with_paths(&["/docs/report.txt", "/archive/"]);
    let docs = fx.fetched_dir("/docs").await;
    let archive = fx.fetched_dir("/archive").await;
    let node = fx.registry.resolve("/docs/report.txt").await.unwrap();

    fx.backend.script_reply(BackendReply::with_items(vec![ReplyItem::with_path(
        "/archive/report.txt_v2",
    )]));
    fx.mutator
        .move_entry("/docs/report.txt", "/archive/report.txt", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(node.path(), "/archive/report.txt");
    assert_eq!(node.name(), "report.txt");
    assert_eq!(node.real_path(), "/archive/report.txt_v2");
    assert!(!docs.children_fetched());
    assert!(!archive.children_fetched());

    assert!(fx.registry.get("/docs/report.txt").is_none());
    assert_eq!(fx.registry.get("/archive/report.txt").unwrap().id(), node.id());
    assert!(!docs.has_child(node.id()));
    assert!(archive.has_child(node.id()));

    let call = fx.backend.last_call().unwrap();
    assert_eq!(call.op, BackendOp::MoveFile);
    assert_eq!(call.dest_parent_real_path, Some(archive.real_path()));
    assert_eq!(call.name, "report.txt");
}

#[tokio::test]
async fn test_move_file_matches_store() {
    let fx = Fixture::with_paths(&["/from/old.txt", "/to/"]);
    let node = fx.registry.resolve("/from/old.txt").await.unwrap();

    fx.mutator
        .move_entry("/from/old.txt", "/to/new.txt", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert!(fx.store.stat("/from/old.txt").is_none());
    assert_eq!(node.real_path(), fx.store_real_path("/to/new.txt"));
    assert_registry_consistent(&fx);
}

#[tokio::test]
async fn test_move_persists_touched_nodes() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/archive/"]);
    let docs = fx.fetched_dir("/docs").await;
    let archive = fx.fetched_dir("/archive").await;
    let node = fx.registry.resolve("/docs/a.txt").await.unwrap();

    fx.mutator
        .move_entry("/docs/a.txt", "/archive/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(fx.registry.pending_count(), 0);
    let record = fx.registry.persisted(node.id()).unwrap();
    assert_eq!(record.path, "/archive/a.txt");
    assert_eq!(record.real_path, node.real_path());
    assert_eq!(
        fx.registry.persisted(docs.id()).unwrap().children_fetched,
        Some(false)
    );
    assert_eq!(
        fx.registry.persisted(archive.id()).unwrap().children_fetched,
        Some(false)
    );
    assert_eq!(fx.registry.version("/docs"), 1);
    assert_eq!(fx.registry.version("/archive"), 1);
}

// ============================================================================
// Renames
// ============================================================================

#[tokio::test]
async fn test_rename_file_in_place() {
    let fx = Fixture::with_paths(&["/docs/draft.txt"]);
    let docs = fx.fetched_dir("/docs").await;
    let node = fx.registry.resolve("/docs/draft.txt").await.unwrap();
    let real_path = node.real_path();

    fx.mutator
        .move_entry("/docs/draft.txt", "/docs/final.txt", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(fx.backend.last_call().unwrap().op, BackendOp::RenameFile);
    assert_eq!(node.path(), "/docs/final.txt");
    assert_eq!(node.real_path(), real_path);

    // The parent's listing still holds the same node.
    assert!(docs.children_fetched());
    let names: Vec<String> = fx
        .registry
        .children(&docs)
        .await
        .unwrap()
        .iter()
        .map(|n| n.name())
        .collect();
    assert_eq!(names, vec!["final.txt".to_string()]);
    assert_eq!(fx.registry.version("/docs"), 2);
    assert_registry_consistent(&fx);
}

#[tokio::test]
async fn test_rename_directory_evicts_cached_descendants() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/docs/sub/b.txt"]);
    let docs = fx.fetched_dir("/docs").await;
    let a = fx.registry.resolve("/docs/a.txt").await.unwrap();
    fx.registry.resolve("/docs/sub/b.txt").await.unwrap();

    fx.mutator
        .move_entry("/docs", "/papers", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(fx.backend.last_call().unwrap().op, BackendOp::RenameDirectory);
    assert_eq!(docs.path(), "/papers");
    assert!(!docs.children_fetched());
    assert!(fx.registry.get("/docs/a.txt").is_none());
    assert!(fx.registry.get("/docs/sub/b.txt").is_none());
    assert!(fx.registry.get_by_id(a.id()).is_none());

    let b = fx.registry.resolve("/papers/sub/b.txt").await.unwrap();
    assert_eq!(b.real_path(), fx.store_real_path("/papers/sub/b.txt"));
    assert_registry_consistent(&fx);
}

#[tokio::test]
async fn test_reply_without_items_keeps_real_path() {
    let fx = Fixture::with_paths(&["/a.txt"]);
    let node = fx.registry.resolve("/a.txt").await.unwrap();
    let real_path = node.real_path();

    fx.backend.script_reply(BackendReply::default());
    fx.mutator
        .move_entry("/a.txt", "/b.txt", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(node.path(), "/b.txt");
    assert_eq!(node.real_path(), real_path);
}

// ============================================================================
// Directory moves
// ============================================================================

#[tokio::test]
async fn test_move_directory_refreshes_subtree() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/docs/sub/b.txt", "/archive/"]);
    let docs = fx.fetched_dir("/docs").await;
    let root = fx.fetched_dir("/").await;
    let archive = fx.fetched_dir("/archive").await;
    let old_real_path = docs.real_path();
    fx.registry.resolve("/docs/sub/b.txt").await.unwrap();

    fx.mutator
        .move_entry("/docs", "/archive/docs", OverwritePolicy::Fail)
        .await
        .unwrap();

    assert_eq!(fx.backend.last_call().unwrap().op, BackendOp::MoveDirectory);
    assert_eq!(docs.path(), "/archive/docs");
    assert_ne!(docs.real_path(), old_real_path);
    assert_eq!(docs.real_path(), fx.store_real_path("/archive/docs"));
    assert!(!docs.children_fetched());
    assert!(!root.children_fetched());
    assert!(!archive.children_fetched());
    assert!(fx.registry.get("/docs/sub/b.txt").is_none());

    // Descendants resolve again with the store's new real paths.
    let b = fx.registry.resolve("/archive/docs/sub/b.txt").await.unwrap();
    assert_eq!(b.real_path(), fx.store_real_path("/archive/docs/sub/b.txt"));

    let listing: Vec<String> = fx
        .registry
        .children(&archive)
        .await
        .unwrap()
        .iter()
        .map(|n| n.path())
        .collect();
    assert_eq!(listing, vec!["/archive/docs".to_string()]);
    assert_registry_consistent(&fx);
}

// ============================================================================
// Overwrite
// ============================================================================

#[tokio::test]
async fn test_move_conflict_without_overwrite() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/archive/a.txt"]);
    let docs = fx.fetched_dir("/docs").await;
    let archive = fx.fetched_dir("/archive").await;
    let node = fx.registry.resolve("/docs/a.txt").await.unwrap();
    let before = node.identity();

    let err = fx
        .mutator
        .move_entry("/docs/a.txt", "/archive/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap_err();

    assert!(matches!(err, TreeError::Conflict(ref p) if p == "/archive/a.txt"), "{err}");
    assert_eq!(node.identity(), before);
    assert!(docs.children_fetched());
    assert!(archive.children_fetched());
    assert_eq!(fx.backend.last_call().unwrap().overwrite, OverwritePolicy::Fail);
    assert_eq!(fx.mutator.stats().snapshot().errors, 1);
    assert_registry_consistent(&fx);
}

#[tokio::test]
async fn test_move_overwrite_replaces_cached_destination() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/archive/a.txt"]);
    let archive = fx.fetched_dir("/archive").await;
    let source = fx.registry.resolve("/docs/a.txt").await.unwrap();
    let replaced = fx.registry.resolve("/archive/a.txt").await.unwrap();

    fx.mutator
        .move_entry("/docs/a.txt", "/archive/a.txt", OverwritePolicy::Overwrite)
        .await
        .unwrap();

    assert_eq!(fx.backend.last_call().unwrap().overwrite, OverwritePolicy::Overwrite);
    assert_eq!(fx.registry.get("/archive/a.txt").unwrap().id(), source.id());
    assert!(fx.registry.get_by_id(replaced.id()).is_none());
    assert!(!archive.has_child(replaced.id()));
    assert_registry_consistent(&fx);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_backend_failure_changes_nothing() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/archive/"]);
    let docs = fx.fetched_dir("/docs").await;
    let archive = fx.fetched_dir("/archive").await;
    let node = fx.registry.resolve("/docs/a.txt").await.unwrap();
    let before = node.identity();
    let entries = fx.registry.entries();

    fx.backend
        .script_error(BackendError::Transport("connection reset".to_string()));
    let err = fx
        .mutator
        .move_entry("/docs/a.txt", "/archive/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap_err();

    assert!(matches!(err, TreeError::Backend(_)), "{err}");
    assert_eq!(node.identity(), before);
    assert!(docs.children_fetched());
    assert!(archive.children_fetched());
    assert_eq!(fx.registry.entries(), entries);
    assert_eq!(fx.registry.persisted_count(), 0);
    assert_eq!(fx.registry.version("/docs"), 0);
}

#[tokio::test]
async fn test_missing_source_never_reaches_backend() {
    let fx = Fixture::with_paths(&["/archive/"]);
    let err = fx
        .mutator
        .move_entry("/docs/a.txt", "/archive/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NotFound(ref p) if p == "/docs/a.txt"), "{err}");
    assert_eq!(fx.backend.call_count(), 0);
}

#[tokio::test]
async fn test_missing_destination_parent_never_reaches_backend() {
    let fx = Fixture::with_paths(&["/docs/a.txt"]);
    let err = fx
        .mutator
        .move_entry("/docs/a.txt", "/nowhere/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NotFound(_)), "{err}");
    assert_eq!(fx.backend.call_count(), 0);
}

#[tokio::test]
async fn test_destination_parent_is_a_file() {
    let fx = Fixture::with_paths(&["/docs/a.txt", "/notes.txt"]);
    let err = fx
        .mutator
        .move_entry("/docs/a.txt", "/notes.txt/a.txt", OverwritePolicy::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::NotADirectory(_)), "{err}");
    assert_eq!(fx.backend.call_count(), 0);
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let fx = Fixture::with_paths(&["/docs/sub/"]);
    for dest in ["/docs/sub/docs", "/docs", "/"] {
        let err = fx
            .mutator
            .move_entry("/docs", dest, OverwritePolicy::Overwrite)
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidPath(_)), "{dest}: {err}");
    }
    let err = fx
        .mutator
        .move_entry("/docs/sub", "/docs", OverwritePolicy::Overwrite)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidPath(_)), "{err}");
    assert_eq!(fx.backend.call_count(), 0);
}

#[tokio::test]
async fn test_root_cannot_be_moved() {
    let fx = Fixture::with_paths(&["/docs/"]);
    let err = fx
        .mutator
        .move_entry("/", "/docs/root", OverwritePolicy::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidPath(_)), "{err}");
}
