//! Registry consistency under sequences of operations and concurrent moves.

mod common;

use common::{assert_registry_consistent, Fixture};
use objdav_tree::{OverwritePolicy, TreeError};
use proptest::prelude::*;
use std::sync::Arc;

const SEED: &[&str] = &[
    "/a/one.txt",
    "/a/two.txt",
    "/a/inner/three.txt",
    "/b/four.txt",
    "/c/",
];

const SOURCES: &[&str] = &[
    "/a/one.txt",
    "/a/two.txt",
    "/a/inner",
    "/a/inner/three.txt",
    "/b/four.txt",
    "/b",
    "/c/x",
    "/c/y",
];

const DEST_DIRS: &[&str] = &["/a", "/a/inner", "/b", "/c", "/"];
const NAMES: &[&str] = &["x", "y", "one.txt", "inner"];

#[derive(Debug, Clone)]
enum Op {
    Copy(usize, usize, usize, bool),
    Move(usize, usize, usize, bool),
    Resolve(usize),
    List(usize),
}

fn op() -> impl Strategy<Value = Op> {
    let src = 0..SOURCES.len();
    let dir = 0..DEST_DIRS.len();
    let name = 0..NAMES.len();
    prop_oneof![
        (src.clone(), dir.clone(), name.clone(), any::<bool>())
            .prop_map(|(s, d, n, o)| Op::Copy(s, d, n, o)),
        (src.clone(), dir.clone(), name, any::<bool>())
            .prop_map(|(s, d, n, o)| Op::Move(s, d, n, o)),
        src.prop_map(Op::Resolve),
        dir.prop_map(Op::List),
    ]
}

fn destination(dir: usize, name: usize) -> String {
    let dir = DEST_DIRS[dir];
    if dir == "/" {
        format!("/{}", NAMES[name])
    } else {
        format!("{dir}/{}", NAMES[name])
    }
}

fn policy(overwrite: bool) -> OverwritePolicy {
    if overwrite {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::Fail
    }
}

async fn apply(fx: &Fixture, op: &Op) {
    let result = match *op {
        Op::Copy(s, d, n, o) => {
            fx.mutator
                .copy(SOURCES[s], &destination(d, n), policy(o))
                .await
        }
        Op::Move(s, d, n, o) => {
            fx.mutator
                .move_entry(SOURCES[s], &destination(d, n), policy(o))
                .await
        }
        Op::Resolve(s) => fx.registry.resolve(SOURCES[s]).await.map(|_| ()),
        Op::List(d) => match fx.registry.resolve_directory(DEST_DIRS[d]).await {
            Ok(dir) => fx.registry.children(&dir).await.map(|_| ()),
            Err(e) => Err(e),
        },
    };
    // Rejections are expected; only the resulting state is checked.
    if let Err(e) = result {
        assert!(
            !matches!(e, TreeError::InvalidState(_)),
            "{op:?} failed unexpectedly: {e}"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registry_tracks_store_across_operations(ops in prop::collection::vec(op(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let fx = Fixture::with_paths(SEED);
            for op in &ops {
                apply(&fx, op).await;
                assert_registry_consistent(&fx);
            }
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_of_distinct_files() {
    let paths: Vec<String> = (0..32).map(|i| format!("/inbox/{i:02}.txt")).collect();
    let mut seed: Vec<&str> = paths.iter().map(String::as_str).collect();
    seed.push("/done/");
    let fx = Arc::new(Fixture::with_paths(&seed));
    fx.fetched_dir("/inbox").await;
    fx.fetched_dir("/done").await;

    let mut handles = Vec::new();
    for path in paths.clone() {
        let fx = Arc::clone(&fx);
        handles.push(tokio::spawn(async move {
            let dest = path.replace("/inbox/", "/done/");
            fx.mutator
                .move_entry(&path, &dest, OverwritePolicy::Fail)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let done = fx.registry.resolve_directory("/done").await.unwrap();
    assert_eq!(done.children().len(), 32);
    assert_eq!(fx.registry.children(&done).await.unwrap().len(), 32);
    let inbox = fx.registry.resolve_directory("/inbox").await.unwrap();
    assert!(fx.registry.children(&inbox).await.unwrap().is_empty());
    assert_eq!(fx.mutator.stats().snapshot().moves, 32);
    assert_registry_consistent(&fx);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_copies_to_one_name_allow_a_single_winner() {
    let fx = Arc::new(Fixture::with_paths(&["/src/a.txt", "/src/b.txt", "/dst/"]));

    let mut handles = Vec::new();
    for source in ["/src/a.txt", "/src/b.txt"] {
        let fx = Arc::clone(&fx);
        handles.push(tokio::spawn(async move {
            fx.mutator
                .copy(source, "/dst/winner.txt", OverwritePolicy::Fail)
                .await
        }));
    }
    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(TreeError::Conflict(path)) => assert_eq!(path, "/dst/winner.txt"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_registry_consistent(&fx);
}
