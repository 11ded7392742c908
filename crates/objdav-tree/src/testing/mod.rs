//! Testing utilities for code built on the tree.
//!
//! [`ScriptedBackend`] wraps any [`BackendClient`] and
//!
//! - records every call it receives, in order,
//! - can fail the next call without forwarding it,
//! - can replace the reply of the next successful call.
//!
//! # Usage
//!
//! ```
//! use objdav_tree::testing::ScriptedBackend;
//! use objdav_tree::{BackendReply, MemoryBackend, ReplyItem};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryBackend::new());
//! let backend = ScriptedBackend::new(store.clone());
//! backend.script_reply(BackendReply::with_items(vec![ReplyItem::with_path("/v2")]));
//! assert!(backend.calls().is_empty());
//! ```

use crate::backend::{BackendClient, BackendError, BackendReply, BackendResult};
use crate::overwrite::OverwritePolicy;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Which backend method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CopyFile,
    CopyDirectory,
    MoveFile,
    MoveDirectory,
    RenameFile,
    RenameDirectory,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendOp::CopyFile => "copy_file",
            BackendOp::CopyDirectory => "copy_directory",
            BackendOp::MoveFile => "move_file",
            BackendOp::MoveDirectory => "move_directory",
            BackendOp::RenameFile => "rename_file",
            BackendOp::RenameDirectory => "rename_directory",
        };
        f.write_str(name)
    }
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub op: BackendOp,
    pub source_real_path: String,
    /// `None` for renames.
    pub dest_parent_real_path: Option<String>,
    pub name: String,
    pub overwrite: OverwritePolicy,
}

/// What to do with the next call.
enum Script {
    Fail(BackendError),
    Reply(BackendReply),
}

/// Recording, scriptable wrapper around a backend.
pub struct ScriptedBackend {
    inner: Arc<dyn BackendClient>,
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Script>>,
}

impl ScriptedBackend {
    /// Wrap a backend; unscripted calls are forwarded unchanged.
    pub fn new(inner: Arc<dyn BackendClient>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail a future call with `err` without forwarding it.
    ///
    /// Scripts are consumed in the order they were queued.
    pub fn script_error(&self, err: BackendError) {
        self.script.lock().push_back(Script::Fail(err));
    }

    /// Forward a future call and answer with `reply` if it succeeds.
    pub fn script_reply(&self, reply: BackendReply) {
        self.script.lock().push_back(Script::Reply(reply));
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// The most recent call.
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(
        &self,
        op: BackendOp,
        source_real_path: &str,
        dest_parent_real_path: Option<&str>,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> Option<Script> {
        self.calls.lock().push(RecordedCall {
            op,
            source_real_path: source_real_path.to_string(),
            dest_parent_real_path: dest_parent_real_path.map(str::to_string),
            name: name.to_string(),
            overwrite,
        });
        self.script.lock().pop_front()
    }

    async fn forward(
        &self,
        script: Option<Script>,
        call: impl Future<Output = BackendResult<BackendReply>>,
    ) -> BackendResult<BackendReply> {
        match script {
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Reply(reply)) => call.await.map(|_| reply),
            None => call.await,
        }
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn copy_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(
            BackendOp::CopyFile,
            source_real_path,
            Some(dest_parent_real_path),
            name,
            overwrite,
        );
        self.forward(
            script,
            self.inner
                .copy_file(source_real_path, dest_parent_real_path, name, overwrite),
        )
        .await
    }

    async fn copy_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(
            BackendOp::CopyDirectory,
            source_real_path,
            Some(dest_parent_real_path),
            name,
            overwrite,
        );
        self.forward(
            script,
            self.inner
                .copy_directory(source_real_path, dest_parent_real_path, name, overwrite),
        )
        .await
    }

    async fn move_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(
            BackendOp::MoveFile,
            source_real_path,
            Some(dest_parent_real_path),
            name,
            overwrite,
        );
        self.forward(
            script,
            self.inner
                .move_file(source_real_path, dest_parent_real_path, name, overwrite),
        )
        .await
    }

    async fn move_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(
            BackendOp::MoveDirectory,
            source_real_path,
            Some(dest_parent_real_path),
            name,
            overwrite,
        );
        self.forward(
            script,
            self.inner
                .move_directory(source_real_path, dest_parent_real_path, name, overwrite),
        )
        .await
    }

    async fn rename_file(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(BackendOp::RenameFile, source_real_path, None, name, overwrite);
        self.forward(
            script,
            self.inner.rename_file(source_real_path, name, overwrite),
        )
        .await
    }

    async fn rename_directory(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        let script = self.record(
            BackendOp::RenameDirectory,
            source_real_path,
            None,
            name,
            overwrite,
        );
        self.forward(
            script,
            self.inner.rename_directory(source_real_path, name, overwrite),
        )
        .await
    }
}
