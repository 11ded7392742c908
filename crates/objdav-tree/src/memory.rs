//! In-process object store.
//!
//! [`MemoryBackend`] implements both [`BackendClient`] and [`NodeLoader`]
//! over a map of real path → object. Like hosted object stores, it derives
//! an object's real path from its parent's real path plus an opaque token, so
//! moving a directory changes the real path of the directory and of every
//! descendant, while renaming keeps real paths stable.
//!
//! It backs the `objdav` binary and the integration tests.

use crate::backend::{
    BackendClient, BackendError, BackendReply, BackendResult, NodeLoader, ObjectInfo, ReplyItem,
};
use crate::node::NodeKind;
use crate::overwrite::OverwritePolicy;
use crate::path;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Real path of the store root.
pub const MEMORY_ROOT: &str = "/";

#[derive(Debug, Clone)]
struct StoredObject {
    name: String,
    kind: NodeKind,
    /// `None` for the root.
    parent: Option<String>,
    size: u64,
}

type ObjectMap = BTreeMap<String, StoredObject>;

/// In-memory object store with store-assigned real paths.
#[derive(Debug)]
pub struct MemoryBackend {
    objects: RwLock<ObjectMap>,
    next_token: AtomicU64,
    /// Error returned by the next mutating call, for failure injection.
    fail_next: Mutex<Option<BackendError>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a store containing only the root directory.
    pub fn new() -> Self {
        let mut objects = ObjectMap::new();
        objects.insert(
            MEMORY_ROOT.to_string(),
            StoredObject {
                name: String::new(),
                kind: NodeKind::Directory,
                parent: None,
                size: 0,
            },
        );
        Self {
            objects: RwLock::new(objects),
            next_token: AtomicU64::new(1),
            fail_next: Mutex::new(None),
        }
    }

    /// Real path of the root directory.
    pub fn root_real_path(&self) -> &'static str {
        MEMORY_ROOT
    }

    /// Make the next mutating call fail with `err` without touching the store.
    pub fn fail_next(&self, err: BackendError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Create a directory. Returns its real path.
    pub fn create_directory(&self, parent_real_path: &str, name: &str) -> BackendResult<String> {
        self.create(parent_real_path, name, NodeKind::Directory, 0)
    }

    /// Create a file of `size` bytes. Returns its real path.
    pub fn create_file(&self, parent_real_path: &str, name: &str, size: u64) -> BackendResult<String> {
        self.create(parent_real_path, name, NodeKind::File, size)
    }

    /// Create the entry named by a virtual path, with missing parents.
    ///
    /// A trailing `/` creates a directory, anything else an empty file.
    /// Existing entries are reused. Returns the real path.
    pub fn seed(&self, virtual_path: &str) -> BackendResult<String> {
        let is_dir = virtual_path.ends_with('/');
        let normalized = path::normalize(virtual_path);
        let names: Vec<&str> = path::components(&normalized).collect();

        let mut current = MEMORY_ROOT.to_string();
        for (i, name) in names.iter().enumerate() {
            let last = i + 1 == names.len();
            let existing = {
                let objects = self.objects.read();
                find_child(&objects, &current, name)
            };
            current = match existing {
                Some(real) => real,
                None if last && !is_dir => self.create_file(&current, name, 0)?,
                None => self.create_directory(&current, name)?,
            };
        }
        Ok(current)
    }

    /// Look up an object by virtual path, walking names from the root.
    pub fn stat(&self, virtual_path: &str) -> Option<ObjectInfo> {
        let objects = self.objects.read();
        let mut current = MEMORY_ROOT.to_string();
        for name in path::components(virtual_path) {
            current = find_child(&objects, &current, name)?;
        }
        objects.get(&current).map(|obj| ObjectInfo {
            name: obj.name.clone(),
            real_path: current.clone(),
            kind: obj.kind,
        })
    }

    /// Number of stored objects, root included.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    fn create(&self, parent_real_path: &str, name: &str, kind: NodeKind, size: u64) -> BackendResult<String> {
        if !path::is_valid_name(name) {
            return Err(invalid_name(name));
        }
        let mut objects = self.objects.write();
        require_directory(&objects, parent_real_path)?;
        if find_child(&objects, parent_real_path, name).is_some() {
            return Err(BackendError::Conflict {
                name: name.to_string(),
            });
        }
        let real_path = self.allocate(parent_real_path);
        objects.insert(
            real_path.clone(),
            StoredObject {
                name: name.to_string(),
                kind,
                parent: Some(parent_real_path.to_string()),
                size,
            },
        );
        trace!(real_path = %real_path, name, %kind, "object created");
        Ok(real_path)
    }

    fn allocate(&self, parent_real_path: &str) -> String {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        path::join(parent_real_path, &format!("{token:06x}"))
    }

    fn injected_failure(&self) -> BackendResult<()> {
        match self.fail_next.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn copy(
        &self,
        kind: NodeKind,
        source: &str,
        dest_parent: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.injected_failure()?;
        if !path::is_valid_name(name) {
            return Err(invalid_name(name));
        }
        let mut objects = self.objects.write();
        require_kind(&objects, source, kind)?;
        require_directory(&objects, dest_parent)?;
        if kind.is_directory() && (dest_parent == source || path::is_descendant(dest_parent, source)) {
            return Err(BackendError::Api {
                code: 400,
                message: "cannot copy a directory into itself".to_string(),
            });
        }
        if find_child(&objects, dest_parent, name).as_deref() == Some(source) {
            return Err(BackendError::Api {
                code: 403,
                message: "source and destination are the same".to_string(),
            });
        }
        clear_destination(&mut objects, dest_parent, name, Some(source), overwrite)?;

        let subtree: Vec<(String, StoredObject)> = objects
            .range(source.to_string()..)
            .take_while(|(key, _)| *key == source || path::is_descendant(key, source))
            .map(|(key, obj)| (key.clone(), obj.clone()))
            .collect();

        let mut renamed: HashMap<String, String> = HashMap::new();
        let mut new_root = String::new();
        for (old_key, mut obj) in subtree {
            let new_parent = if old_key == source {
                obj.name = name.to_string();
                dest_parent.to_string()
            } else {
                let old_parent = obj.parent.clone().unwrap_or_default();
                renamed.get(&old_parent).cloned().unwrap_or(old_parent)
            };
            let new_key = self.allocate(&new_parent);
            obj.parent = Some(new_parent);
            if old_key == source {
                new_root.clone_from(&new_key);
            }
            renamed.insert(old_key, new_key.clone());
            objects.insert(new_key, obj);
        }

        debug!(source, dest_parent, name, %kind, new_real_path = %new_root, "copied");
        Ok(reply_for(&objects, &new_root))
    }

    fn relocate(
        &self,
        kind: NodeKind,
        source: &str,
        dest_parent: Option<&str>,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.injected_failure()?;
        if !path::is_valid_name(name) {
            return Err(invalid_name(name));
        }
        let mut objects = self.objects.write();
        require_kind(&objects, source, kind)?;
        let current_parent = objects
            .get(source)
            .and_then(|obj| obj.parent.clone())
            .ok_or_else(|| BackendError::Api {
                code: 400,
                message: "cannot move the root".to_string(),
            })?;
        let dest_parent = dest_parent.unwrap_or(current_parent.as_str()).to_string();
        require_directory(&objects, &dest_parent)?;
        if dest_parent == source || path::is_descendant(&dest_parent, source) {
            return Err(BackendError::Api {
                code: 400,
                message: "cannot move a directory into itself".to_string(),
            });
        }
        clear_destination(&mut objects, &dest_parent, name, Some(source), overwrite)?;

        if dest_parent == current_parent {
            if let Some(obj) = objects.get_mut(source) {
                obj.name = name.to_string();
            }
            debug!(source, name, %kind, "renamed");
            return Ok(reply_for(&objects, source));
        }

        let token = source.rsplit('/').next().unwrap_or_default();
        let new_root = path::join(&dest_parent, token);
        let keys: Vec<String> = objects
            .range(source.to_string()..)
            .take_while(|(key, _)| *key == source || path::is_descendant(key, source))
            .map(|(key, _)| key.clone())
            .collect();
        for old_key in keys {
            let Some(mut obj) = objects.remove(&old_key) else {
                continue;
            };
            let new_key = format!("{new_root}{}", &old_key[source.len()..]);
            if old_key == source {
                obj.name = name.to_string();
                obj.parent = Some(dest_parent.clone());
            } else if let Some(parent) = &obj.parent {
                obj.parent = Some(format!("{new_root}{}", &parent[source.len()..]));
            }
            objects.insert(new_key, obj);
        }

        debug!(source, dest_parent = %dest_parent, name, %kind, new_real_path = %new_root, "moved");
        Ok(reply_for(&objects, &new_root))
    }
}

fn invalid_name(name: &str) -> BackendError {
    BackendError::Api {
        code: 400,
        message: format!("invalid name: {name:?}"),
    }
}

fn find_child(objects: &ObjectMap, parent: &str, name: &str) -> Option<String> {
    objects
        .range(parent.to_string()..)
        .skip_while(|(key, _)| *key == parent)
        .take_while(|(key, _)| path::is_descendant(key, parent))
        .find(|(_, obj)| obj.parent.as_deref() == Some(parent) && obj.name == name)
        .map(|(key, _)| key.clone())
}

fn require_kind(objects: &ObjectMap, real_path: &str, kind: NodeKind) -> BackendResult<()> {
    match objects.get(real_path) {
        Some(obj) if obj.kind == kind => Ok(()),
        Some(obj) => Err(BackendError::Api {
            code: 400,
            message: format!("{real_path} is a {}, not a {kind}", obj.kind),
        }),
        None => Err(BackendError::NotFound {
            real_path: real_path.to_string(),
        }),
    }
}

fn require_directory(objects: &ObjectMap, real_path: &str) -> BackendResult<()> {
    match objects.get(real_path) {
        Some(obj) if obj.kind.is_directory() => Ok(()),
        _ => Err(BackendError::NotFound {
            real_path: real_path.to_string(),
        }),
    }
}

/// Make room for `name` under `parent`, honoring the overwrite policy.
///
/// `source` is the object being renamed/moved; finding it under the target
/// name is not a conflict.
fn clear_destination(
    objects: &mut ObjectMap,
    parent: &str,
    name: &str,
    source: Option<&str>,
    overwrite: OverwritePolicy,
) -> BackendResult<()> {
    let Some(existing) = find_child(objects, parent, name) else {
        return Ok(());
    };
    if let Some(source) = source {
        if source == existing {
            return Ok(());
        }
        if path::is_descendant(source, &existing) {
            return Err(BackendError::Api {
                code: 400,
                message: "cannot overwrite an ancestor of the source".to_string(),
            });
        }
    }
    if !overwrite.allows_overwrite() {
        return Err(BackendError::Conflict {
            name: name.to_string(),
        });
    }
    objects.retain(|key, _| *key != existing && !path::is_descendant(key, &existing));
    trace!(real_path = %existing, "destination overwritten");
    Ok(())
}

fn reply_for(objects: &ObjectMap, real_path: &str) -> BackendReply {
    let item = match objects.get(real_path) {
        Some(obj) => ReplyItem {
            path: Some(real_path.to_string()),
            name: Some(obj.name.clone()),
            size: (!obj.kind.is_directory()).then_some(obj.size),
            ..ReplyItem::default()
        },
        None => ReplyItem::with_path(real_path),
    };
    BackendReply::with_items(vec![item])
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn copy_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.copy(NodeKind::File, source_real_path, dest_parent_real_path, name, overwrite)
    }

    async fn copy_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.copy(NodeKind::Directory, source_real_path, dest_parent_real_path, name, overwrite)
    }

    async fn move_file(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.relocate(NodeKind::File, source_real_path, Some(dest_parent_real_path), name, overwrite)
    }

    async fn move_directory(
        &self,
        source_real_path: &str,
        dest_parent_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.relocate(NodeKind::Directory, source_real_path, Some(dest_parent_real_path), name, overwrite)
    }

    async fn rename_file(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.relocate(NodeKind::File, source_real_path, None, name, overwrite)
    }

    async fn rename_directory(
        &self,
        source_real_path: &str,
        name: &str,
        overwrite: OverwritePolicy,
    ) -> BackendResult<BackendReply> {
        self.relocate(NodeKind::Directory, source_real_path, None, name, overwrite)
    }
}

#[async_trait]
impl NodeLoader for MemoryBackend {
    async fn lookup(&self, parent_real_path: &str, name: &str) -> BackendResult<Option<ObjectInfo>> {
        let objects = self.objects.read();
        require_directory(&objects, parent_real_path)?;
        Ok(find_child(&objects, parent_real_path, name).and_then(|real_path| {
            objects.get(&real_path).map(|obj| ObjectInfo {
                name: obj.name.clone(),
                real_path: real_path.clone(),
                kind: obj.kind,
            })
        }))
    }

    async fn list(&self, parent_real_path: &str) -> BackendResult<Vec<ObjectInfo>> {
        let objects = self.objects.read();
        require_directory(&objects, parent_real_path)?;
        Ok(objects
            .range(parent_real_path.to_string()..)
            .skip_while(|(key, _)| *key == parent_real_path)
            .take_while(|(key, _)| path::is_descendant(key, parent_real_path))
            .filter(|(_, obj)| obj.parent.as_deref() == Some(parent_real_path))
            .map(|(key, obj)| ObjectInfo {
                name: obj.name.clone(),
                real_path: key.clone(),
                kind: obj.kind,
            })
            .collect())
    }
}
