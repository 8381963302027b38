// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage tree and content buffers for the in-memory filesystem
//!
//! Nodes are kept in a `BTreeMap` keyed by clean absolute path. There are no child
//! pointers: the children of a directory are the keys found by a prefix range scan
//! that have no further separator. Every structural change takes the tree-wide write
//! lock for its whole duration, so a failed change leaves the tree untouched.
//!
//! File bytes live in [`Content`] buffers behind their own lock. A node holds an
//! `Arc` to its buffer and every open handle holds another, so a handle keeps
//! working after its node is renamed or removed.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use agentfs_vfs::{FileMode, FsError, FsResult, Metadata, OpenFlags, PathResolver};

#[derive(Debug)]
struct ContentInner {
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// Mutable byte storage shared by a node and all handles opened on it
#[derive(Debug)]
pub struct Content {
    inner: Mutex<ContentInner>,
}

impl Content {
    pub fn new() -> Self {
        Self::with_bytes(Vec::new())
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            inner: Mutex::new(ContentInner {
                bytes,
                modified: SystemTime::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> u64 {
        self.lock().bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.lock().bytes.is_empty()
    }

    pub fn modified(&self) -> SystemTime {
        self.lock().modified
    }

    /// Copies bytes starting at `offset` into `buf`; 0 at or past the end.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let inner = self.lock();
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= inner.bytes.len() {
            return 0;
        }
        let end = std::cmp::min(start + buf.len(), inner.bytes.len());
        let n = end - start;
        buf[..n].copy_from_slice(&inner.bytes[start..end]);
        n
    }

    /// Writes `data` at `offset`, zero-filling any gap past the current end.
    ///
    /// Fails with `ResourceExhausted` when the buffer cannot grow that far.
    pub fn write_at(&self, data: &[u8], offset: u64) -> FsResult<usize> {
        let start = usize::try_from(offset).map_err(|_| FsError::ResourceExhausted)?;
        let end = start.checked_add(data.len()).ok_or(FsError::ResourceExhausted)?;

        let mut inner = self.lock();
        let len = inner.bytes.len();
        if end > len {
            inner.bytes.try_reserve(end - len).map_err(|err| {
                tracing::warn!(offset, size = data.len(), error = %err, "cannot grow file content");
                FsError::ResourceExhausted
            })?;
            inner.bytes.resize(end, 0);
        }
        inner.bytes[start..end].copy_from_slice(data);
        inner.modified = SystemTime::now();
        Ok(data.len())
    }

    pub fn truncate(&self) {
        let mut inner = self.lock();
        inner.bytes.clear();
        inner.modified = SystemTime::now();
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

/// A path's record in the storage tree
#[derive(Clone, Debug)]
pub struct Node {
    path: String,
    mode: FileMode,
    content: Option<Arc<Content>>,
    created: SystemTime,
}

impl Node {
    fn directory(path: String, perm: u32) -> Self {
        Self {
            path,
            mode: FileMode::dir(perm),
            content: None,
            created: SystemTime::now(),
        }
    }

    fn with_content(path: String, mode: FileMode, bytes: Vec<u8>) -> Self {
        Self {
            path,
            mode,
            content: Some(Arc::new(Content::with_bytes(bytes))),
            created: SystemTime::now(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn kind(&self) -> NodeKind {
        if self.mode.is_dir() {
            NodeKind::Directory
        } else if self.mode.is_symlink() {
            NodeKind::Symlink
        } else {
            NodeKind::File
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == NodeKind::Symlink
    }

    /// Content buffer of a file or symlink; `None` for directories
    pub fn content(&self) -> Option<&Arc<Content>> {
        self.content.as_ref()
    }

    /// The symlink target stored as the node's content
    pub fn link_target(&self) -> Option<String> {
        if !self.is_symlink() {
            return None;
        }
        self.content
            .as_ref()
            .map(|content| String::from_utf8_lossy(&content.to_vec()).into_owned())
    }

    pub fn metadata(&self, paths: &PathResolver) -> Metadata {
        let (size, modified) = match &self.content {
            Some(content) => (content.len(), content.modified()),
            None => (0, self.created),
        };
        Metadata {
            name: paths.base(&self.path),
            size,
            mode: self.mode,
            modified,
        }
    }
}

/// Path-indexed node store shared by every view of one in-memory filesystem
#[derive(Debug)]
pub struct StorageTree {
    paths: PathResolver,
    dir_perm: u32,
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl StorageTree {
    pub fn new(paths: PathResolver, dir_perm: u32) -> Self {
        let root = paths.root();
        let mut nodes = BTreeMap::new();
        nodes.insert(root.clone(), Node::directory(root, dir_perm));
        Self {
            paths,
            dir_perm,
            nodes: RwLock::new(nodes),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_root(&self, path: &str) -> bool {
        path == self.paths.root()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, path: &str) -> Option<Node> {
        self.read().get(&self.paths.clean(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read().contains_key(&self.paths.clean(path))
    }

    /// Creates a node at `path`.
    ///
    /// Directory modes are idempotent. Anything else requires `CREATE`; an existing
    /// file is returned unchanged unless `EXCLUSIVE` is also set. Missing ancestors
    /// are created as directories.
    pub fn new_node(&self, path: &str, mode: FileMode, flags: OpenFlags) -> FsResult<Node> {
        self.insert(path, mode, flags, Vec::new())
    }

    /// Atomically creates a symlink whose content is `target`.
    pub fn new_symlink(&self, path: &str, target: &str) -> FsResult<Node> {
        self.insert(
            path,
            FileMode::symlink(0o777),
            OpenFlags::CREATE | OpenFlags::EXCLUSIVE,
            target.as_bytes().to_vec(),
        )
    }

    fn insert(&self, path: &str, mode: FileMode, flags: OpenFlags, bytes: Vec<u8>) -> FsResult<Node> {
        let path = self.paths.clean(path);
        let mut nodes = self.write();

        if let Some(existing) = nodes.get(&path) {
            if mode.is_dir() {
                return if existing.is_dir() {
                    Ok(existing.clone())
                } else {
                    Err(FsError::AlreadyExists)
                };
            }
            if existing.is_dir() {
                return Err(FsError::IsADirectory);
            }
            if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) {
                return Err(FsError::AlreadyExists);
            }
            return Ok(existing.clone());
        }

        if !mode.is_dir() && !flags.contains(OpenFlags::CREATE) {
            return Err(FsError::NotFound);
        }

        let missing = self.missing_ancestors(&nodes, &path)?;
        for dir in missing {
            tracing::debug!(path = %dir, "creating implicit directory");
            nodes.insert(dir.clone(), Node::directory(dir, self.dir_perm));
        }

        let node = if mode.is_dir() {
            Node::directory(path.clone(), mode.perm())
        } else {
            Node::with_content(path.clone(), mode, bytes)
        };
        tracing::debug!(path = %path, mode = %mode, "created node");
        nodes.insert(path, node.clone());
        Ok(node)
    }

    /// Ancestors of `path` that do not exist yet, shallowest first.
    ///
    /// Fails with `NotADirectory` if an existing ancestor is not a directory.
    fn missing_ancestors(&self, nodes: &BTreeMap<String, Node>, path: &str) -> FsResult<Vec<String>> {
        let mut missing = Vec::new();
        let mut current = self.paths.dir(path);
        loop {
            match nodes.get(&current) {
                Some(node) if node.is_dir() => break,
                Some(_) => return Err(FsError::NotADirectory),
                None => missing.push(current.clone()),
            }
            if self.is_root(&current) {
                break;
            }
            current = self.paths.dir(&current);
        }
        missing.reverse();
        Ok(missing)
    }

    fn child_prefix(&self, path: &str) -> String {
        if self.is_root(path) {
            path.to_string()
        } else {
            format!("{}{}", path, self.paths.separator())
        }
    }

    /// Keys strictly below `path`, in key order
    fn descendants(&self, nodes: &BTreeMap<String, Node>, path: &str) -> Vec<String> {
        let prefix = self.child_prefix(path);
        nodes
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| key.as_str() != path)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn has_descendants(&self, nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        let prefix = self.child_prefix(path);
        nodes
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix))
            .any(|(key, _)| key.as_str() != path)
    }

    /// Direct children of `path`, ordered by name
    pub fn children(&self, path: &str) -> Vec<Node> {
        let path = self.paths.clean(path);
        let prefix = self.child_prefix(&path);
        let sep = self.paths.separator();
        self.read()
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| {
                let rest = &key[prefix.len()..];
                !rest.is_empty() && !rest.contains(sep)
            })
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Moves `from`, and everything below it when it is a directory, to `to`.
    pub fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = self.paths.clean(from);
        let to = self.paths.clean(to);
        let mut nodes = self.write();

        let src_is_dir = nodes.get(&from).ok_or(FsError::NotFound)?.is_dir();
        if from == to {
            return Ok(());
        }
        if self.is_root(&from) || self.is_root(&to) {
            return Err(FsError::InvalidArgument);
        }
        if src_is_dir && self.paths.is_within(&from, &to) {
            return Err(FsError::InvalidArgument);
        }

        if let Some(dst) = nodes.get(&to) {
            match (src_is_dir, dst.is_dir()) {
                (true, true) if self.has_descendants(&nodes, &to) => return Err(FsError::NotEmpty),
                (true, false) => return Err(FsError::NotADirectory),
                (false, true) => return Err(FsError::IsADirectory),
                _ => {}
            }
        }
        let missing = self.missing_ancestors(&nodes, &to)?;

        // Every check has passed; nothing below can fail
        nodes.remove(&to);
        for dir in missing {
            nodes.insert(dir.clone(), Node::directory(dir, self.dir_perm));
        }

        let mut moved = vec![from.clone()];
        moved.extend(self.descendants(&nodes, &from));
        for old_key in moved {
            if let Some(mut node) = nodes.remove(&old_key) {
                let new_key = format!("{}{}", to, &old_key[from.len()..]);
                node.path = new_key.clone();
                nodes.insert(new_key, node);
            }
        }

        tracing::debug!(from = %from, to = %to, "renamed node");
        Ok(())
    }

    /// Deletes `path`; a directory must be empty. Handles open on it keep their buffer.
    pub fn remove(&self, path: &str) -> FsResult<()> {
        let path = self.paths.clean(path);
        let mut nodes = self.write();

        let node = nodes.get(&path).ok_or(FsError::NotFound)?;
        if self.is_root(&path) {
            return Err(FsError::InvalidArgument);
        }
        if node.is_dir() && self.has_descendants(&nodes, &path) {
            return Err(FsError::NotEmpty);
        }

        nodes.remove(&path);
        tracing::debug!(path = %path, "removed node");
        Ok(())
    }
}
