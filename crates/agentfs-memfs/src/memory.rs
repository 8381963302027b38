// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory implementation of the [`Filesystem`] contract

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use agentfs_vfs::{File, FileMode, Filesystem, FsError, FsResult, Metadata, OpenFlags, PathResolver};

use crate::config::MemFsConfig;
use crate::file::MemFile;
use crate::storage::{Node, StorageTree};
use crate::symlink::SymlinkResolver;

/// A view of an in-memory storage tree rooted at `base`
///
/// Cloning a `MemoryFs` or calling [`Filesystem::chroot`] gives another view of the
/// same tree; nothing is copied. All state is lost when the last view is dropped.
#[derive(Clone, Debug)]
pub struct MemoryFs {
    base: String,
    paths: PathResolver,
    storage: Arc<StorageTree>,
    config: Arc<MemFsConfig>,
    temp_count: Arc<AtomicU32>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::build(MemFsConfig::default())
    }

    pub fn with_config(config: MemFsConfig) -> FsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MemFsConfig) -> Self {
        let paths = PathResolver::new(config.separator);
        let storage = StorageTree::new(paths, config.default_dir_mode);
        tracing::debug!(separator = %config.separator, "created in-memory filesystem");
        Self {
            base: paths.root(),
            paths,
            storage: Arc::new(storage),
            config: Arc::new(config),
            temp_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn config(&self) -> &MemFsConfig {
        &self.config
    }

    fn full_path(&self, path: &str) -> FsResult<String> {
        self.paths.resolve(&self.base, path)
    }

    /// Name of a storage path as seen from this view
    fn display_name(&self, full: &str) -> String {
        match self.paths.rel(&self.base, full) {
            Ok(rel) if rel != "." => self.paths.join([self.paths.root().as_str(), rel.as_str()]),
            _ => self.paths.root(),
        }
    }

    /// Base name of a storage path as seen from this view; the view root is the separator
    fn entry_name(&self, full: &str) -> String {
        self.paths.base(&self.display_name(full))
    }

    fn symlinks(&self) -> SymlinkResolver<'_> {
        SymlinkResolver::new(self.paths, &self.base, self.config.max_symlink_hops)
    }

    /// Follows symlinks at `full` until reaching a non-link node or a missing path.
    fn follow(&self, full: &str) -> FsResult<(String, Option<Node>)> {
        let mut resolver = self.symlinks();
        let mut current = full.to_string();
        loop {
            let Some(node) = self.storage.get(&current) else {
                return Ok((current, None));
            };
            match resolver.follow(&current, &node)? {
                Some(next) => current = next,
                None => return Ok((current, Some(node))),
            }
        }
    }

    fn open_node(&self, name: String, node: &Node, flags: OpenFlags) -> FsResult<Box<dyn File>> {
        if node.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let content = node.content().ok_or(FsError::IsADirectory)?;
        Ok(Box::new(MemFile::duplicate(
            name,
            Arc::clone(content),
            flags,
            node.mode(),
            self.config.max_file_size,
        )))
    }

    fn next_temp_name(&self, prefix: &str) -> FsResult<String> {
        let max = self.config.max_temp_files;
        let count = self
            .temp_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then(|| n + 1))
            .map_err(|_| {
                tracing::warn!(max, "temp file limit reached");
                FsError::ResourceExhausted
            })?
            + 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Ok(format!("{}_{}_{}", prefix, count, nanos))
    }
}

impl Filesystem for MemoryFs {
    fn open_file(&self, path: &str, flags: OpenFlags, mode: FileMode) -> FsResult<Box<dyn File>> {
        let full = self.full_path(path)?;
        let name = self.display_name(&full);
        let exclusive = flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE);

        let mut resolver = self.symlinks();
        let mut current = full;
        loop {
            match self.storage.get(&current) {
                Some(_) if exclusive => return Err(FsError::AlreadyExists),
                Some(node) => match resolver.follow(&current, &node)? {
                    Some(next) => current = next,
                    None => return self.open_node(name, &node, flags),
                },
                None => {
                    if !flags.contains(OpenFlags::CREATE) {
                        return Err(FsError::NotFound);
                    }
                    let node = self
                        .storage
                        .new_node(&current, FileMode::regular(mode.perm()), flags)?;
                    // A link may have been created here since the lookup
                    if node.is_symlink() {
                        continue;
                    }
                    return self.open_node(name, &node, flags);
                }
            }
        }
    }

    fn stat(&self, path: &str) -> FsResult<Metadata> {
        let full = self.full_path(path)?;
        let (_, node) = self.follow(&full)?;
        let mut meta = node.ok_or(FsError::NotFound)?.metadata(&self.paths);
        meta.name = self.entry_name(&full);
        Ok(meta)
    }

    fn lstat(&self, path: &str) -> FsResult<Metadata> {
        let full = self.full_path(path)?;
        let node = self.storage.get(&full).ok_or(FsError::NotFound)?;
        let mut meta = node.metadata(&self.paths);
        meta.name = self.entry_name(&full);
        Ok(meta)
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let full = self.full_path(path)?;
        let (dir, node) = self.follow(&full)?;
        if !node.ok_or(FsError::NotFound)?.is_dir() {
            return Err(FsError::NotADirectory);
        }

        Ok(self
            .storage
            .children(&dir)
            .iter()
            .map(|child| child.metadata(&self.paths))
            .collect())
    }

    fn mkdir_all(&self, path: &str, mode: FileMode) -> FsResult<()> {
        let full = self.full_path(path)?;
        if let (_, Some(node)) = self.follow(&full)? {
            if node.is_dir() {
                return Ok(());
            }
        }
        self.storage
            .new_node(&full, FileMode::dir(mode.perm()), OpenFlags::empty())
            .map(|_| ())
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = self.full_path(from)?;
        let to = self.full_path(to)?;
        self.storage.rename(&from, &to)
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        let full = self.full_path(path)?;
        self.storage.remove(&full)
    }

    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        if target.is_empty() {
            return Err(FsError::InvalidArgument);
        }
        let full = self.full_path(link)?;
        // Absolute targets are stored as storage paths
        let target = if self.paths.is_abs(target) {
            self.full_path(target)?
        } else {
            self.paths.clean(target)
        };
        self.symlinks().target_path(&full, &target)?;

        self.storage.new_symlink(&full, &target)?;
        tracing::debug!(link = %full, link_target = %target, "created symlink");
        Ok(())
    }

    fn readlink(&self, link: &str) -> FsResult<String> {
        let full = self.full_path(link)?;
        let node = self.storage.get(&full).ok_or(FsError::NotFound)?;
        let target = node.link_target().ok_or(FsError::NotASymlink)?;
        if !self.paths.is_abs(&target) {
            return Ok(target);
        }
        if !self.paths.is_within(&self.base, &target) {
            return Err(FsError::CrossedBoundary);
        }
        Ok(self.display_name(&target))
    }

    fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn File>> {
        let dir_full = self.full_path(dir)?;
        let flags = OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
        loop {
            let full = self.paths.join([dir_full.as_str(), self.next_temp_name(prefix)?.as_str()]);
            match self.storage.new_node(&full, FileMode::regular(0o600), flags) {
                Ok(node) => return self.open_node(self.display_name(&full), &node, flags),
                Err(FsError::AlreadyExists) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn join(&self, parts: &[&str]) -> String {
        self.paths.join(parts)
    }

    fn chroot(&self, path: &str) -> FsResult<Box<dyn Filesystem>> {
        let full = self.full_path(path)?;
        if let Some(node) = self.storage.get(&full) {
            if !node.is_dir() {
                return Err(FsError::NotADirectory);
            }
        }
        tracing::debug!(base = %full, "chroot");

        Ok(Box::new(MemoryFs {
            base: full,
            paths: self.paths,
            storage: Arc::clone(&self.storage),
            config: Arc::clone(&self.config),
            temp_count: Arc::new(AtomicU32::new(0)),
        }))
    }

    fn root(&self) -> String {
        self.base.clone()
    }
}
