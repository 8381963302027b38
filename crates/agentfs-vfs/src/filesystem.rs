// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The filesystem contract every backend implements
//!
//! Paths are strings interpreted relative to the backend's root ([`Filesystem::root`]);
//! absolute paths are relative to that root too. No operation may reach outside it.

use crate::error::FsResult;
use crate::file::File;
use crate::types::{FileMode, Metadata, OpenFlags};

pub const DEFAULT_CREATE_MODE: u32 = 0o666;

/// Symlinks one operation follows before failing with `TooManyLinks`
pub const MAX_SYMLINK_HOPS: u32 = 40;

/// Pluggable filesystem backend
pub trait Filesystem: Send + Sync {
    /// Creates or truncates `path` and opens it read-write.
    fn create(&self, path: &str) -> FsResult<Box<dyn File>> {
        self.open_file(
            path,
            OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            FileMode::new(DEFAULT_CREATE_MODE),
        )
    }

    /// Opens `path` read-only.
    fn open(&self, path: &str) -> FsResult<Box<dyn File>> {
        self.open_file(path, OpenFlags::READ_ONLY, FileMode::default())
    }

    fn open_file(&self, path: &str, flags: OpenFlags, mode: FileMode) -> FsResult<Box<dyn File>>;

    /// Metadata of `path`, following symlinks. The name is always the requested one.
    fn stat(&self, path: &str) -> FsResult<Metadata>;

    /// Metadata of `path` itself, never following a symlink.
    fn lstat(&self, path: &str) -> FsResult<Metadata>;

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>>;

    /// Creates `path` and any missing ancestors as directories.
    fn mkdir_all(&self, path: &str, mode: FileMode) -> FsResult<()>;

    fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    fn remove(&self, path: &str) -> FsResult<()>;

    /// Creates `link` pointing at `target`.
    fn symlink(&self, target: &str, link: &str) -> FsResult<()>;

    fn readlink(&self, link: &str) -> FsResult<String>;

    /// Creates and opens a uniquely named file in `dir`.
    fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn File>>;

    fn join(&self, parts: &[&str]) -> String;

    /// A view of this filesystem rooted at `path`, sharing the same storage.
    fn chroot(&self, path: &str) -> FsResult<Box<dyn Filesystem>>;

    fn root(&self) -> String;
}
