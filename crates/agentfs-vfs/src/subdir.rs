// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Delegating filesystem rooted at a sub-directory of another backend
//!
//! `SubDir` owns no data. It rejects paths that climb out of its base, rebases
//! everything else onto the base and forwards to the underlying filesystem.
//!
//! The underlying filesystem follows symlinks from its own root, which is wider
//! than this view. Operations that follow links therefore walk the chain here
//! first, with `lstat` and `readlink` on the underlying filesystem, and only
//! forward a path that is not a symlink. Absolute link targets are stored as
//! underlying paths and rebased on the way in and out.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::file::File;
use crate::filesystem::{Filesystem, MAX_SYMLINK_HOPS};
use crate::path::PathResolver;
use crate::types::{FileMode, Metadata, OpenFlags};

pub struct SubDir {
    underlying: Arc<dyn Filesystem>,
    base: String,
    paths: PathResolver,
}

impl SubDir {
    pub fn new(underlying: Arc<dyn Filesystem>, base: &str) -> Self {
        Self::with_resolver(underlying, base, PathResolver::default())
    }

    pub fn with_resolver(underlying: Arc<dyn Filesystem>, base: &str, paths: PathResolver) -> Self {
        Self {
            underlying,
            base: paths.join([paths.root().as_str(), base]),
            paths,
        }
    }

    fn underlying_path(&self, path: &str) -> FsResult<String> {
        self.paths.resolve(&self.base, path)
    }

    /// Resolves `path` to an underlying path that is not a symlink.
    ///
    /// A missing final component ends the walk, so callers can still create it.
    fn follow(&self, path: &str) -> FsResult<String> {
        let mut current = self.underlying_path(path)?;
        let mut hops = 0;
        loop {
            match self.underlying.lstat(&current) {
                Ok(meta) if meta.is_symlink() => {}
                Ok(_) | Err(FsError::NotFound) => return Ok(current),
                Err(err) => return Err(err),
            }
            if hops == MAX_SYMLINK_HOPS {
                tracing::debug!(path, hops, "symlink hop limit reached");
                return Err(FsError::TooManyLinks);
            }
            hops += 1;

            let target = self.underlying.readlink(&current)?;
            current = self.link_target(&current, &target)?;
        }
    }

    /// Underlying path a link at `link` points to, provided it stays under the base
    fn link_target(&self, link: &str, target: &str) -> FsResult<String> {
        let next = if self.paths.is_abs(target) {
            Some(self.paths.clean(target))
        } else {
            let link_dir = self.paths.rel(&self.base, &self.paths.dir(link))?;
            let rel = self.paths.join([link_dir.as_str(), target]);
            (!self.paths.is_cross_boundary(&rel)).then(|| self.paths.join([self.base.as_str(), rel.as_str()]))
        };
        match next {
            Some(next) if self.paths.is_within(&self.base, &next) => Ok(next),
            _ => {
                tracing::warn!(link, link_target = target, base = %self.base, "symlink target escapes sub-directory");
                Err(FsError::CrossedBoundary)
            }
        }
    }

    fn wrap(&self, inner: Box<dyn File>, name: String) -> Box<dyn File> {
        Box::new(SubDirFile { inner, name })
    }

    /// Relative targets are resolved from the link's directory inside this view.
    fn is_target_out_of_bounds(&self, link: &str, target: &str) -> bool {
        if self.paths.is_abs(target) {
            return false;
        }
        let link = self.paths.clean(link.trim_start_matches(self.paths.separator()));
        let joined = self.paths.join([self.paths.dir(&link).as_str(), target]);
        self.paths.is_cross_boundary(&joined)
    }
}

impl Filesystem for SubDir {
    fn open_file(&self, path: &str, flags: OpenFlags, mode: FileMode) -> FsResult<Box<dyn File>> {
        let full = if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) {
            self.underlying_path(path)?
        } else {
            self.follow(path)?
        };
        let file = self.underlying.open_file(&full, flags, mode)?;
        Ok(self.wrap(file, path.to_string()))
    }

    fn stat(&self, path: &str) -> FsResult<Metadata> {
        let mut meta = self.underlying.stat(&self.follow(path)?)?;
        meta.name = self.paths.base(&self.paths.join([self.paths.root().as_str(), path]));
        Ok(meta)
    }

    fn lstat(&self, path: &str) -> FsResult<Metadata> {
        self.underlying.lstat(&self.underlying_path(path)?)
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>> {
        self.underlying.read_dir(&self.follow(path)?)
    }

    fn mkdir_all(&self, path: &str, mode: FileMode) -> FsResult<()> {
        self.underlying.mkdir_all(&self.follow(path)?, mode)
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = self.underlying_path(from)?;
        let to = self.underlying_path(to)?;
        self.underlying.rename(&from, &to)
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        self.underlying.remove(&self.underlying_path(path)?)
    }

    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        if self.is_target_out_of_bounds(link, target) {
            return Err(FsError::CrossedBoundary);
        }

        let target = if self.paths.is_abs(target) {
            self.underlying_path(target)?
        } else {
            target.to_string()
        };

        let link = self.underlying_path(link)?;
        self.underlying.symlink(&target, &link)
    }

    fn readlink(&self, link: &str) -> FsResult<String> {
        let target = self.underlying.readlink(&self.underlying_path(link)?)?;
        if !self.paths.is_abs(&target) {
            return Ok(target);
        }

        let rel = self.paths.rel(&self.base, &target)?;
        if self.paths.is_cross_boundary(&rel) {
            return Err(FsError::CrossedBoundary);
        }
        Ok(self.paths.join([self.paths.root().as_str(), rel.as_str()]))
    }

    fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn File>> {
        let full = self.underlying_path(dir)?;
        let file = self.underlying.temp_file(&full, prefix)?;
        let name = self.paths.join([dir, self.paths.base(file.name()).as_str()]);
        Ok(self.wrap(file, name))
    }

    fn join(&self, parts: &[&str]) -> String {
        self.paths.join(parts)
    }

    fn chroot(&self, path: &str) -> FsResult<Box<dyn Filesystem>> {
        let full = self.follow(path)?;
        Ok(Box::new(SubDir::with_resolver(
            Arc::clone(&self.underlying),
            &full,
            self.paths,
        )))
    }

    fn root(&self) -> String {
        self.base.clone()
    }
}

/// File handle that reports its name relative to the sub-directory
struct SubDirFile {
    inner: Box<dyn File>,
    name: String,
}

impl File for SubDirFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.inner.read(buf)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.inner.read_at(buf, offset)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.inner.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.inner.seek(pos)
    }

    fn close(&mut self) -> FsResult<()> {
        self.inner.close()
    }
}
