// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Symlink target resolution for one filesystem view

use agentfs_vfs::{FsError, FsResult, PathResolver};

use crate::storage::Node;

/// Follows symlinks on behalf of a single operation
///
/// Links store absolute targets as storage paths; each view rebases them on the way
/// in and out, so one link means the same thing from every view. Relative targets
/// start at the link's directory. Either way the result must stay under the base of
/// the view doing the following. Each resolver counts its hops and gives up with
/// `TooManyLinks` past the limit.
pub(crate) struct SymlinkResolver<'a> {
    paths: PathResolver,
    base: &'a str,
    remaining: u32,
}

impl<'a> SymlinkResolver<'a> {
    pub fn new(paths: PathResolver, base: &'a str, max_hops: u32) -> Self {
        Self {
            paths,
            base,
            remaining: max_hops,
        }
    }

    /// Storage path `target` refers to when stored in a link at `link_path`.
    pub fn target_path(&self, link_path: &str, target: &str) -> FsResult<String> {
        let resolved = if self.paths.is_abs(target) {
            self.paths.resolve(&self.paths.root(), target)
        } else {
            let link_dir = self.paths.rel(self.base, &self.paths.dir(link_path))?;
            let rel = self.paths.join([link_dir.as_str(), target]);
            if self.paths.is_cross_boundary(&rel) {
                Err(FsError::CrossedBoundary)
            } else {
                Ok(self.paths.join([self.base, rel.as_str()]))
            }
        };
        let within = resolved
            .as_ref()
            .is_ok_and(|path| self.paths.is_within(self.base, path));
        if !within {
            tracing::warn!(
                link = link_path,
                link_target = target,
                base = self.base,
                "symlink target escapes filesystem root"
            );
            return Err(FsError::CrossedBoundary);
        }
        resolved
    }

    /// Where `node` redirects to, or `None` when it is not a symlink.
    pub fn follow(&mut self, path: &str, node: &Node) -> FsResult<Option<String>> {
        let Some(target) = node.link_target() else {
            return Ok(None);
        };
        if self.remaining == 0 {
            tracing::warn!(path, "symlink hop limit reached");
            return Err(FsError::TooManyLinks);
        }
        self.remaining -= 1;

        let next = self.target_path(path, &target)?;
        tracing::debug!(path, link_target = %target, resolved = %next, "following symlink");
        Ok(Some(next))
    }
}
