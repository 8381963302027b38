// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lexical path handling and sandbox boundary enforcement
//!
//! Nothing in this module touches a filesystem. Paths are plain strings split on a
//! separator chosen once per filesystem instance, so an in-memory tree rooted at `/`
//! behaves the same on every host.
//!
//! Every backend funnels caller-supplied paths through [`PathResolver::resolve`]
//! before touching storage. The resolved path is the requested path joined onto the
//! instance base and lexically cleaned; if it is not at or below the base the call
//! fails with [`FsError::CrossedBoundary`].

use crate::error::{FsError, FsResult};

pub const DEFAULT_SEPARATOR: char = '/';

/// Lexical path operations bound to one separator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathResolver {
    separator: char,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl PathResolver {
    pub const fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// The root path of a tree using this separator
    pub fn root(&self) -> String {
        self.separator.to_string()
    }

    /// Any path starting with the separator is absolute.
    pub fn is_abs(&self, path: &str) -> bool {
        path.starts_with(self.separator)
    }

    /// Non-empty, non-`.` segments of `path`
    pub fn components<'a>(&self, path: &'a str) -> Vec<&'a str> {
        path.split(self.separator).filter(|c| !c.is_empty() && *c != ".").collect()
    }

    /// Joins the non-empty parts with the separator and cleans the result.
    ///
    /// An absolute part in the middle does not reset the join; `join(["/a", "/b"])`
    /// is `/a/b`. Returns an empty string when every part is empty.
    pub fn join<I, S>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sep = self.separator.to_string();
        let joined = parts
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(&sep);

        if joined.is_empty() {
            return joined;
        }
        self.clean(&joined)
    }

    /// Lexically removes `.` segments, duplicate separators and `..` segments.
    ///
    /// A rooted path cannot climb above the root; a relative path keeps its leading
    /// `..` segments. The empty path cleans to `.`.
    pub fn clean(&self, path: &str) -> String {
        if path.is_empty() {
            return ".".to_string();
        }

        let rooted = self.is_abs(path);
        let mut out: Vec<&str> = Vec::new();
        for comp in path.split(self.separator) {
            match comp {
                "" | "." => {}
                ".." => {
                    if out.last().is_some_and(|c| *c != "..") {
                        out.pop();
                    } else if !rooted {
                        out.push("..");
                    }
                }
                other => out.push(other),
            }
        }

        let body = out.join(&self.separator.to_string());
        if rooted {
            format!("{}{}", self.separator, body)
        } else if body.is_empty() {
            ".".to_string()
        } else {
            body
        }
    }

    /// Everything but the last element, cleaned (`.` when there is no separator)
    pub fn dir(&self, path: &str) -> String {
        match path.rfind(self.separator) {
            Some(idx) => self.clean(&path[..idx + self.separator.len_utf8()]),
            None => ".".to_string(),
        }
    }

    /// The last element, ignoring trailing separators
    pub fn base(&self, path: &str) -> String {
        if path.is_empty() {
            return ".".to_string();
        }
        let trimmed = path.trim_end_matches(self.separator);
        if trimmed.is_empty() {
            return self.root();
        }
        match trimmed.rfind(self.separator) {
            Some(idx) => trimmed[idx + self.separator.len_utf8()..].to_string(),
            None => trimmed.to_string(),
        }
    }

    /// Lexical path of `target` relative to `base`.
    ///
    /// The result starts with `..` when `target` is not below `base`. Mixing an
    /// absolute and a relative path is an `InvalidArgument`.
    pub fn rel(&self, base: &str, target: &str) -> FsResult<String> {
        let base = self.clean(base);
        let target = self.clean(target);
        if self.is_abs(&base) != self.is_abs(&target) {
            return Err(FsError::InvalidArgument);
        }

        let base_parts = self.components(&base);
        let target_parts = self.components(&target);
        let common = base_parts
            .iter()
            .zip(&target_parts)
            .take_while(|(b, t)| b == t)
            .count();

        if base_parts[common..].iter().any(|c| *c == "..") {
            return Err(FsError::InvalidArgument);
        }

        let mut parts = vec![".."; base_parts.len() - common];
        parts.extend_from_slice(&target_parts[common..]);
        if parts.is_empty() {
            return Ok(".".to_string());
        }
        Ok(parts.join(&self.separator.to_string()))
    }

    /// True when the cleaned relative path climbs out of its starting point
    pub fn is_cross_boundary(&self, rel: &str) -> bool {
        let cleaned = self.clean(rel);
        let mut parent = "..".to_string();
        if cleaned == parent {
            return true;
        }
        parent.push(self.separator);
        cleaned.starts_with(&parent)
    }

    /// Joins `requested` onto `base`, cleans it and enforces the boundary.
    ///
    /// Absolute `requested` paths are taken relative to `base`, so a chrooted view
    /// sees its own base as `/`. Any `..` that climbs above `base` is an escape,
    /// including when `base` is the storage root.
    pub fn resolve(&self, base: &str, requested: &str) -> FsResult<String> {
        let rel = self.clean(requested.trim_start_matches(self.separator));
        if self.is_cross_boundary(&rel) {
            tracing::warn!(base, requested, "path escapes filesystem root");
            return Err(FsError::CrossedBoundary);
        }
        Ok(self.join([base, rel.as_str()]))
    }

    /// Whether `path` lies at or below `base` without escaping it
    pub fn is_within(&self, base: &str, path: &str) -> bool {
        self.rel(base, path)
            .map(|rel| !self.is_cross_boundary(&rel))
            .unwrap_or(false)
    }
}
