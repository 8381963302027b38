// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Backend-independent filesystem contract for AgentFS
//!
//! Backends implement [`Filesystem`] and hand out [`File`] handles. Every path a
//! caller passes in is resolved lexically against the backend's root with
//! [`PathResolver`]; a path that would escape that root fails with
//! [`FsError::CrossedBoundary`] before any storage is touched.

pub mod error;
pub mod file;
pub mod filesystem;
pub mod path;
pub mod subdir;
pub mod types;
pub mod util;

pub use error::{FsError, FsResult};
pub use file::File;
pub use filesystem::{Filesystem, DEFAULT_CREATE_MODE, MAX_SYMLINK_HOPS};
pub use path::{PathResolver, DEFAULT_SEPARATOR};
pub use subdir::SubDir;
pub use types::{FileMode, Metadata, OpenFlags};
pub use util::{read_file, write_file};
