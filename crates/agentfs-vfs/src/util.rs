// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Whole-file helpers on top of the [`Filesystem`] contract

use crate::error::FsResult;
use crate::filesystem::Filesystem;
use crate::types::{FileMode, OpenFlags};

/// Writes `data` to `path`, creating or truncating it with `mode`.
///
/// The handle is always closed; the first error encountered is returned.
pub fn write_file(fs: &dyn Filesystem, path: &str, data: &[u8], mode: FileMode) -> FsResult<()> {
    let mut file = fs.open_file(
        path,
        OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        mode,
    )?;
    let written = file.write_all(data);
    let closed = file.close();
    written.and(closed)
}

/// Reads the whole content of `path`, following symlinks.
pub fn read_file(fs: &dyn Filesystem, path: &str) -> FsResult<Vec<u8>> {
    let mut file = fs.open(path)?;
    let mut data = Vec::new();
    let read = file.read_to_end(&mut data);
    let closed = file.close();
    read.and(closed)?;
    Ok(data)
}
