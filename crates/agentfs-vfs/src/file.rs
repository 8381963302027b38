// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Open file handle contract

use std::io::SeekFrom;

use crate::error::FsResult;

/// An open file returned by [`crate::Filesystem::open_file`] and friends.
///
/// A handle owns its cursor and open flags; the bytes behind it may be shared
/// with other handles opened on the same path.
pub trait File: Send {
    /// Display name of the file, relative to the root of the filesystem that opened it
    fn name(&self) -> &str;

    /// Reads at the cursor and advances it. Returns `Ok(0)` at end of file.
    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;

    /// Reads at `offset` without moving the cursor.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize>;

    /// Writes at the cursor, growing the file if needed, and advances the cursor.
    fn write(&mut self, buf: &[u8]) -> FsResult<usize>;

    /// Moves the cursor; `SeekFrom::End` is relative to the current file length.
    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64>;

    /// Closes the handle. Every later call, including a second close, fails with `Closed`.
    fn close(&mut self) -> FsResult<()>;

    /// Writes the whole buffer.
    fn write_all(&mut self, mut buf: &[u8]) -> FsResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Reads from the cursor to end of file.
    fn read_to_end(&mut self, out: &mut Vec<u8>) -> FsResult<usize> {
        let start = out.len();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(out.len() - start);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }
}
