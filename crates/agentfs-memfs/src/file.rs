// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Open file handles of the in-memory filesystem

use std::io::{self, SeekFrom};
use std::sync::Arc;

use agentfs_vfs::{File, FileMode, FsError, FsResult, OpenFlags};

use crate::storage::Content;

/// A cursor over a shared content buffer
///
/// Every open call produces its own `MemFile`; handles opened on the same path
/// share one [`Content`] and therefore see each other's writes immediately.
#[derive(Debug)]
pub struct MemFile {
    name: String,
    content: Arc<Content>,
    position: u64,
    flags: OpenFlags,
    mode: FileMode,
    max_size: u64,
    closed: bool,
}

impl MemFile {
    /// Opens a new handle on `content`, applying the open-time effects of `flags`.
    ///
    /// `TRUNCATE` clears the shared buffer before anything else, then `APPEND`
    /// places the cursor at the (possibly new) end. Writes may not reach past
    /// `max_size`.
    pub(crate) fn duplicate(
        name: String,
        content: Arc<Content>,
        flags: OpenFlags,
        mode: FileMode,
        max_size: u64,
    ) -> Self {
        if flags.contains(OpenFlags::TRUNCATE) {
            content.truncate();
        }
        let position = if flags.contains(OpenFlags::APPEND) {
            content.len()
        } else {
            0
        };

        Self {
            name,
            content,
            position,
            flags,
            mode,
            max_size,
            closed: false,
        }
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Closed);
        }
        Ok(())
    }

    fn check_readable(&self) -> FsResult<()> {
        self.check_open()?;
        if !self.flags.can_read() {
            return Err(FsError::NotSupported("read"));
        }
        Ok(())
    }

    fn check_writable(&self) -> FsResult<()> {
        self.check_open()?;
        if !self.flags.can_write() {
            return Err(FsError::NotSupported("write"));
        }
        Ok(())
    }
}

impl File for MemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.check_readable()?;
        let n = self.content.read_at(buf, self.position);
        self.position += n as u64;
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.check_readable()?;
        Ok(self.content.read_at(buf, offset))
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.check_writable()?;
        let end = self.position.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.max_size) {
            tracing::warn!(file = %self.name, offset = self.position, size = buf.len(), "write exceeds file size limit");
            return Err(FsError::ResourceExhausted);
        }
        let n = self.content.write_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.check_open()?;
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.content.len(), delta),
        };
        let position = base.checked_add_signed(delta).ok_or(FsError::InvalidArgument)?;
        self.position = position;
        Ok(position)
    }

    fn close(&mut self) -> FsResult<()> {
        self.check_open()?;
        self.closed = true;
        Ok(())
    }
}

impl io::Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        File::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_open().map_err(io::Error::from)
    }
}

impl io::Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        File::seek(self, pos).map_err(io::Error::from)
    }
}
