// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions shared by filesystem backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// File kind and permission bits, laid out like `st_mode`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const KIND_MASK: u32 = 0o170000;
    pub const DIR: u32 = 0o040000;
    pub const REGULAR: u32 = 0o100000;
    pub const SYMLINK: u32 = 0o120000;
    pub const PERM_MASK: u32 = 0o7777;

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn dir(perm: u32) -> Self {
        Self(Self::DIR | (perm & Self::PERM_MASK))
    }

    pub fn regular(perm: u32) -> Self {
        Self(Self::REGULAR | (perm & Self::PERM_MASK))
    }

    pub fn symlink(perm: u32) -> Self {
        Self(Self::SYMLINK | (perm & Self::PERM_MASK))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn perm(self) -> u32 {
        self.0 & Self::PERM_MASK
    }

    pub fn kind(self) -> u32 {
        self.0 & Self::KIND_MASK
    }

    pub fn is_dir(self) -> bool {
        self.kind() == Self::DIR
    }

    pub fn is_symlink(self) -> bool {
        self.kind() == Self::SYMLINK
    }

    /// Regular file, including modes that carry no kind bits at all
    pub fn is_file(self) -> bool {
        matches!(self.kind(), 0 | Self::REGULAR)
    }

    /// Same permission bits with a different kind
    pub fn with_kind(self, kind: u32) -> Self {
        Self((kind & Self::KIND_MASK) | self.perm())
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() {
            'd'
        } else if self.is_symlink() {
            'l'
        } else {
            '-'
        };
        write!(f, "{}{:04o}", kind, self.perm())
    }
}

bitflags::bitflags! {
    /// Flags accepted by [`crate::Filesystem::open_file`]
    ///
    /// Read-only access is the absence of both access-mode bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const WRITE_ONLY = 0x0001;
        const READ_WRITE = 0x0002;
        const APPEND = 0x0008;
        const CREATE = 0x0200;
        const TRUNCATE = 0x0400;
        const EXCLUSIVE = 0x0800;
    }
}

impl OpenFlags {
    pub const READ_ONLY: OpenFlags = OpenFlags::empty();

    fn access_mode(self) -> OpenFlags {
        self & (OpenFlags::WRITE_ONLY | OpenFlags::READ_WRITE)
    }

    pub fn can_read(self) -> bool {
        self.contains(OpenFlags::READ_WRITE) || self.access_mode().is_empty()
    }

    pub fn can_write(self) -> bool {
        self.intersects(OpenFlags::READ_WRITE | OpenFlags::WRITE_ONLY)
    }
}

/// File metadata as reported by `stat`, `lstat` and `read_dir`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub size: u64,
    pub mode: FileMode,
    pub modified: SystemTime,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_kinds() {
        assert!(FileMode::dir(0o755).is_dir());
        assert!(FileMode::symlink(0o777).is_symlink());
        assert!(FileMode::regular(0o644).is_file());
        assert!(FileMode::new(0o644).is_file());
        assert!(!FileMode::dir(0o755).is_file());
        assert_eq!(FileMode::dir(0o40755).perm(), 0o755);
    }

    #[test]
    fn with_kind_keeps_permissions() {
        let mode = FileMode::regular(0o640).with_kind(FileMode::DIR);
        assert!(mode.is_dir());
        assert_eq!(mode.perm(), 0o640);
    }

    #[test]
    fn mode_display() {
        assert_eq!(FileMode::dir(0o755).to_string(), "d0755");
        assert_eq!(FileMode::symlink(0o777).to_string(), "l0777");
        assert_eq!(FileMode::regular(0o600).to_string(), "-0600");
    }

    #[test]
    fn access_modes() {
        assert!(OpenFlags::READ_ONLY.can_read());
        assert!(!OpenFlags::READ_ONLY.can_write());

        let wo = OpenFlags::WRITE_ONLY | OpenFlags::CREATE;
        assert!(!wo.can_read());
        assert!(wo.can_write());

        let rw = OpenFlags::READ_WRITE | OpenFlags::APPEND;
        assert!(rw.can_read());
        assert!(rw.can_write());

        // Creation flags alone keep read-only access
        let ro_create = OpenFlags::CREATE | OpenFlags::TRUNCATE;
        assert!(ro_create.can_read());
        assert!(!ro_create.can_write());
    }
}
