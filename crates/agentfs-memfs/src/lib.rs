// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory AgentFS backend
//!
//! [`MemoryFs`] keeps the whole tree in process memory and implements the
//! [`agentfs_vfs::Filesystem`] contract with POSIX-like open flags, shared
//! content between handles, symlinks and chroot views. Nothing is persisted.

pub mod config;
pub mod file;
pub mod memory;
pub mod storage;
mod symlink;

pub use config::MemFsConfig;
pub use file::MemFile;
pub use memory::MemoryFs;
pub use storage::{Content, Node, NodeKind, StorageTree};
