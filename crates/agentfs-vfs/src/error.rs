// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types shared by every filesystem backend

use std::io;

/// Filesystem error type returned by all [`crate::Filesystem`] and [`crate::File`] operations.
///
/// `CrossedBoundary` is deliberately distinct from `NotFound`: a caller can always tell
/// "the path escapes this filesystem's root" apart from "the path does not exist".
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("path crosses the filesystem boundary")]
    CrossedBoundary,
    #[error("{0} not supported")]
    NotSupported(&'static str),
    #[error("file already closed")]
    Closed,
    #[error("resource exhausted")]
    ResourceExhausted,
    #[error("too many levels of symbolic links")]
    TooManyLinks,
    #[error("not a symlink")]
    NotASymlink,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotFound => io::ErrorKind::NotFound,
            FsError::AlreadyExists => io::ErrorKind::AlreadyExists,
            FsError::NotADirectory | FsError::IsADirectory | FsError::InvalidArgument => {
                io::ErrorKind::InvalidInput
            }
            FsError::NotEmpty | FsError::ResourceExhausted | FsError::TooManyLinks => {
                io::ErrorKind::Other
            }
            FsError::CrossedBoundary => io::ErrorKind::PermissionDenied,
            FsError::NotSupported(_) => io::ErrorKind::Unsupported,
            FsError::Closed => io::ErrorKind::BrokenPipe,
            FsError::NotASymlink => io::ErrorKind::InvalidInput,
            FsError::Io(err) => err.kind(),
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(inner) => inner,
            other => io::Error::new(other.kind(), other),
        }
    }
}
