// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the in-memory filesystem

use agentfs_vfs::{FsError, FsResult, DEFAULT_SEPARATOR, MAX_SYMLINK_HOPS};
use serde::{Deserialize, Serialize};

/// In-memory filesystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemFsConfig {
    /// Path separator; also the name of the storage root
    pub separator: char,

    /// Ceiling of the per-instance temp file counter
    pub max_temp_files: u32,

    /// Symlinks followed by one operation before it fails with `TooManyLinks`
    pub max_symlink_hops: u32,

    /// Permission bits of ancestor directories created implicitly
    pub default_dir_mode: u32,

    /// Largest offset a write may reach in a single file
    pub max_file_size: u64,
}

impl Default for MemFsConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            max_temp_files: 4096,
            max_symlink_hops: MAX_SYMLINK_HOPS,
            default_dir_mode: 0o755,
            max_file_size: 1 << 30,
        }
    }
}

impl MemFsConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> FsResult<Self> {
        let config: Self = toml::from_str(input).map_err(|err| {
            tracing::warn!(error = %err, "invalid memfs configuration");
            FsError::InvalidArgument
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FsResult<()> {
        if self.max_symlink_hops == 0 {
            return Err(FsError::InvalidArgument);
        }
        if self.separator == '.' || self.separator.is_whitespace() {
            return Err(FsError::InvalidArgument);
        }
        if self.default_dir_mode & !0o7777 != 0 {
            return Err(FsError::InvalidArgument);
        }
        if self.max_file_size == 0 {
            return Err(FsError::InvalidArgument);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MemFsConfig::default();
        assert_eq!(config.separator, '/');
        assert_eq!(config.max_temp_files, 4096);
        assert_eq!(config.max_symlink_hops, 40);
        assert_eq!(config.max_file_size, 1 << 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MemFsConfig::from_toml_str("max_symlink_hops = 8\n").unwrap();
        assert_eq!(config.max_symlink_hops, 8);
        assert_eq!(config.max_temp_files, 4096);
        assert_eq!(config.default_dir_mode, 0o755);
    }

    #[test]
    fn full_toml() {
        let input = r#"
            separator = "\\"
            max_temp_files = 16
            max_symlink_hops = 4
            default_dir_mode = 0o700
            max_file_size = 4096
        "#;
        let config = MemFsConfig::from_toml_str(input).unwrap();
        assert_eq!(config.separator, '\\');
        assert_eq!(config.max_temp_files, 16);
        assert_eq!(config.default_dir_mode, 0o700);
        assert_eq!(config.max_file_size, 4096);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            MemFsConfig::from_toml_str("max_symlink_hops = 0"),
            Err(FsError::InvalidArgument)
        ));
        assert!(matches!(
            MemFsConfig::from_toml_str("separator = \".\""),
            Err(FsError::InvalidArgument)
        ));
        assert!(matches!(
            MemFsConfig::from_toml_str("max_file_size = 0"),
            Err(FsError::InvalidArgument)
        ));
        assert!(matches!(
            MemFsConfig::from_toml_str("max_temp_files = \"many\""),
            Err(FsError::InvalidArgument)
        ));
    }
}
