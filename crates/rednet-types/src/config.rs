//! Config validation, grounded on the teacher's `ConfigConsumer` convention
//! (a `Config` associated type per component, deserialized from the node's
//! config file) plus `resolved-pathbuf::ResolvedPathBuf` for persistence
//! paths. We don't need a full path-resolution crate for this workspace's
//! paths (no `~` expansion requirement), so `resolve_path` below is the
//! small subset we do need: ensuring the parent directory exists before a
//! component tries to write to it.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be in range {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
}

pub fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

/// Ensure `path`'s parent directory exists, creating it if necessary, and
/// hand back an owned `PathBuf`. Mirrors the effect of
/// `ResolvedPathBuf::try_from` without depending on that crate.
pub fn resolve_path(path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(path)
}
