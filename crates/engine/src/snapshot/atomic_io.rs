use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes next to the destination first, then renames over it. The rename
/// replaces the old file in one step, so readers see either the old text or
/// the new text.
pub fn write_text_atomic(path: &Path, text: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let staging = staging_path(path);
    fs::write(&staging, text.as_bytes()).map_err(|source| PersistenceError::Write {
        path: staging.clone(),
        source,
    })?;
    swap_into_place(&staging, path).map_err(|source| PersistenceError::Replace {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_text(path: &Path) -> Result<String, PersistenceError> {
    fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn swap_into_place(staging: &Path, destination: &Path) -> io::Result<()> {
    fs::rename(staging, destination).map_err(|error| {
        let _ = fs::remove_file(staging);
        error
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    path.with_file_name(format!("{name}.tmp"))
}
