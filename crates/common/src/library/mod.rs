//! Media library management
//!
//! User media lives in nested directories under the data directory. Each
//! library kind builds a tree view of its directory with numeric node ids
//! assigned in pre-order, and offers the file operations its form needs.
//! Every path handed in from outside is checked to lie under the library
//! root before anything is touched.

pub mod captures;
pub mod install;
pub mod naming;
pub mod presets;
pub mod snapshots;
pub mod soundfonts;

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::{Error, Result};

pub use captures::{CaptureLibrary, CaptureNode, CaptureSource, CaptureTree};
pub use presets::{DirectoryEngine, PresetEngine, PresetNode, PresetNodeType};
pub use snapshots::{SaveRequest, Selection, SnapshotLibrary, SnapshotNode, SnapshotNodeType};
pub use soundfonts::{SoundfontLibrary, SoundfontNode, SoundfontNodeType, SoundfontTree};

/// Hands out tree node ids in visiting order
#[derive(Debug, Default)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Resolve `path` against `root` and require it to lie strictly below it
pub fn ensure_within(root: &Path, path: &Path) -> Result<PathBuf> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir));
    if escapes || !resolved.starts_with(root) || resolved == root {
        return Err(Error::PathTraversal(path.display().to_string()));
    }
    Ok(resolved)
}

/// Entries of `dir` sorted by file name
pub fn sorted_entries(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Delete a file or a whole directory
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)
        .map_err(|_| Error::not_found("Path", path.display()))?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    info!("Removed {:?}", path);
    Ok(())
}

/// Validate a single path component supplied by the user
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::InvalidInput(format!("Invalid name: {:?}", name)));
    }
    Ok(())
}

/// Rename `path` within its directory
pub fn rename_in_place(path: &Path, new_name: &str) -> Result<PathBuf> {
    validate_file_name(new_name)?;
    if !path.exists() {
        return Err(Error::not_found("Path", path.display()));
    }
    let target = path.with_file_name(new_name);
    if target == path {
        return Ok(target);
    }
    if target.exists() {
        return Err(Error::already_exists("Path", target.display()));
    }
    std::fs::rename(path, &target)?;
    info!("Renamed {:?} to {:?}", path, target);
    Ok(target)
}

/// Move a file or directory, copying across filesystems when needed
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {:?} -> {:?} failed ({}), copying", from, to, e);
            if from.is_dir() {
                copy_dir(from, to)?;
                std::fs::remove_dir_all(from)?;
            } else {
                std::fs::copy(from, to)?;
                std::fs::remove_file(from)?;
            }
            Ok(())
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

pub(crate) fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
