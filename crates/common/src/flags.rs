//! Persisted marker files
//!
//! A pending reboot and a requested system update are signalled to the
//! boot scripts by the presence of a file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::WebconfConfig;
use crate::Result;

/// Locations of the marker files
#[derive(Debug, Clone)]
pub struct Flags {
    reboot: PathBuf,
    update_sys: PathBuf,
}

/// Snapshot of the marker state
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FlagStatus {
    pub reboot_pending: bool,
    pub update_sys_pending: bool,
}

impl Flags {
    pub fn new(reboot: impl Into<PathBuf>, update_sys: impl Into<PathBuf>) -> Self {
        Self {
            reboot: reboot.into(),
            update_sys: update_sys.into(),
        }
    }

    pub fn from_config(config: &WebconfConfig) -> Self {
        Self::new(&config.paths.reboot_flag, &config.paths.update_sys_flag)
    }

    pub fn status(&self) -> FlagStatus {
        FlagStatus {
            reboot_pending: self.reboot_pending(),
            update_sys_pending: self.update_sys.exists(),
        }
    }

    pub fn reboot_pending(&self) -> bool {
        self.reboot.exists()
    }

    pub fn request_reboot(&self) -> Result<()> {
        touch(&self.reboot)?;
        info!("Reboot requested ({:?})", self.reboot);
        Ok(())
    }

    pub fn clear_reboot(&self) -> Result<()> {
        remove_if_exists(&self.reboot)
    }

    pub fn request_system_update(&self) -> Result<()> {
        touch(&self.update_sys)?;
        info!("System update requested ({:?})", self.update_sys);
        Ok(())
    }

    pub fn clear_system_update(&self) -> Result<()> {
        remove_if_exists(&self.update_sys)
    }
}

fn touch(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
