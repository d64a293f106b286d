//! Audio and MIDI capture browser
//!
//! Recordings are listed per extension. A mounted USB stick is scanned
//! before the local capture directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{file_name_string, remove_path, rename_in_place, sorted_entries, IdCounter};
use crate::{Error, Result};

/// Extensions shown as top-level groups, in display order
pub const CAPTURE_EXTENSIONS: &[&str] = &["wav", "ogg", "mid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Usb,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureNode {
    pub id: u32,
    pub text: String,
    pub name: String,
    /// `None` for the per-extension group nodes
    pub fullpath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CaptureSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<CaptureNode>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureTree {
    pub nodes: Vec<CaptureNode>,
    pub selected_id: u32,
}

#[derive(Debug, Clone)]
pub struct CaptureLibrary {
    local_dir: PathBuf,
    usb_dir: PathBuf,
}

impl CaptureLibrary {
    pub fn new(local_dir: impl Into<PathBuf>, usb_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            usb_dir: usb_dir.into(),
        }
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn tree(&self, selected: Option<&Path>) -> Result<CaptureTree> {
        let usb_mounted = is_mount_point(&self.usb_dir);
        if !usb_mounted {
            debug!("{:?} is not mounted", self.usb_dir);
        }

        let mut ids = IdCounter::new();
        let mut selected_id = 0;
        let mut groups = Vec::new();

        for ext in CAPTURE_EXTENSIONS {
            let group_id = ids.next_id();
            let mut children = Vec::new();

            let mut sources = Vec::new();
            if usb_mounted {
                sources.push((self.usb_dir.as_path(), CaptureSource::Usb));
            }
            sources.push((self.local_dir.as_path(), CaptureSource::Local));

            for (dir, source) in sources {
                for path in list_with_extension(dir, ext)? {
                    let id = ids.next_id();
                    if selected == Some(path.as_path()) {
                        selected_id = id;
                    }
                    let text = file_name_string(&path);
                    children.push(CaptureNode {
                        id,
                        name: text.clone(),
                        text,
                        fullpath: Some(path),
                        source: Some(source),
                        nodes: None,
                    });
                }
            }

            groups.push(CaptureNode {
                id: group_id,
                text: (*ext).to_string(),
                name: (*ext).to_string(),
                fullpath: None,
                source: None,
                nodes: Some(children),
            });
        }

        Ok(CaptureTree {
            nodes: groups,
            selected_id,
        })
    }

    pub fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        let path = self.check(path)?;
        rename_in_place(&path, new_name)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let path = self.check(path)?;
        info!("Removing capture {:?}", path);
        remove_path(&path)
    }

    fn check(&self, path: &Path) -> Result<PathBuf> {
        super::ensure_within(&self.local_dir, path)
            .or_else(|_| super::ensure_within(&self.usb_dir, path))
            .map_err(|_| Error::PathTraversal(path.display().to_string()))
    }
}

/// MIME type served for a capture download
pub fn content_type(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("mid") => "audio/midi",
        Some("ogg") => "audio/ogg",
        _ => "application/wav",
    }
}

fn list_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let suffix = format!(".{}", ext);
    Ok(sorted_entries(dir)?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.is_file() && file_name_string(p).ends_with(&suffix))
        .collect())
}

#[cfg(unix)]
fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let parent = path.parent().unwrap_or(path);
    match std::fs::metadata(parent) {
        Ok(parent_meta) => meta.dev() != parent_meta.dev() || meta.ino() == parent_meta.ino(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, CaptureLibrary) {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("capture");
        std::fs::create_dir_all(&local).unwrap();
        for f in ["b.wav", "a.wav", "song.mid", "take.ogg", "notes.txt"] {
            std::fs::write(local.join(f), b"x").unwrap();
        }
        // A plain directory is never a mount point
        let usb = tmp.path().join("usb0");
        std::fs::create_dir_all(&usb).unwrap();
        std::fs::write(usb.join("usb.wav"), b"x").unwrap();
        (tmp, CaptureLibrary::new(local, usb))
    }

    #[test]
    fn test_tree_groups_by_extension() {
        let (_tmp, lib) = fixture();
        let tree = lib.tree(None).unwrap();

        let names: Vec<_> = tree.nodes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(names, vec!["wav", "ogg", "mid"]);

        let wav = tree.nodes[0].nodes.as_ref().unwrap();
        let wav_names: Vec<_> = wav.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(wav_names, vec!["a.wav", "b.wav"]);
        assert_eq!(wav[0].source, Some(CaptureSource::Local));

        // wav=0, a=1, b=2, ogg=3, take=4, mid=5, song=6
        assert_eq!(tree.nodes[2].id, 5);
        assert_eq!(tree.nodes[2].nodes.as_ref().unwrap()[0].id, 6);
    }

    #[test]
    fn test_selection() {
        let (_tmp, lib) = fixture();
        let selected = lib.local_dir().join("take.ogg");
        assert_eq!(lib.tree(Some(&selected)).unwrap().selected_id, 4);
    }

    #[test]
    fn test_rename_and_remove() {
        let (tmp, lib) = fixture();
        let renamed = lib.rename(&lib.local_dir().join("a.wav"), "intro.wav").unwrap();
        assert!(renamed.exists());
        lib.remove(&renamed).unwrap();
        assert!(!renamed.exists());
        assert!(lib.remove(&tmp.path().join("elsewhere.wav")).is_err());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("song.mid"), "audio/midi");
        assert_eq!(content_type("take.ogg"), "audio/ogg");
        assert_eq!(content_type("a.wav"), "application/wav");
    }

    #[test]
    fn test_missing_dirs_are_empty() {
        let tmp = TempDir::new().unwrap();
        let lib = CaptureLibrary::new(tmp.path().join("none"), tmp.path().join("nousb"));
        let tree = lib.tree(None).unwrap();
        assert!(tree.nodes.iter().all(|n| n.nodes.as_ref().unwrap().is_empty()));
    }
}
