//! Soundfont library
//!
//! The root holds one directory per soundfont type (`sf2`, `sfz`, `gig`).
//! `sf2` files sit in bank directories; the other types keep one
//! directory per soundfont.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ensure_within, file_name_string, move_path, remove_path, rename_in_place, sorted_entries, IdCounter};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoundfontNodeType {
    SoundfontType,
    Bank,
    Soundfont,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundfontNode {
    pub id: u32,
    pub text: String,
    pub name: String,
    pub fullpath: PathBuf,
    /// Type directory this node belongs to
    #[serde(rename = "soundfontType")]
    pub soundfont_type: String,
    #[serde(rename = "nodeType")]
    pub node_type: SoundfontNodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<SoundfontNode>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoundfontTree {
    pub nodes: Vec<SoundfontNode>,
    /// Id of the node at the requested selection, 0 when absent
    pub selected_id: u32,
}

#[derive(Debug, Clone)]
pub struct SoundfontLibrary {
    root: PathBuf,
}

struct Walker<'a> {
    ids: IdCounter,
    selected: Option<&'a Path>,
    selected_id: u32,
}

impl SoundfontLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tree(&self, selected: Option<&Path>) -> Result<SoundfontTree> {
        if !self.root.is_dir() {
            debug!("Soundfont directory {:?} missing", self.root);
            return Ok(SoundfontTree {
                nodes: Vec::new(),
                selected_id: 0,
            });
        }
        let mut walker = Walker {
            ids: IdCounter::new(),
            selected,
            selected_id: 0,
        };
        let nodes = walker.walk(&self.root, None, "")?;
        Ok(SoundfontTree {
            nodes,
            selected_id: walker.selected_id,
        })
    }

    /// Create a bank directory under `parent`
    pub fn new_bank(&self, parent: &Path, name: &str) -> Result<PathBuf> {
        super::validate_file_name(name)?;
        let parent = ensure_within(&self.root, parent)?;
        if !parent.is_dir() {
            return Err(Error::not_found("Directory", parent.display()));
        }
        let bank = parent.join(name);
        if bank.exists() {
            return Err(Error::already_exists("Bank", bank.display()));
        }
        std::fs::create_dir(&bank)?;
        info!("Created soundfont bank {:?}", bank);
        Ok(bank)
    }

    /// Rename a bank or soundfont; files keep the `kind` extension
    pub fn rename(&self, path: &Path, new_name: &str, kind: Option<&str>) -> Result<PathBuf> {
        let path = ensure_within(&self.root, path)?;
        let mut new_name = new_name.to_string();
        if let Some(kind) = kind.filter(|k| !k.is_empty()) {
            if path.is_file() {
                let ext = Path::new(&new_name).extension().map(|e| e.to_string_lossy().into_owned());
                if ext.as_deref() != Some(kind) {
                    new_name = format!("{}.{}", new_name, kind);
                }
            }
        }
        rename_in_place(&path, &new_name)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let path = ensure_within(&self.root, path)?;
        remove_path(&path)
    }

    /// Flatten a download: lift `.<kind>` files up into `dir`, drop subdirectories
    pub fn cleanup_download(&self, dir: &Path, kind: &str) -> Result<Vec<PathBuf>> {
        let dir = ensure_within(&self.root, dir)?;
        let mut lifted = Vec::new();
        cleanup(&dir, &dir, kind, &mut lifted)?;
        Ok(lifted)
    }
}

impl Walker<'_> {
    fn walk(&mut self, dir: &Path, parent: Option<SoundfontNodeType>, kind: &str) -> Result<Vec<SoundfontNode>> {
        let mut nodes = Vec::new();

        for entry in sorted_entries(dir)? {
            let fullpath = entry.path();
            let text = file_name_string(&fullpath);

            let (node_type, kind) = match parent {
                None => {
                    let node_type = if text == "sf2" {
                        SoundfontNodeType::Bank
                    } else {
                        SoundfontNodeType::SoundfontType
                    };
                    (node_type, text.clone())
                }
                Some(SoundfontNodeType::SoundfontType) => {
                    let is_sf2 = fullpath.extension().is_some_and(|e| e == "sf2");
                    let node_type = if is_sf2 {
                        SoundfontNodeType::Soundfont
                    } else {
                        SoundfontNodeType::Bank
                    };
                    (node_type, kind.to_string())
                }
                Some(_) => (SoundfontNodeType::Soundfont, kind.to_string()),
            };

            let id = self.ids.next_id();
            if self.selected == Some(fullpath.as_path()) {
                self.selected_id = id;
            }

            let nodes_below = if fullpath.is_dir() {
                Some(self.walk(&fullpath, Some(node_type), &kind)?)
            } else {
                None
            };

            nodes.push(SoundfontNode {
                id,
                name: text.clone(),
                text,
                fullpath,
                soundfont_type: kind,
                node_type,
                nodes: nodes_below,
            });
        }

        Ok(nodes)
    }
}

fn cleanup(current: &Path, target: &Path, kind: &str, lifted: &mut Vec<PathBuf>) -> Result<()> {
    let suffix = format!(".{}", kind);
    for entry in sorted_entries(current)? {
        let path = entry.path();
        let name = file_name_string(&path);
        if path.is_dir() {
            cleanup(&path, target, kind, lifted)?;
            std::fs::remove_dir_all(&path)?;
        } else if current != target && !name.starts_with('.') && name.ends_with(&suffix) {
            let dest = target.join(&name);
            move_path(&path, &dest)?;
            debug!("Lifted {:?} into {:?}", path, target);
            lifted.push(dest);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SoundfontLibrary) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("soundfonts");
        std::fs::create_dir_all(root.join("sf2/GM")).unwrap();
        std::fs::create_dir_all(root.join("sfz/Piano")).unwrap();
        std::fs::write(root.join("sf2/GM/FluidR3.sf2"), b"x").unwrap();
        std::fs::write(root.join("sf2/Strings.sf2"), b"x").unwrap();
        std::fs::write(root.join("sfz/Piano/piano.sfz"), b"x").unwrap();
        (tmp, SoundfontLibrary::new(root))
    }

    #[test]
    fn test_tree_node_types() {
        let (_tmp, lib) = fixture();
        let tree = lib.tree(None).unwrap();

        let sf2 = &tree.nodes[0];
        assert_eq!(sf2.text, "sf2");
        assert_eq!(sf2.node_type, SoundfontNodeType::Bank);
        let sf2_children = sf2.nodes.as_ref().unwrap();
        assert_eq!(sf2_children[0].text, "GM");
        assert_eq!(sf2_children[0].node_type, SoundfontNodeType::Soundfont);
        assert_eq!(sf2_children[0].soundfont_type, "sf2");

        let sfz = &tree.nodes[1];
        assert_eq!(sfz.node_type, SoundfontNodeType::SoundfontType);
        let piano = &sfz.nodes.as_ref().unwrap()[0];
        assert_eq!(piano.node_type, SoundfontNodeType::Bank);
        assert_eq!(piano.nodes.as_ref().unwrap()[0].node_type, SoundfontNodeType::Soundfont);
    }

    #[test]
    fn test_tree_ids_and_selection() {
        let (_tmp, lib) = fixture();
        let selected = lib.root().join("sfz/Piano");
        let tree = lib.tree(Some(&selected)).unwrap();

        // sf2=0, GM=1, FluidR3=2, Strings=3, sfz=4, Piano=5, piano.sfz=6
        assert_eq!(tree.nodes[1].id, 4);
        assert_eq!(tree.selected_id, 5);
        assert_eq!(lib.tree(None).unwrap().selected_id, 0);
    }

    #[test]
    fn test_new_bank_and_rename() {
        let (_tmp, lib) = fixture();
        let bank = lib.new_bank(&lib.root().join("sf2"), "Drums").unwrap();
        assert!(bank.is_dir());
        assert!(lib.new_bank(&lib.root().join("sf2"), "Drums").is_err());

        let renamed = lib
            .rename(&lib.root().join("sf2/Strings.sf2"), "Orchestra", Some("sf2"))
            .unwrap();
        assert_eq!(renamed, lib.root().join("sf2/Orchestra.sf2"));

        let renamed = lib.rename(&bank, "Percussion", Some("sf2")).unwrap();
        assert_eq!(renamed, lib.root().join("sf2/Percussion"));
    }

    #[test]
    fn test_cleanup_download() {
        let (_tmp, lib) = fixture();
        let target = lib.root().join("sf2/GM");
        std::fs::create_dir_all(target.join("pack/nested")).unwrap();
        std::fs::write(target.join("pack/nested/Extra.sf2"), b"x").unwrap();
        std::fs::write(target.join("pack/.hidden.sf2"), b"x").unwrap();
        std::fs::write(target.join("pack/readme.txt"), b"x").unwrap();

        let lifted = lib.cleanup_download(&target, "sf2").unwrap();
        assert_eq!(lifted, vec![target.join("Extra.sf2")]);
        assert!(!target.join("pack").exists());
        assert!(target.join("FluidR3.sf2").exists());
    }

    #[test]
    fn test_remove_outside_root_rejected() {
        let (tmp, lib) = fixture();
        assert!(lib.remove(tmp.path()).is_err());
        lib.remove(&lib.root().join("sfz/Piano")).unwrap();
        assert!(!lib.root().join("sfz/Piano").exists());
    }
}
