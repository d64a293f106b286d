//! Snapshot library
//!
//! Snapshots are `.zss` JSON files. Bank directories (`NNN-Name`) directly
//! under the library root group them by MIDI bank, and the file name
//! (`PPP-Name.zss`) gives the program number. `default.zss` and
//! `last_state.zss` live at the root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::naming::{next_bank_number, numbered_name, parse_number, split_numbered, zero_pad};
use super::{ensure_within, file_name_string, move_path, remove_path, sorted_entries, IdCounter};
use crate::envfile::EnvFile;
use crate::{Error, Result};

/// Snapshot file extension
pub const SNAPSHOT_EXT: &str = "zss";

/// Prefix of the MIDI profile variables merged into snapshots
pub const MIDI_PROFILE_PREFIX: &str = "ZYNTHIAN_MIDI_";

const PROFILE_STATE_KEY: &str = "midi_profile_state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotNodeType {
    Bank,
    Snapshot,
}

/// Tree node of the snapshot browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: u32,
    /// File or directory name
    pub text: String,
    pub name: String,
    pub fullpath: PathBuf,
    pub node_type: SnapshotNodeType,
    pub bank_num: String,
    pub bank_name: String,
    pub prog_num: String,
    pub prog_name: String,
    /// Parsed snapshot contents
    pub prog_details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<SnapshotNode>>,
}

/// Move/rename request for a bank or snapshot
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Bank directory or snapshot file being saved
    pub path: PathBuf,
    /// New bank number, when saving a bank
    pub bank_num: Option<String>,
    /// Destination bank directory name, when saving a snapshot
    pub bank: Option<String>,
    pub prog_num: Option<String>,
    pub name: Option<String>,
}

/// What the form had selected before an action
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub bank_num: Option<String>,
    pub prog_num: Option<String>,
    pub action: Option<String>,
}

/// Snapshot library rooted at a directory
#[derive(Debug, Clone)]
pub struct SnapshotLibrary {
    root: PathBuf,
    profiles_dir: PathBuf,
}

impl SnapshotLibrary {
    pub fn new(root: impl Into<PathBuf>, profiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            profiles_dir: profiles_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the browser tree
    pub fn tree(&self) -> Result<Vec<SnapshotNode>> {
        if !self.root.is_dir() {
            debug!("Snapshot directory {:?} missing", self.root);
            return Ok(Vec::new());
        }
        let mut ids = IdCounter::new();
        walk(&self.root, None, &mut ids)
    }

    /// Bank directory names at the root, sorted
    pub fn existing_banks(tree: &[SnapshotNode], include_name: bool) -> Vec<String> {
        let mut banks: Vec<String> = tree
            .iter()
            .filter(|n| n.node_type == SnapshotNodeType::Bank)
            .map(|n| {
                let num = zero_pad(&n.bank_num, 3);
                if include_name && !n.bank_name.is_empty() {
                    format!("{}-{}", num, n.bank_name)
                } else {
                    num
                }
            })
            .collect();
        banks.sort();
        banks
    }

    pub fn next_bank_number(&self) -> Result<Option<u32>> {
        let tree = self.tree()?;
        Ok(next_bank_number(&Self::existing_banks(&tree, false)))
    }

    /// Create an empty bank, picking the next free number when `num` is `None`
    pub fn new_bank(&self, num: Option<u32>) -> Result<PathBuf> {
        let existing = Self::existing_banks(&self.tree()?, false);
        let num = match num {
            Some(n) => n,
            None => next_bank_number(&existing)
                .ok_or_else(|| Error::InvalidInput("No free bank number left".to_string()))?,
        };
        let dname = zero_pad(&num.to_string(), 3);
        if existing.contains(&dname) {
            return Err(Error::already_exists("Bank", dname));
        }

        let path = self.root.join(&dname);
        std::fs::create_dir_all(&path)?;
        info!("Created snapshot bank {:?}", path);
        Ok(path)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let path = ensure_within(&self.root, path)?;
        remove_path(&path)
    }

    /// Move or rename a bank or snapshot
    pub fn save(&self, req: &SaveRequest) -> Result<PathBuf> {
        let path = ensure_within(&self.root, &req.path)?;
        if !path.exists() {
            return Err(Error::not_found("Snapshot", req.path.display()));
        }

        let target = if path.is_dir() {
            let bank_num = req
                .bank_num
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::InvalidInput("You must specify a bank number.".to_string()))?;
            let dname = numbered_name(bank_num, req.name.as_deref());
            super::validate_file_name(&dname)?;
            let target = self.root.join(dname);
            if target != path && target.exists() {
                return Err(Error::InvalidInput("Bank exists already!".to_string()));
            }
            target
        } else {
            let dir = match req.bank.as_deref().filter(|b| !b.is_empty()) {
                Some(bank) => {
                    let dir = ensure_within(&self.root, Path::new(bank))?;
                    if !dir.is_dir() {
                        return Err(Error::InvalidInput(
                            "Bank doesn't exist. You must create it before moving snapshots inside it."
                                .to_string(),
                        ));
                    }
                    dir
                }
                None => self.root.clone(),
            };

            let name = req.name.as_deref().filter(|n| !n.is_empty());
            let stem = match req.prog_num.as_deref().filter(|p| !p.is_empty()) {
                Some(prog) => numbered_name(prog, name),
                None => name.map(String::from).ok_or_else(|| {
                    Error::InvalidInput(
                        "You must specify a name or program number for the snapshot.".to_string(),
                    )
                })?,
            };
            super::validate_file_name(&stem)?;

            let target = dir.join(format!("{}.{}", stem, SNAPSHOT_EXT));
            if target != path && target.exists() {
                return Err(Error::InvalidInput(format!(
                    "This bank/program combination is already used: {}",
                    target.display()
                )));
            }
            target
        };

        if target != path {
            std::fs::rename(&path, &target)?;
            info!("Moved {:?} to {:?}", path, target);
        }
        Ok(target)
    }

    pub fn save_as_default(&self, path: &Path) -> Result<PathBuf> {
        self.copy_to_root(path, "default")
    }

    pub fn save_as_last_state(&self, path: &Path) -> Result<PathBuf> {
        self.copy_to_root(path, "last_state")
    }

    fn copy_to_root(&self, path: &Path, stem: &str) -> Result<PathBuf> {
        let src = ensure_within(&self.root, path)?;
        let dest = self.root.join(format!("{}.{}", stem, SNAPSHOT_EXT));
        info!("Copy {:?} to {:?}", src, dest);
        std::fs::copy(&src, &dest)?;
        Ok(dest)
    }

    /// Move uploaded files into a bank, or the root when `dest` is the root
    pub fn install(&self, files: &[PathBuf], dest: &Path) -> Result<Vec<PathBuf>> {
        let dest = if dest == self.root {
            self.root.clone()
        } else {
            ensure_within(&self.root, dest)?
        };
        if !dest.is_dir() {
            return Err(Error::not_found("Bank", dest.display()));
        }

        let mut installed = Vec::new();
        for file in files {
            let Some(name) = file.file_name() else {
                warn!("Skipping upload without file name: {:?}", file);
                continue;
            };
            let target = dest.join(name);
            move_path(file, &target)?;
            info!("Installed {:?}", target);
            installed.push(target);
        }
        Ok(installed)
    }

    /// Node to highlight after a form action
    pub fn selected_node_id(tree: &[SnapshotNode], sel: &Selection) -> u32 {
        let bank = sel.bank_num.as_deref().and_then(parse_number);
        let prog = sel.prog_num.as_deref().and_then(parse_number);
        let mut selected = 0;

        for node in tree {
            match node.node_type {
                SnapshotNodeType::Bank => {
                    if bank.is_none() || parse_number(&node.bank_num) != bank {
                        continue;
                    }
                    if selected == 0 {
                        selected = node.id;
                    }
                    let Some(children) = &node.nodes else { continue };
                    if let Some(child) = children
                        .iter()
                        .find(|c| prog.is_some() && parse_number(&c.prog_num) == prog)
                    {
                        selected = child.id;
                    }
                }
                SnapshotNodeType::Snapshot => {
                    let wanted = match sel.action.as_deref() {
                        Some("SAVE_AS_DEFAULT") => "default",
                        Some("SAVE_AS_LAST_STATE") => "last_state",
                        _ => continue,
                    };
                    if node.name == wanted {
                        selected = node.id;
                    }
                }
            }
        }

        debug!("Selected node: {}", selected);
        selected
    }

    /// MIDI profile scripts by name
    pub fn midi_profile_scripts(&self) -> Result<BTreeMap<String, PathBuf>> {
        if !self.profiles_dir.is_dir() {
            return Ok(BTreeMap::new());
        }
        let mut scripts = BTreeMap::new();
        for entry in sorted_entries(&self.profiles_dir)? {
            let path = entry.path();
            if path.is_file() {
                if let Some(stem) = path.file_stem() {
                    scripts.insert(stem.to_string_lossy().into_owned(), path);
                }
            }
        }
        Ok(scripts)
    }

    /// Drop one key from a snapshot's MIDI profile state
    pub fn remove_profile_option(&self, snapshot: &Path, key: &str) -> Result<Value> {
        let path = ensure_within(&self.root, snapshot)?;
        let mut data = read_json(&path)?;
        let removed = data
            .get_mut(PROFILE_STATE_KEY)
            .and_then(Value::as_object_mut)
            .and_then(|state| state.remove(key));
        if removed.is_none() {
            return Err(Error::not_found("Profile option", key));
        }
        write_json(&path, &data)?;
        info!("Removed option {} in {:?}", key, path);
        Ok(data)
    }

    /// Merge a MIDI profile script's values into a snapshot
    pub fn add_profile_options(&self, snapshot: &Path, script: &Path) -> Result<Value> {
        let path = ensure_within(&self.root, snapshot)?;
        let script = ensure_within(&self.profiles_dir, script)?;
        let mut data = read_json(&path)?;

        let obj = data
            .as_object_mut()
            .ok_or_else(|| Error::InvalidInput("Snapshot is not a JSON object".to_string()))?;
        let state = obj
            .entry(PROFILE_STATE_KEY)
            .or_insert_with(|| Value::Object(Default::default()));
        let state = state
            .as_object_mut()
            .ok_or_else(|| Error::InvalidInput(format!("{} is not an object", PROFILE_STATE_KEY)))?;

        for (name, value) in EnvFile::load(&script)?.prefixed(MIDI_PROFILE_PREFIX) {
            state.insert(name, Value::String(value));
        }

        write_json(&path, &data)?;
        info!("Added option values of {:?} into {:?}", script, path);
        Ok(data)
    }
}

fn walk(dir: &Path, bank: Option<(&str, &str)>, ids: &mut IdCounter) -> Result<Vec<SnapshotNode>> {
    let mut nodes = Vec::new();

    for entry in sorted_entries(dir)? {
        let fullpath = entry.path();
        let text = file_name_string(&fullpath);

        if fullpath.is_dir() {
            let (bank_num, bank_name) = split_numbered(&text);
            let id = ids.next_id();
            let children = walk(&fullpath, Some((&bank_num, &bank_name)), ids)?;
            nodes.push(SnapshotNode {
                id,
                name: bank_name.clone(),
                text,
                fullpath,
                node_type: SnapshotNodeType::Bank,
                bank_num,
                bank_name,
                prog_num: String::new(),
                prog_name: String::new(),
                prog_details: None,
                nodes: Some(children),
            });
            continue;
        }

        let Some(stem) = text.strip_suffix(&format!(".{}", SNAPSHOT_EXT)) else {
            continue;
        };

        let (bank_num, bank_name, prog_num, prog_name) = match bank {
            Some((num, name)) => {
                let (prog_num, prog_name) = split_numbered(stem);
                (zero_pad(num, 3), name.to_string(), prog_num, prog_name)
            }
            None => (String::new(), String::new(), String::new(), stem.to_string()),
        };

        let prog_details = match read_json(&fullpath) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Unreadable snapshot {:?}: {}", fullpath, e);
                None
            }
        };

        nodes.push(SnapshotNode {
            id: ids.next_id(),
            name: prog_name.clone(),
            text,
            fullpath,
            node_type: SnapshotNodeType::Snapshot,
            bank_num,
            bank_name,
            prog_num,
            prog_name,
            prog_details,
            nodes: None,
        });
    }

    Ok(nodes)
}

/// Snapshot files anywhere below `dir`, e.g. an unpacked upload
pub fn collect_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_snapshot = entry.path().extension().is_some_and(|e| e == SNAPSHOT_EXT);
        if entry.file_type().is_file() && is_snapshot {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_json(path: &Path, data: &Value) -> Result<()> {
    let text = serde_json::to_string(data)?;
    crate::envfile::write_atomic(path, text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SnapshotLibrary) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("snapshots");
        let profiles = tmp.path().join("midi-profiles");
        std::fs::create_dir_all(root.join("000")).unwrap();
        std::fs::create_dir_all(root.join("002-Live")).unwrap();
        std::fs::create_dir_all(&profiles).unwrap();
        std::fs::write(root.join("000/000-Init.zss"), r#"{"index":0}"#).unwrap();
        std::fs::write(root.join("000/005-Pads.zss"), r#"{"midi_profile_state":{"PORTS":"x"}}"#).unwrap();
        std::fs::write(root.join("002-Live/001.zss"), "not json").unwrap();
        std::fs::write(root.join("002-Live/notes.txt"), "skip").unwrap();
        std::fs::write(root.join("default.zss"), "{}").unwrap();
        std::fs::write(
            profiles.join("studio.sh"),
            "# studio\nexport ZYNTHIAN_MIDI_FILTER_OUTPUT=\"0\"\nexport ZYNTHIAN_MIDI_PORTS=\"DISABLED_OUT=\"\n",
        )
        .unwrap();
        let lib = SnapshotLibrary::new(root, profiles);
        (tmp, lib)
    }

    #[test]
    fn test_tree_structure_and_ids() {
        let (_tmp, lib) = fixture();
        let tree = lib.tree().unwrap();

        assert_eq!(tree.len(), 3);
        let bank0 = &tree[0];
        assert_eq!(bank0.id, 0);
        assert_eq!(bank0.node_type, SnapshotNodeType::Bank);
        assert_eq!(bank0.bank_num, "000");
        let progs = bank0.nodes.as_ref().unwrap();
        assert_eq!(progs.len(), 2);
        assert_eq!(progs[0].id, 1);
        assert_eq!(progs[1].prog_num, "005");
        assert_eq!(progs[1].prog_name, "Pads");
        assert_eq!(progs[0].prog_details.as_ref().unwrap()["index"], 0);

        let live = &tree[1];
        assert_eq!(live.id, 3);
        assert_eq!(live.bank_name, "Live");
        let live_progs = live.nodes.as_ref().unwrap();
        assert_eq!(live_progs.len(), 1);
        assert_eq!(live_progs[0].bank_num, "002");
        assert_eq!(live_progs[0].prog_name, "");
        assert!(live_progs[0].prog_details.is_none());

        let default = &tree[2];
        assert_eq!(default.id, 5);
        assert_eq!(default.prog_name, "default");
        assert_eq!(default.bank_num, "");
    }

    #[test]
    fn test_banks_and_new_bank() {
        let (_tmp, lib) = fixture();
        let tree = lib.tree().unwrap();
        assert_eq!(SnapshotLibrary::existing_banks(&tree, true), vec!["000", "002-Live"]);
        assert_eq!(lib.next_bank_number().unwrap(), Some(1));

        let created = lib.new_bank(None).unwrap();
        assert!(created.ends_with("001"));
        assert!(matches!(lib.new_bank(Some(2)), Err(Error::AlreadyExists { .. })));
    }

    #[test]
    fn test_save_snapshot_into_bank() {
        let (_tmp, lib) = fixture();
        let src = lib.root().join("000/005-Pads.zss");

        let moved = lib
            .save(&SaveRequest {
                path: src.clone(),
                bank: Some("002-Live".into()),
                prog_num: Some("010".into()),
                name: Some("Strings".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(moved, lib.root().join("002-Live/010-Strings.zss"));
        assert!(!src.exists());

        let err = lib
            .save(&SaveRequest {
                path: moved.clone(),
                bank: Some("009".into()),
                prog_num: Some("1".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("Bank doesn't exist"));

        let err = lib
            .save(&SaveRequest {
                path: moved,
                bank: Some("002-Live".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("name or program number"));
    }

    #[test]
    fn test_save_rejects_taken_program() {
        let (_tmp, lib) = fixture();
        let err = lib
            .save(&SaveRequest {
                path: lib.root().join("000/005-Pads.zss"),
                bank: Some("000".into()),
                prog_num: Some("000".into()),
                name: Some("Init".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn test_save_bank_rename() {
        let (_tmp, lib) = fixture();
        let renamed = lib
            .save(&SaveRequest {
                path: lib.root().join("000"),
                bank_num: Some("003".into()),
                name: Some("Piano".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(renamed.join("000-Init.zss").exists());

        let err = lib
            .save(&SaveRequest {
                path: renamed,
                bank_num: Some("002".into()),
                name: Some("Live".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Bank exists already!");
    }

    #[test]
    fn test_remove_guards_root() {
        let (_tmp, lib) = fixture();
        assert!(matches!(lib.remove(lib.root()), Err(Error::PathTraversal(_))));
        lib.remove(&lib.root().join("002-Live")).unwrap();
        assert!(!lib.root().join("002-Live").exists());
    }

    #[test]
    fn test_default_and_last_state() {
        let (_tmp, lib) = fixture();
        let src = lib.root().join("000/000-Init.zss");
        lib.save_as_default(&src).unwrap();
        lib.save_as_last_state(&src).unwrap();
        assert_eq!(
            std::fs::read_to_string(lib.root().join("last_state.zss")).unwrap(),
            r#"{"index":0}"#
        );

        let tree = lib.tree().unwrap();
        let sel = Selection {
            action: Some("SAVE_AS_LAST_STATE".into()),
            ..Default::default()
        };
        let id = SnapshotLibrary::selected_node_id(&tree, &sel);
        let node = tree.iter().find(|n| n.id == id).unwrap();
        assert_eq!(node.text, "last_state.zss");
    }

    #[test]
    fn test_selected_node_id() {
        let (_tmp, lib) = fixture();
        let tree = lib.tree().unwrap();

        let bank_only = Selection {
            bank_num: Some("2".into()),
            ..Default::default()
        };
        assert_eq!(SnapshotLibrary::selected_node_id(&tree, &bank_only), 3);

        let prog = Selection {
            bank_num: Some("0".into()),
            prog_num: Some("5".into()),
            ..Default::default()
        };
        assert_eq!(SnapshotLibrary::selected_node_id(&tree, &prog), 2);

        assert_eq!(SnapshotLibrary::selected_node_id(&tree, &Selection::default()), 0);
    }

    #[test]
    fn test_install_moves_files() {
        let (tmp, lib) = fixture();
        let upload = tmp.path().join("upload.zss");
        std::fs::write(&upload, "{}").unwrap();

        let installed = lib.install(&[upload.clone()], &lib.root().join("000")).unwrap();
        assert_eq!(installed, vec![lib.root().join("000/upload.zss")]);
        assert!(!upload.exists());
        assert!(lib.install(&[], &tmp.path().join("elsewhere")).is_err());
    }

    #[test]
    fn test_profile_options() {
        let (_tmp, lib) = fixture();
        let scripts = lib.midi_profile_scripts().unwrap();
        let script = scripts.get("studio").unwrap().clone();
        let snapshot = lib.root().join("000/005-Pads.zss");

        let data = lib.add_profile_options(&snapshot, &script).unwrap();
        assert_eq!(data["midi_profile_state"]["FILTER_OUTPUT"], "0");
        assert_eq!(data["midi_profile_state"]["PORTS"], "DISABLED_OUT=");

        let data = lib.remove_profile_option(&snapshot, "PORTS").unwrap();
        assert!(data["midi_profile_state"].get("PORTS").is_none());
        assert!(matches!(
            lib.remove_profile_option(&snapshot, "PORTS"),
            Err(Error::NotFound { .. })
        ));

        let on_disk = read_json(&snapshot).unwrap();
        assert_eq!(on_disk["midi_profile_state"]["FILTER_OUTPUT"], "0");
    }

    #[test]
    fn test_collect_snapshots() {
        let (_tmp, lib) = fixture();
        let found = collect_snapshots(lib.root()).unwrap();
        let names: Vec<_> = found.iter().map(|p| file_name_string(p)).collect();
        assert_eq!(names, vec!["000-Init.zss", "005-Pads.zss", "001.zss", "default.zss"]);
    }
}
