//! Preset browser
//!
//! Preset storage differs per synth engine, so the browser talks to a
//! [`PresetEngine`]. [`DirectoryEngine`] covers engines whose banks are
//! plain directories of preset files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{ensure_within, file_name_string, move_path, remove_path, rename_in_place, sorted_entries, IdCounter};
use crate::config::WebconfConfig;
use crate::{Error, Result};

/// Bank listing entry; a `None` fullpath marks a group header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankInfo {
    pub text: String,
    pub name: String,
    pub fullpath: Option<PathBuf>,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetInfo {
    pub text: String,
    pub name: String,
    pub fullpath: PathBuf,
    pub readonly: bool,
}

/// Bank and preset storage of one synth engine
pub trait PresetEngine {
    fn banks(&self) -> Result<Vec<BankInfo>>;
    fn presets(&self, bank: &BankInfo) -> Result<Vec<PresetInfo>>;
    /// Accepted upload extensions
    fn formats(&self) -> Vec<String>;
    fn new_bank(&self, name: &str) -> Result<PathBuf>;
    fn rename_bank(&self, bank: &Path, name: &str) -> Result<PathBuf>;
    fn remove_bank(&self, bank: &Path) -> Result<()>;
    fn rename_preset(&self, preset: &Path, name: &str) -> Result<PathBuf>;
    fn remove_preset(&self, preset: &Path) -> Result<()>;
    /// Copy presets found in `source` (file or directory) into `bank`
    fn install(&self, source: &Path, bank: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresetNodeType {
    BankHead,
    Bank,
    Preset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetNode {
    pub id: u32,
    pub text: String,
    pub name: String,
    pub fullpath: Option<PathBuf>,
    pub readonly: bool,
    pub node_type: PresetNodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_fullpath: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<PresetNode>>,
}

/// Build the browser tree; headers group the banks that follow them
pub fn preset_tree(engine: &dyn PresetEngine) -> Result<Vec<PresetNode>> {
    let mut ids = IdCounter::new();
    let mut top = Vec::new();
    let mut head: Option<PresetNode> = None;
    let mut banks = Vec::new();

    for bank in engine.banks()? {
        let Some(bank_path) = bank.fullpath.clone() else {
            flush(&mut top, head.take(), &mut banks);
            head = Some(PresetNode {
                id: ids.next_id(),
                text: bank.text,
                name: bank.name,
                fullpath: None,
                readonly: false,
                node_type: PresetNodeType::BankHead,
                bank_fullpath: None,
                nodes: None,
            });
            continue;
        };

        let id = ids.next_id();
        let presets = match engine.presets(&bank) {
            Ok(presets) => presets
                .into_iter()
                .map(|p| PresetNode {
                    id: ids.next_id(),
                    text: p.text,
                    name: p.name,
                    fullpath: Some(p.fullpath),
                    readonly: p.readonly || bank.readonly,
                    node_type: PresetNodeType::Preset,
                    bank_fullpath: Some(bank_path.clone()),
                    nodes: None,
                })
                .collect(),
            Err(e) => {
                error!("Can't list presets of {:?}: {}", bank_path, e);
                Vec::new()
            }
        };

        banks.push(PresetNode {
            id,
            text: bank.text,
            name: bank.name,
            fullpath: Some(bank_path),
            readonly: bank.readonly,
            node_type: PresetNodeType::Bank,
            bank_fullpath: None,
            nodes: Some(presets),
        });
    }
    flush(&mut top, head, &mut banks);
    Ok(top)
}

// Headers without banks are dropped; banks before any header stay top level
fn flush(top: &mut Vec<PresetNode>, head: Option<PresetNode>, banks: &mut Vec<PresetNode>) {
    match head {
        Some(mut head) => {
            if !banks.is_empty() {
                head.nodes = Some(std::mem::take(banks));
                top.push(head);
            }
        }
        None => top.append(banks),
    }
}

/// One bank root of a [`DirectoryEngine`]
#[derive(Debug, Clone)]
pub struct BankRoot {
    pub title: String,
    pub path: PathBuf,
    pub readonly: bool,
}

/// Engine whose banks are subdirectories of one or more roots
#[derive(Debug, Clone)]
pub struct DirectoryEngine {
    roots: Vec<BankRoot>,
    extensions: Vec<String>,
}

impl DirectoryEngine {
    pub fn new(roots: Vec<BankRoot>, extensions: Vec<String>) -> Self {
        let extensions = extensions.into_iter().map(|e| e.to_ascii_lowercase()).collect();
        Self { roots, extensions }
    }

    pub fn from_config(config: &WebconfConfig) -> Self {
        let roots = config
            .presets
            .roots
            .iter()
            .map(|r| BankRoot {
                title: r.title.clone(),
                path: config.preset_root_path(r),
                readonly: r.readonly,
            })
            .collect();
        Self::new(roots, config.presets.extensions.clone())
    }

    fn is_preset(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.contains(&e))
    }

    /// Resolve `path` inside a writable root
    fn writable(&self, path: &Path) -> Result<PathBuf> {
        for root in &self.roots {
            if let Ok(resolved) = ensure_within(&root.path, path) {
                if root.readonly {
                    return Err(Error::InvalidInput(format!(
                        "{} is read-only",
                        path.display()
                    )));
                }
                return Ok(resolved);
            }
        }
        Err(Error::PathTraversal(path.display().to_string()))
    }
}

impl PresetEngine for DirectoryEngine {
    fn banks(&self) -> Result<Vec<BankInfo>> {
        let grouped = self.roots.len() > 1;
        let mut banks = Vec::new();

        for root in &self.roots {
            if grouped {
                banks.push(BankInfo {
                    text: root.title.clone(),
                    name: root.title.clone(),
                    fullpath: None,
                    readonly: root.readonly,
                });
            }
            if !root.path.is_dir() {
                continue;
            }
            for entry in sorted_entries(&root.path)? {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let text = file_name_string(&path);
                banks.push(BankInfo {
                    name: text.clone(),
                    text,
                    fullpath: Some(path),
                    readonly: root.readonly,
                });
            }
        }
        Ok(banks)
    }

    fn presets(&self, bank: &BankInfo) -> Result<Vec<PresetInfo>> {
        let Some(dir) = &bank.fullpath else {
            return Ok(Vec::new());
        };
        Ok(sorted_entries(dir)?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_file() && self.is_preset(p))
            .map(|p| PresetInfo {
                text: file_name_string(&p),
                name: p
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                fullpath: p,
                readonly: bank.readonly,
            })
            .collect())
    }

    fn formats(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn new_bank(&self, name: &str) -> Result<PathBuf> {
        super::validate_file_name(name)?;
        let root = self
            .roots
            .iter()
            .find(|r| !r.readonly)
            .ok_or_else(|| Error::InvalidInput("No writable bank root".to_string()))?;
        let bank = root.path.join(name);
        if bank.exists() {
            return Err(Error::already_exists("Bank", name));
        }
        std::fs::create_dir_all(&bank)?;
        info!("Created preset bank {:?}", bank);
        Ok(bank)
    }

    fn rename_bank(&self, bank: &Path, name: &str) -> Result<PathBuf> {
        let bank = self.writable(bank)?;
        rename_in_place(&bank, name)
    }

    fn remove_bank(&self, bank: &Path) -> Result<()> {
        let bank = self.writable(bank)?;
        if !bank.is_dir() {
            return Err(Error::not_found("Bank", bank.display()));
        }
        remove_path(&bank)
    }

    fn rename_preset(&self, preset: &Path, name: &str) -> Result<PathBuf> {
        let preset = self.writable(preset)?;
        let mut name = name.to_string();
        if let Some(ext) = preset.extension() {
            if Path::new(&name).extension() != Some(ext) {
                name = format!("{}.{}", name, ext.to_string_lossy());
            }
        }
        rename_in_place(&preset, &name)
    }

    fn remove_preset(&self, preset: &Path) -> Result<()> {
        let preset = self.writable(preset)?;
        if !preset.is_file() {
            return Err(Error::not_found("Preset", preset.display()));
        }
        remove_path(&preset)
    }

    fn install(&self, source: &Path, bank: &Path) -> Result<Vec<PathBuf>> {
        let bank = self.writable(bank)?;
        if !bank.is_dir() {
            return Err(Error::not_found("Bank", bank.display()));
        }

        let mut installed = Vec::new();
        for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.is_preset(entry.path()) {
                continue;
            }
            let dest = bank.join(entry.file_name());
            move_path(entry.path(), &dest)?;
            info!("Installed preset {:?}", dest);
            installed.push(dest);
        }

        if installed.is_empty() {
            return Err(Error::UnsupportedFormat(format!(
                "no {} presets in {}",
                self.extensions.join("/"),
                source.display()
            )));
        }
        Ok(installed)
    }
}
