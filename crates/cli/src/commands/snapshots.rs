//! Snapshot library commands
//!
//! Paths are taken relative to the snapshot directory unless absolute.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;

use webconf_common::library::install::install_upload;
use webconf_common::library::snapshots;
use webconf_common::library::{SaveRequest, Selection, SnapshotLibrary, SnapshotNode, SnapshotNodeType};

use super::Context;
use crate::output::{print_list, print_tree, print_value, TableDisplay, TreeDisplay};

#[derive(Subcommand)]
pub enum SnapshotsCommands {
    /// Show the snapshot tree
    Tree {
        /// Highlight this bank number
        #[arg(long)]
        bank: Option<String>,

        /// Highlight this program number within the bank
        #[arg(long)]
        prog: Option<String>,

        /// Last form action, e.g. SAVE_AS_DEFAULT
        #[arg(long)]
        action: Option<String>,
    },

    /// Create an empty bank
    NewBank {
        /// Bank number; the first free one when omitted
        num: Option<u32>,
    },

    /// Move or rename a bank or snapshot
    Save {
        path: PathBuf,

        /// New bank number (banks)
        #[arg(long)]
        bank_num: Option<String>,

        /// Destination bank directory (snapshots)
        #[arg(long)]
        bank: Option<String>,

        /// Program number (snapshots)
        #[arg(long)]
        prog_num: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a bank or snapshot
    Remove {
        path: PathBuf,
    },

    /// Use a snapshot as the default
    Default {
        path: PathBuf,
    },

    /// Use a snapshot as the last state
    LastState {
        path: PathBuf,
    },

    /// Install an uploaded snapshot file or archive into a bank
    Install {
        /// File, archive or http(s) URL
        upload: String,

        /// Destination bank; the library root when omitted
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// List MIDI profile scripts
    Profiles,

    /// Merge a MIDI profile into a snapshot
    AddProfile {
        snapshot: PathBuf,
        profile: String,
    },

    /// Drop one MIDI profile option from a snapshot
    RemoveOption {
        snapshot: PathBuf,
        key: String,
    },
}

impl TreeDisplay for SnapshotNode {
    fn id(&self) -> u32 {
        self.id
    }

    fn label(&self) -> String {
        self.text.clone()
    }

    fn kind(&self) -> String {
        match self.node_type {
            SnapshotNodeType::Bank => "bank".to_string(),
            SnapshotNodeType::Snapshot => "snapshot".to_string(),
        }
    }

    fn children(&self) -> &[Self] {
        self.nodes.as_deref().unwrap_or_default()
    }
}

#[derive(Serialize)]
pub struct ProfileRow {
    pub name: String,
    pub path: PathBuf,
}

impl TableDisplay for ProfileRow {
    fn headers() -> Vec<&'static str> {
        vec!["Profile", "Path"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.path.display().to_string()]
    }
}

pub async fn execute(cmd: SnapshotsCommands, ctx: &Context) -> Result<()> {
    let library = SnapshotLibrary::new(ctx.config.snapshots_dir(), ctx.config.midi_profiles_dir());

    match cmd {
        SnapshotsCommands::Tree { bank, prog, action } => {
            let tree = library.tree()?;
            let selection = Selection {
                bank_num: bank,
                prog_num: prog,
                action,
            };
            let selected = SnapshotLibrary::selected_node_id(&tree, &selection);
            print_tree(&tree, Some(selected), ctx.format);
        }

        SnapshotsCommands::NewBank { num } => {
            let path = library.new_bank(num)?;
            ctx.done(&format!("Created bank {}", path.display()));
        }

        SnapshotsCommands::Save {
            path,
            bank_num,
            bank,
            prog_num,
            name,
        } => {
            let target = library.save(&SaveRequest {
                path,
                bank_num,
                bank,
                prog_num,
                name,
            })?;
            ctx.done(&format!("Saved as {}", target.display()));
        }

        SnapshotsCommands::Remove { path } => {
            library.remove(&path)?;
            ctx.done(&format!("Removed {}", path.display()));
        }

        SnapshotsCommands::Default { path } => {
            let dest = library.save_as_default(&path)?;
            ctx.done(&format!("Stored {}", dest.display()));
        }

        SnapshotsCommands::LastState { path } => {
            let dest = library.save_as_last_state(&path)?;
            ctx.done(&format!("Stored {}", dest.display()));
        }

        SnapshotsCommands::Install { upload, bank } => {
            let upload = ctx.fetch_upload(&upload).await?;
            let dest = bank
                .map(|b| library.root().join(b))
                .unwrap_or_else(|| library.root().to_path_buf());
            let installed = install_upload(&upload, |content| {
                let files = if content.is_dir() {
                    snapshots::collect_snapshots(content)?
                } else {
                    vec![content.to_path_buf()]
                };
                library.install(&files, &dest)
            })?;
            if installed.is_empty() {
                bail!("No snapshots found in {}", upload.display());
            }
            ctx.done(&format!("Installed {} snapshot(s)", installed.len()));
        }

        SnapshotsCommands::Profiles => {
            let rows: Vec<ProfileRow> = library
                .midi_profile_scripts()?
                .into_iter()
                .map(|(name, path)| ProfileRow { name, path })
                .collect();
            print_list(&rows, ctx.format);
        }

        SnapshotsCommands::AddProfile { snapshot, profile } => {
            let scripts = library.midi_profile_scripts()?;
            let Some(script) = scripts.get(&profile) else {
                bail!("Unknown MIDI profile '{}'", profile);
            };
            let data = library.add_profile_options(&snapshot, script)?;
            print_value(&data["midi_profile_state"], ctx.format);
        }

        SnapshotsCommands::RemoveOption { snapshot, key } => {
            let data = library.remove_profile_option(&snapshot, &key)?;
            print_value(&data["midi_profile_state"], ctx.format);
        }
    }

    Ok(())
}
