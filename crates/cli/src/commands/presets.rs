//! Preset browser commands

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;

use webconf_common::library::install::install_upload;
use webconf_common::library::presets::preset_tree;
use webconf_common::library::{DirectoryEngine, PresetEngine, PresetNode, PresetNodeType};

use super::Context;
use crate::output::{print_tree, TreeDisplay};

#[derive(Subcommand)]
pub enum PresetsCommands {
    /// Show banks and presets
    Tree,

    /// Create a bank in the first writable root
    NewBank {
        name: String,
    },

    /// Rename a bank
    RenameBank {
        bank: PathBuf,
        name: String,
    },

    /// Delete a bank and its presets
    RemoveBank {
        bank: PathBuf,
    },

    /// Rename a preset
    Rename {
        preset: PathBuf,
        name: String,
    },

    /// Delete a preset
    Remove {
        preset: PathBuf,
    },

    /// Install an uploaded preset file or archive into a bank
    Install {
        /// File, archive or http(s) URL
        upload: String,
        bank: PathBuf,
    },
}

impl TreeDisplay for PresetNode {
    fn id(&self) -> u32 {
        self.id
    }

    fn label(&self) -> String {
        if self.readonly && self.node_type != PresetNodeType::BankHead {
            format!("{} (read-only)", self.text)
        } else {
            self.text.clone()
        }
    }

    fn kind(&self) -> String {
        match self.node_type {
            PresetNodeType::BankHead => "group",
            PresetNodeType::Bank => "bank",
            PresetNodeType::Preset => "preset",
        }
        .to_string()
    }

    fn children(&self) -> &[Self] {
        self.nodes.as_deref().unwrap_or_default()
    }
}

pub async fn execute(cmd: PresetsCommands, ctx: &Context) -> Result<()> {
    let engine = DirectoryEngine::from_config(&ctx.config);

    match cmd {
        PresetsCommands::Tree => {
            let tree = preset_tree(&engine)?;
            print_tree(&tree, None, ctx.format);
        }

        PresetsCommands::NewBank { name } => {
            let bank = engine.new_bank(&name)?;
            ctx.done(&format!("Created bank {}", bank.display()));
        }

        PresetsCommands::RenameBank { bank, name } => {
            let renamed = engine.rename_bank(&bank, &name)?;
            ctx.done(&format!("Renamed to {}", renamed.display()));
        }

        PresetsCommands::RemoveBank { bank } => {
            engine.remove_bank(&bank)?;
            ctx.done(&format!("Removed {}", bank.display()));
        }

        PresetsCommands::Rename { preset, name } => {
            let renamed = engine.rename_preset(&preset, &name)?;
            ctx.done(&format!("Renamed to {}", renamed.display()));
        }

        PresetsCommands::Remove { preset } => {
            engine.remove_preset(&preset)?;
            ctx.done(&format!("Removed {}", preset.display()));
        }

        PresetsCommands::Install { upload, bank } => {
            let upload = ctx.fetch_upload(&upload).await?;
            let installed = install_upload(&upload, |content| engine.install(content, &bank))?;
            if installed.is_empty() {
                bail!("No presets installed from {}", upload.display());
            }
            ctx.done(&format!(
                "Installed {} preset(s) ({})",
                installed.len(),
                engine.formats().join(", ")
            ));
        }
    }

    Ok(())
}
