//! Capture browser commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use webconf_common::library::captures::content_type;
use webconf_common::library::{CaptureLibrary, CaptureNode, CaptureSource};

use super::Context;
use crate::output::{print_tree, TreeDisplay};

#[derive(Subcommand)]
pub enum CapturesCommands {
    /// List recordings grouped by type
    Tree {
        #[arg(long)]
        selected: Option<PathBuf>,
    },

    /// Rename a recording
    Rename {
        path: PathBuf,
        new_name: String,
    },

    /// Delete a recording
    Remove {
        path: PathBuf,
    },
}

impl TreeDisplay for CaptureNode {
    fn id(&self) -> u32 {
        self.id
    }

    fn label(&self) -> String {
        self.text.clone()
    }

    fn kind(&self) -> String {
        match self.source {
            Some(CaptureSource::Usb) => format!("{} (usb)", content_type(&self.text)),
            Some(CaptureSource::Local) => content_type(&self.text).to_string(),
            None => "group".to_string(),
        }
    }

    fn children(&self) -> &[Self] {
        self.nodes.as_deref().unwrap_or_default()
    }
}

pub async fn execute(cmd: CapturesCommands, ctx: &Context) -> Result<()> {
    let library = CaptureLibrary::new(ctx.config.captures_dir(), &ctx.config.paths.usb_mount_dir);
    let resolve = |p: PathBuf| library.local_dir().join(p);

    match cmd {
        CapturesCommands::Tree { selected } => {
            let selected = selected.map(resolve);
            let tree = library.tree(selected.as_deref())?;
            print_tree(&tree.nodes, Some(tree.selected_id), ctx.format);
        }

        CapturesCommands::Rename { path, new_name } => {
            let renamed = library.rename(&resolve(path), &new_name)?;
            ctx.done(&format!("Renamed to {}", renamed.display()));
        }

        CapturesCommands::Remove { path } => {
            let path = resolve(path);
            library.remove(&path)?;
            ctx.done(&format!("Removed {}", path.display()));
        }
    }

    Ok(())
}
