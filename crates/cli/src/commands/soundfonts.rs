//! Soundfont library and catalogue commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use webconf_common::artifacts::{Artifact, ArtifactsClient};
use webconf_common::library::{SoundfontLibrary, SoundfontNode, SoundfontNodeType};

use super::Context;
use crate::output::{print_list, print_tree, TableDisplay, TreeDisplay};

const DESCRIPTION_DISPLAY_LENGTH: usize = 60;

#[derive(Subcommand)]
pub enum SoundfontsCommands {
    /// Show the soundfont tree
    Tree {
        /// Highlight this path
        #[arg(long)]
        selected: Option<PathBuf>,
    },

    /// Create a bank directory
    NewBank {
        /// Parent directory, e.g. `sf2`
        parent: PathBuf,
        name: String,
    },

    /// Rename a bank or soundfont
    Rename {
        path: PathBuf,
        new_name: String,

        /// Soundfont type whose extension files keep
        #[arg(long)]
        kind: Option<String>,
    },

    /// Delete a bank or soundfont
    Remove {
        path: PathBuf,
    },

    /// Flatten a downloaded directory
    Cleanup {
        dir: PathBuf,
        kind: String,
    },

    /// Search the musical-artifacts catalogue
    Search {
        /// Comma-separated formats, e.g. `sf2,sfz`
        #[arg(long)]
        formats: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Download an artifact into a library directory
    Download {
        url: String,

        /// Destination directory, e.g. `sf2`
        dest: PathBuf,

        /// Soundfont type to keep from archives
        #[arg(long, default_value = "sf2")]
        kind: String,
    },
}

impl TreeDisplay for SoundfontNode {
    fn id(&self) -> u32 {
        self.id
    }

    fn label(&self) -> String {
        self.text.clone()
    }

    fn kind(&self) -> String {
        let kind = match self.node_type {
            SoundfontNodeType::SoundfontType => "type",
            SoundfontNodeType::Bank => "bank",
            SoundfontNodeType::Soundfont => "soundfont",
        };
        format!("{} ({})", kind, self.soundfont_type)
    }

    fn children(&self) -> &[Self] {
        self.nodes.as_deref().unwrap_or_default()
    }
}

impl TableDisplay for Artifact {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Formats", "License", "Description", "File"]
    }

    fn row(&self) -> Vec<String> {
        let description = self.description.clone().unwrap_or_default();
        let description = if description.chars().count() > DESCRIPTION_DISPLAY_LENGTH {
            let short: String = description.chars().take(DESCRIPTION_DISPLAY_LENGTH).collect();
            format!("{}…", short)
        } else {
            description
        };
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.name.clone(),
            self.formats.join(","),
            self.license.clone().unwrap_or_default(),
            description,
            self.file.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(cmd: SoundfontsCommands, ctx: &Context) -> Result<()> {
    let library = SoundfontLibrary::new(ctx.config.soundfonts_dir());

    match cmd {
        SoundfontsCommands::Tree { selected } => {
            let selected = selected.map(|p| library.root().join(p));
            let tree = library.tree(selected.as_deref())?;
            print_tree(&tree.nodes, Some(tree.selected_id), ctx.format);
        }

        SoundfontsCommands::NewBank { parent, name } => {
            let bank = library.new_bank(&parent, &name)?;
            ctx.done(&format!("Created bank {}", bank.display()));
        }

        SoundfontsCommands::Rename { path, new_name, kind } => {
            let renamed = library.rename(&path, &new_name, kind.as_deref())?;
            ctx.done(&format!("Renamed to {}", renamed.display()));
        }

        SoundfontsCommands::Remove { path } => {
            library.remove(&path)?;
            ctx.done(&format!("Removed {}", path.display()));
        }

        SoundfontsCommands::Cleanup { dir, kind } => {
            let lifted = library.cleanup_download(&dir, &kind)?;
            ctx.done(&format!("Moved {} file(s) into {}", lifted.len(), dir.display()));
        }

        SoundfontsCommands::Search { formats, tags } => {
            let client = ArtifactsClient::new(&ctx.config.artifacts)?;
            let results = client.search(formats.as_deref(), tags.as_deref()).await?;
            print_list(&results, ctx.format);
        }

        SoundfontsCommands::Download { url, dest, kind } => {
            let dest = webconf_common::library::ensure_within(library.root(), &dest)?;
            std::fs::create_dir_all(&dest)?;
            let client = ArtifactsClient::new(&ctx.config.artifacts)?;
            let download = client.download(&url, &dest, &kind).await?;
            for file in &download.files {
                tracing::debug!("Installed {:?}", file);
            }
            ctx.done(&format!(
                "Downloaded {} ({} {} file(s))",
                download.stored.display(),
                download.files.len(),
                kind
            ));
        }
    }

    Ok(())
}
