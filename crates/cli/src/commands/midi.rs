//! MIDI profile commands

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::warn;

use webconf_common::cuia::{CuiaClient, CuiaCommand};
use webconf_common::midi::{MidiProfiles, MIDI_FORM_DEFAULTS};
use webconf_common::settings::apply_checkbox_defaults;

use super::env::parse_assignments;
use super::Context;
use crate::output::{print_list, TableDisplay};

#[derive(Subcommand)]
pub enum MidiCommands {
    /// List profile scripts
    Profiles,

    /// Save the form as a new profile and make it active
    SaveAs {
        name: String,

        /// Form fields as NAME=VALUE; missing checkboxes become "0"
        assignments: Vec<String>,

        /// Don't ask the UI to reload its MIDI configuration
        #[arg(long)]
        no_reload: bool,
    },

    /// Save the form into the active profile
    Update {
        #[arg(required = true)]
        assignments: Vec<String>,

        #[arg(long)]
        no_reload: bool,
    },

    /// Delete a user profile; the default one becomes active
    Delete {
        /// Profile name or script path; the active profile when omitted
        profile: Option<String>,

        #[arg(long)]
        no_reload: bool,
    },
}

#[derive(Serialize)]
pub struct ProfileRow {
    pub name: String,
    pub path: PathBuf,
    pub active: bool,
}

impl TableDisplay for ProfileRow {
    fn headers() -> Vec<&'static str> {
        vec!["Profile", "Path", "Active"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.path.display().to_string(),
            if self.active { "*".to_string() } else { String::new() },
        ]
    }
}

pub async fn execute(cmd: MidiCommands, ctx: &Context) -> Result<()> {
    let profiles = MidiProfiles::new(ctx.config.midi_profiles_dir(), ctx.config.env_file());

    match cmd {
        MidiCommands::Profiles => {
            let current = profiles.current()?;
            let rows: Vec<ProfileRow> = profiles
                .scripts()?
                .into_iter()
                .map(|path| ProfileRow {
                    name: path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    active: path == current,
                    path,
                })
                .collect();
            print_list(&rows, ctx.format);
        }

        MidiCommands::SaveAs {
            name,
            assignments,
            no_reload,
        } => {
            let mut form = parse_assignments(&assignments)?;
            apply_checkbox_defaults(&mut form, MIDI_FORM_DEFAULTS);
            let script = profiles
                .save_as(&name, &form)
                .with_context(|| format!("Can't create profile {}", name))?;
            reload(ctx, no_reload).await;
            ctx.done(&format!("Saved profile {}", script.display()));
        }

        MidiCommands::Update {
            assignments,
            no_reload,
        } => {
            let mut form = parse_assignments(&assignments)?;
            apply_checkbox_defaults(&mut form, MIDI_FORM_DEFAULTS);
            let (script, changes) = profiles.update(&form)?;
            reload(ctx, no_reload).await;
            ctx.done(&format!(
                "Updated {} ({} setting(s) changed in {})",
                script.display(),
                changes.changed.len() + changes.added.len(),
                ctx.config.env_file().display()
            ));
        }

        MidiCommands::Delete { profile, no_reload } => {
            let script = match profile {
                Some(p) if p.contains('/') => PathBuf::from(p),
                Some(name) => profiles.dir().join(format!("{}.sh", name)),
                None => profiles.current()?,
            };
            let fallback = profiles.delete(&script)?;
            reload(ctx, no_reload).await;
            ctx.done(&format!(
                "Deleted {}; active profile is {}",
                script.display(),
                fallback.display()
            ));
        }
    }

    Ok(())
}

async fn reload(ctx: &Context, skip: bool) {
    if skip {
        return;
    }
    let client = CuiaClient::new(ctx.config.ui.osc_addr.clone());
    if let Err(e) = client.send(&CuiaCommand::ReloadMidiConfig, &[]).await {
        warn!("Can't notify the UI at {}: {}", ctx.config.ui.osc_addr, e);
    }
}
