//! Env-vars store commands

use std::collections::BTreeMap;

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use serde::Serialize;

use webconf_common::settings::{self, HW_CHECKBOXES};
use webconf_common::{EnvFile, Flags};

use super::Context;
use crate::output::{print_list, print_message, print_value, TableDisplay};

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Print one variable
    Get {
        name: String,
    },

    /// Set variables given as NAME=VALUE
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,

        /// Treat the hardware checkboxes as a submitted form (missing ones become "0")
        #[arg(long)]
        hw_form: bool,
    },

    /// Remove a variable
    Unset {
        name: String,
    },

    /// List variables
    List {
        /// Only names starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show selected device-tree overlays
    Overlays,
}

#[derive(Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl TableDisplay for EnvVar {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Value"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.value.clone()]
    }
}

pub async fn execute(cmd: EnvCommands, ctx: &Context) -> Result<()> {
    let env_path = ctx.config.env_file();
    let flags = Flags::from_config(&ctx.config);

    match cmd {
        EnvCommands::Get { name } => {
            let env = EnvFile::load(&env_path)?;
            match env.get(&name) {
                Some(value) => print_message(value, ctx.format),
                None => bail!("{} is not set in {}", name, env_path.display()),
            }
        }

        EnvCommands::Set { assignments, hw_form } => {
            let mut updates = parse_assignments(&assignments)?;
            if hw_form {
                settings::apply_checkbox_defaults(&mut updates, HW_CHECKBOXES);
            }
            let changes = settings::save_config(&env_path, &updates, &flags)
                .with_context(|| format!("saving {}", env_path.display()))?;
            if changes.is_empty() {
                ctx.done("No changes");
            } else {
                ctx.done(&format!(
                    "Updated {} (changed: {}, added: {})",
                    env_path.display(),
                    changes.changed.join(", "),
                    changes.added.join(", ")
                ));
            }
        }

        EnvCommands::Unset { name } => {
            let mut env = EnvFile::load(&env_path)?;
            if !env.unset(&name) {
                bail!("{} is not set in {}", name, env_path.display());
            }
            env.save(&env_path)?;
            flags.request_system_update()?;
            ctx.done(&format!("Removed {}", name));
        }

        EnvCommands::List { prefix } => {
            let env = EnvFile::load(&env_path)?;
            let vars = match prefix {
                Some(prefix) => env.prefixed(&prefix),
                None => env.vars(),
            };
            let vars: Vec<EnvVar> = vars
                .into_iter()
                .map(|(name, value)| EnvVar { name, value })
                .collect();
            print_list(&vars, ctx.format);
        }

        EnvCommands::Overlays => {
            let env = EnvFile::load(&env_path)?;
            print_value(&settings::current_overlays(&env), ctx.format);
        }
    }

    Ok(())
}

/// Split `NAME=VALUE` arguments
pub fn parse_assignments(args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut updates = BTreeMap::new();
    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("Expected NAME=VALUE, got {:?}", arg);
        };
        updates.insert(name.trim().to_string(), value.to_string());
    }
    Ok(updates)
}
