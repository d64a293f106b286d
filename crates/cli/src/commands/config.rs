//! webconf configuration commands

use anyhow::{bail, Result};
use clap::Subcommand;

use webconf_common::WebconfConfig;

use super::Context;
use crate::output::{print_value, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(cmd: ConfigCommands, ctx: &Context) -> Result<()> {
    match cmd {
        ConfigCommands::Show => match ctx.format {
            OutputFormat::Json => print_value(&ctx.config, ctx.format),
            _ => print!("{}", toml::to_string_pretty(&ctx.config)?),
        },

        ConfigCommands::Init { force } => {
            if ctx.config_path.exists() && !force {
                bail!("{} already exists (use --force)", ctx.config_path.display());
            }
            WebconfConfig::default().save(&ctx.config_path)?;
            ctx.done(&format!("Wrote {}", ctx.config_path.display()));
        }
    }
    Ok(())
}
