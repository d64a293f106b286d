//! UI notification commands

use anyhow::{Context as _, Result};
use clap::Args;

use webconf_common::cuia::{CuiaClient, CuiaCommand, OscArg};

use super::Context;

#[derive(Args)]
pub struct SendArgs {
    /// Action name, e.g. RELOAD_MIDI_CONFIG
    pub action: String,

    /// Integer arguments
    #[arg(long = "int")]
    pub ints: Vec<i32>,

    /// String arguments
    #[arg(long = "str")]
    pub strs: Vec<String>,

    /// Override the configured UI address
    #[arg(long)]
    pub addr: Option<String>,
}

#[derive(clap::Subcommand)]
pub enum UiCommands {
    /// Send a control-UI action
    Send(SendArgs),
}

pub async fn execute(cmd: UiCommands, ctx: &Context) -> Result<()> {
    match cmd {
        UiCommands::Send(args) => {
            let command = CuiaCommand::parse(&args.action)?;
            let mut osc_args: Vec<OscArg> = args.ints.into_iter().map(OscArg::Int).collect();
            osc_args.extend(args.strs.into_iter().map(OscArg::Str));

            let target = args.addr.unwrap_or_else(|| ctx.config.ui.osc_addr.clone());
            CuiaClient::new(target.clone())
                .send(&command, &osc_args)
                .await
                .with_context(|| format!("sending {} to {}", command, target))?;
            ctx.done(&format!("Sent {}", command));
        }
    }
    Ok(())
}
