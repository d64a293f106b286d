//! Reboot and system-update flag commands

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use webconf_common::Flags;

use super::Context;
use crate::output::{print_list, TableDisplay};

#[derive(Subcommand)]
pub enum FlagsCommands {
    /// Show pending flags
    Show,

    /// Mark a reboot as pending
    Reboot,

    /// Clear pending flags
    Clear {
        /// Also clear the system-update request
        #[arg(long)]
        update_sys: bool,
    },
}

#[derive(Serialize)]
pub struct FlagRow {
    pub flag: &'static str,
    pub pending: bool,
    pub since: Option<String>,
}

impl TableDisplay for FlagRow {
    fn headers() -> Vec<&'static str> {
        vec!["Flag", "Pending", "Since"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.flag.to_string(),
            if self.pending { "yes" } else { "no" }.to_string(),
            self.since.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(cmd: FlagsCommands, ctx: &Context) -> Result<()> {
    let flags = Flags::from_config(&ctx.config);
    let paths = &ctx.config.paths;

    match cmd {
        FlagsCommands::Show => {
            let status = flags.status();
            let rows = vec![
                FlagRow {
                    flag: "reboot",
                    pending: status.reboot_pending,
                    since: modified(&paths.reboot_flag),
                },
                FlagRow {
                    flag: "update_sys",
                    pending: status.update_sys_pending,
                    since: modified(&paths.update_sys_flag),
                },
            ];
            print_list(&rows, ctx.format);
        }

        FlagsCommands::Reboot => {
            flags.request_reboot()?;
            ctx.done("Reboot is pending");
        }

        FlagsCommands::Clear { update_sys } => {
            flags.clear_reboot()?;
            if update_sys {
                flags.clear_system_update()?;
            }
            ctx.done("Flags cleared");
        }
    }

    Ok(())
}

fn modified(path: &Path) -> Option<String> {
    let time = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let local: chrono::DateTime<chrono::Local> = time.into();
    Some(local.format("%Y-%m-%d %H:%M:%S").to_string())
}
