//! Hostname and password commands

use anyhow::{bail, Result};
use clap::Subcommand;

use webconf_common::{host, Flags};

use super::Context;
use crate::output::{print_error, print_message};

#[derive(Subcommand)]
pub enum HostnameCommands {
    /// Print the hostname
    Get,

    /// Change the hostname and the 127.0.1.1 hosts entry
    Set {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Validate a new password pair without applying it
    Check {
        password: String,
        repeat: String,
    },
}

pub async fn execute_hostname(cmd: HostnameCommands, ctx: &Context) -> Result<()> {
    let paths = &ctx.config.paths;
    match cmd {
        HostnameCommands::Get => {
            print_message(&host::read_hostname(&paths.hostname_file)?, ctx.format);
        }
        HostnameCommands::Set { name } => {
            if host::set_hostname(&paths.hostname_file, &paths.hosts_file, &name)? {
                Flags::from_config(&ctx.config).request_reboot()?;
                ctx.done(&format!("Hostname set to '{}', reboot required", name.trim()));
            } else {
                ctx.done("Hostname unchanged");
            }
        }
    }
    Ok(())
}

pub async fn execute_password(cmd: PasswordCommands, ctx: &Context) -> Result<()> {
    match cmd {
        PasswordCommands::Check { password, repeat } => {
            let errors = host::validate_password_change(&password, &repeat);
            if errors.is_empty() {
                ctx.done("Password accepted");
                return Ok(());
            }
            for (field, message) in &errors {
                print_error(&format!("{}: {}", field, message));
            }
            bail!("Password rejected");
        }
    }
}
