//! Wifi network commands

use anyhow::Result;
use clap::Subcommand;

use webconf_common::wifi::NetworkView;
use webconf_common::WpaSupplicant;

use super::Context;
use crate::output::{print_list, TableDisplay};

#[derive(Subcommand)]
pub enum WifiCommands {
    /// List configured networks
    List {
        /// Show passwords
        #[arg(long)]
        show_psk: bool,
    },

    /// Add a WPA-PSK network
    Add {
        ssid: String,
        psk: String,
    },

    /// Remove a network
    Remove {
        ssid: String,
    },

    /// Replace the extra option lines of a network
    Update {
        ssid: String,

        /// Option lines, e.g. `priority=5`
        #[arg(required = true)]
        options: Vec<String>,
    },
}

impl TableDisplay for NetworkView {
    fn headers() -> Vec<&'static str> {
        vec!["#", "SSID", "Token", "Password", "Options"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.idx.to_string(),
            self.ssid.clone(),
            self.ssid64.clone(),
            self.psk.clone(),
            self.options.replace('\n', " "),
        ]
    }
}

pub async fn execute(cmd: WifiCommands, ctx: &Context) -> Result<()> {
    let path = ctx.config.wpa_supplicant_file();
    let mut supplicant = WpaSupplicant::load(&path)?;

    match cmd {
        WifiCommands::List { show_psk } => {
            let mut views = supplicant.views();
            if !show_psk {
                for view in views.iter_mut().filter(|v| !v.psk.is_empty()) {
                    view.psk = "********".to_string();
                }
            }
            print_list(&views, ctx.format);
        }

        WifiCommands::Add { ssid, psk } => {
            supplicant.add_network(&ssid, &psk)?;
            supplicant.save(&path)?;
            ctx.done(&format!("Network '{}' added", ssid));
        }

        WifiCommands::Remove { ssid } => {
            supplicant.remove_network(&ssid)?;
            supplicant.save(&path)?;
            ctx.done(&format!("Network '{}' removed", ssid));
        }

        WifiCommands::Update { ssid, options } => {
            supplicant.update_options(&ssid, &options.join("\n"))?;
            supplicant.save(&path)?;
            ctx.done(&format!("Network '{}' updated", ssid));
        }
    }

    Ok(())
}
