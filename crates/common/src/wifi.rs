//! Wifi supplicant config patcher
//!
//! Edits `network={...}` blocks of a wpa_supplicant config. The global
//! header, the text between blocks and every block that is not being
//! edited are written back byte for byte.

use std::path::Path;

use base64::Engine as _;
use serde::Serialize;
use tracing::{debug, info};

use crate::envfile::write_atomic;
use crate::{Error, Result};

const BLOCK_START: &str = "network={";

/// A configured network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub ssid: String,
    pub psk: Option<String>,
    /// Remaining `key=value` lines, trimmed
    pub options: Vec<String>,
    psk_line: Option<String>,
}

/// Network as shown to the configuration form
#[derive(Debug, Clone, Serialize)]
pub struct NetworkView {
    pub idx: usize,
    pub ssid: String,
    /// Short stable token used as a form field suffix
    pub ssid64: String,
    pub psk: String,
    pub options: String,
}

#[derive(Debug, Clone)]
struct Block {
    /// Text between the previous block and this one
    prefix: String,
    raw: String,
    network: Network,
}

/// Parsed supplicant config
#[derive(Debug, Clone, Default)]
pub struct WpaSupplicant {
    header: String,
    blocks: Vec<Block>,
    trailer: String,
}

impl WpaSupplicant {
    pub fn parse(text: &str) -> Self {
        let Some(first) = text.find(BLOCK_START) else {
            return Self {
                header: text.to_string(),
                ..Self::default()
            };
        };

        let header = text[..first].to_string();
        let mut blocks = Vec::new();
        let mut pos = first;
        let mut trailer = String::new();

        loop {
            let Some(start) = text[pos..].find(BLOCK_START).map(|i| pos + i) else {
                trailer = text[pos..].to_string();
                break;
            };
            let body_start = start + BLOCK_START.len();
            let Some(end) = block_end(&text[body_start..]).map(|i| body_start + i) else {
                // Unterminated block is kept as opaque trailing text
                trailer = text[pos..].to_string();
                break;
            };

            blocks.push(Block {
                prefix: text[pos..start].to_string(),
                raw: text[start..=end].to_string(),
                network: parse_network(&text[body_start..end]),
            });
            pos = end + 1;
        }

        Self {
            header,
            blocks,
            trailer,
        }
    }

    /// Load from disk; a missing file is an empty config
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Supplicant config {:?} not found", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())?;
        info!("Saved wifi configuration {:?}", path);
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        for block in &self.blocks {
            out.push_str(&block.prefix);
            out.push_str(&block.raw);
        }
        out.push_str(&self.trailer);
        out
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.blocks.iter().map(|b| &b.network)
    }

    pub fn views(&self) -> Vec<NetworkView> {
        self.networks()
            .enumerate()
            .map(|(idx, n)| NetworkView {
                idx,
                ssid: n.ssid.clone(),
                ssid64: ssid_token(&n.ssid),
                psk: n.psk.clone().unwrap_or_default(),
                options: n.options.join("\n"),
            })
            .collect()
    }

    /// Append a WPA-PSK network
    pub fn add_network(&mut self, ssid: &str, psk: &str) -> Result<()> {
        validate_field("SSID", ssid)?;
        validate_field("Password", psk)?;
        if self.position(ssid).is_some() {
            return Err(Error::already_exists("Network", ssid));
        }

        let network = Network {
            ssid: ssid.to_string(),
            psk: Some(psk.to_string()),
            options: vec![
                "scan_ssid=1".to_string(),
                "key_mgmt=WPA-PSK".to_string(),
                "priority=10".to_string(),
            ],
            psk_line: Some(format!("psk=\"{}\"", psk)),
        };

        let mut prefix = std::mem::take(&mut self.trailer);
        let rendered_so_far = self.render();
        let needs_break = !(rendered_so_far.is_empty() && prefix.is_empty())
            && !format!("{}{}", rendered_so_far, prefix).ends_with('\n');
        if needs_break {
            prefix.push('\n');
        }
        if !rendered_so_far.is_empty() || !prefix.is_empty() {
            prefix.push('\n');
        }

        self.blocks.push(Block {
            prefix,
            raw: render_block(&network),
            network,
        });
        self.trailer = "\n".to_string();
        info!("Added wifi network {}", ssid);
        Ok(())
    }

    /// Drop the block of `ssid`
    pub fn remove_network(&mut self, ssid: &str) -> Result<()> {
        let idx = self
            .position(ssid)
            .ok_or_else(|| Error::not_found("Network", ssid))?;
        self.blocks.remove(idx);
        info!("Removed wifi network {}", ssid);
        Ok(())
    }

    /// Replace the option lines of `ssid`, keeping its ssid and psk
    pub fn update_options(&mut self, ssid: &str, options: &str) -> Result<()> {
        let idx = self
            .position(ssid)
            .ok_or_else(|| Error::not_found("Network", ssid))?;
        let block = &mut self.blocks[idx];
        block.network.options = options
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        block.raw = render_block(&block.network);
        info!("Updated options of wifi network {}", ssid);
        Ok(())
    }

    fn position(&self, ssid: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.network.ssid == ssid)
    }
}

// Closing brace of a block body; braces inside quoted values don't count
fn block_end(body: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in body.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '\n' => quoted = false,
            '}' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_network(body: &str) -> Network {
    let mut ssid = String::new();
    let mut psk = None;
    let mut psk_line = None;
    let mut options = Vec::new();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(value) = line.strip_prefix("ssid=") {
            ssid = unquote(value);
        } else if let Some(value) = line.strip_prefix("psk=") {
            psk = Some(unquote(value));
            psk_line = Some(line.to_string());
        } else {
            options.push(line.to_string());
        }
    }

    Network {
        ssid,
        psk,
        options,
        psk_line,
    }
}

fn render_block(network: &Network) -> String {
    let mut out = format!("{}\n\tssid=\"{}\"\n", BLOCK_START, network.ssid);
    if let Some(line) = &network.psk_line {
        out.push_str(&format!("\t{}\n", line));
    }
    for option in &network.options {
        out.push_str(&format!("\t{}\n", option));
    }
    out.push('}');
    out
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn validate_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.contains(['"', '\n', '\r']) {
        return Err(Error::InvalidInput(format!(
            "{} must not contain quotes or line breaks",
            field
        )));
    }
    Ok(())
}

fn ssid_token(ssid: &str) -> String {
    base64::engine::general_purpose::STANDARD
        .encode(ssid.as_bytes())
        .chars()
        .take(5)
        .collect()
}
