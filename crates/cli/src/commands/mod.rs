//! CLI Commands

pub mod captures;
pub mod config;
pub mod env;
pub mod flags;
pub mod host;
pub mod midi;
pub mod presets;
pub mod snapshots;
pub mod soundfonts;
pub mod ui;
pub mod wifi;

use std::path::PathBuf;

use webconf_common::artifacts::ArtifactsClient;
use webconf_common::library::install;
use webconf_common::WebconfConfig;

use crate::output::{print_message, print_success, OutputFormat};

/// State shared by all commands
pub struct Context {
    pub config: WebconfConfig,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config_path: PathBuf, format: OutputFormat) -> anyhow::Result<Self> {
        let config = WebconfConfig::load(&config_path)?;
        Ok(Self {
            config,
            config_path,
            format,
        })
    }

    /// Stage an upload in the tmp dir; URLs are downloaded, files copied
    ///
    /// Installing consumes the staged file, never the caller's original.
    pub async fn fetch_upload(&self, source: &str) -> anyhow::Result<PathBuf> {
        let tmp_dir = &self.config.paths.tmp_dir;
        if source.starts_with("http://") || source.starts_with("https://") {
            let client = ArtifactsClient::new(&self.config.artifacts)?;
            return Ok(install::fetch(client.http(), source, tmp_dir).await?);
        }

        let path = PathBuf::from(source);
        if !path.is_file() {
            return Ok(path);
        }
        let Some(name) = path.file_name() else {
            anyhow::bail!("Invalid upload path {}", source);
        };
        let staged = tmp_dir.join(name);
        if staged != path {
            std::fs::create_dir_all(tmp_dir)?;
            std::fs::copy(&path, &staged)?;
        }
        Ok(staged)
    }

    /// Report a completed mutation
    pub fn done(&self, message: &str) {
        match self.format {
            OutputFormat::Json => print_message(message, self.format),
            _ => print_success(message),
        }
    }
}
