//! Console configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Result;

/// Environment variable overriding `paths.config_dir`
pub const CONFIG_DIR_ENV: &str = "WEBCONF_CONFIG_DIR";

/// Environment variable overriding `paths.data_dir`
pub const DATA_DIR_ENV: &str = "WEBCONF_DATA_DIR";

/// Console configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebconfConfig {
    /// Filesystem locations
    pub paths: PathsConfig,

    /// UI process endpoint
    pub ui: UiConfig,

    /// Musical artifact catalogue
    pub artifacts: ArtifactsConfig,

    /// Directory preset engine
    pub presets: PresetsConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Appliance configuration directory (env file, supplicant, profiles)
    pub config_dir: PathBuf,

    /// User data directory (snapshots, soundfonts, captures, presets)
    pub data_dir: PathBuf,

    /// Scratch space for downloads and unpacking
    pub tmp_dir: PathBuf,

    pub hostname_file: PathBuf,

    pub hosts_file: PathBuf,

    /// Present while a reboot is pending
    pub reboot_flag: PathBuf,

    /// Present while a system update is requested
    pub update_sys_flag: PathBuf,

    /// USB stick mount point scanned for captures
    pub usb_mount_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/zynthian/config"),
            data_dir: PathBuf::from("/zynthian/zynthian-my-data"),
            tmp_dir: PathBuf::from("/tmp"),
            hostname_file: PathBuf::from("/etc/hostname"),
            hosts_file: PathBuf::from("/etc/hosts"),
            reboot_flag: PathBuf::from("/tmp/zynthian_reboot"),
            update_sys_flag: PathBuf::from("/zynthian_update_sys"),
            usb_mount_dir: PathBuf::from("/media/usb0"),
        }
    }
}

/// UI process endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// UDP address of the UI's OSC listener
    pub osc_addr: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            osc_addr: "127.0.0.1:1370".to_string(),
        }
    }
}

/// Musical artifact catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// JSON search endpoint
    pub search_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            search_url: "https://musical-artifacts.com/artifacts.json".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Directory preset engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetsConfig {
    /// Bank roots, relative paths resolve against `<data_dir>/presets`
    pub roots: Vec<PresetRoot>,

    /// Preset file extensions, without the dot
    pub extensions: Vec<String>,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            roots: vec![PresetRoot {
                title: "User".to_string(),
                path: PathBuf::from("."),
                readonly: false,
            }],
            extensions: vec!["xiz".to_string(), "xmz".to_string(), "xsz".to_string()],
        }
    }
}

/// One bank root of the directory preset engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetRoot {
    pub title: String,
    pub path: PathBuf,
    #[serde(default)]
    pub readonly: bool,
}

impl WebconfConfig {
    /// Load configuration from file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            debug!("No config at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            self.paths.config_dir = PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            self.paths.data_dir = PathBuf::from(dir);
        }
    }

    /// Get the env-vars file path
    pub fn env_file(&self) -> PathBuf {
        self.paths.config_dir.join("config.sh")
    }

    /// Get the wifi supplicant config path
    pub fn wpa_supplicant_file(&self) -> PathBuf {
        self.paths.config_dir.join("wpa_supplicant.conf")
    }

    /// Get the MIDI profiles directory
    pub fn midi_profiles_dir(&self) -> PathBuf {
        self.paths.config_dir.join("midi-profiles")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.paths.data_dir.join("snapshots")
    }

    pub fn soundfonts_dir(&self) -> PathBuf {
        self.paths.data_dir.join("soundfonts")
    }

    pub fn captures_dir(&self) -> PathBuf {
        self.paths.data_dir.join("capture")
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.paths.data_dir.join("presets")
    }

    /// Resolve a preset root against the presets directory
    pub fn preset_root_path(&self, root: &PresetRoot) -> PathBuf {
        if root.path.is_absolute() {
            root.path.clone()
        } else if root.path.as_os_str().is_empty() || root.path == Path::new(".") {
            self.presets_dir()
        } else {
            self.presets_dir().join(&root.path)
        }
    }
}
