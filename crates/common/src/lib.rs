//! webconf common library
//!
//! Configuration file editing and media library management for a
//! zynthian appliance: the env-vars store, wifi networks, hostname,
//! device-tree overlays, MIDI profiles, UI notifications and the snapshot,
//! soundfont, capture and preset browsers.

pub mod artifacts;
pub mod config;
pub mod cuia;
pub mod envfile;
pub mod error;
pub mod flags;
pub mod host;
pub mod library;
pub mod midi;
pub mod settings;
pub mod wifi;

// Re-export commonly used types
pub use config::WebconfConfig;
pub use envfile::{ChangeSet, EnvFile};
pub use error::{Error, Result};
pub use flags::{FlagStatus, Flags};
pub use wifi::WpaSupplicant;

/// Default location of the webconf TOML configuration
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("/etc/webconf.toml")
}
