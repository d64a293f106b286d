//! Configuration form updates
//!
//! Forms post a set of env-var values; saving them patches the env file
//! and, when anything actually changed, asks the boot scripts to
//! regenerate system files on the next start.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::envfile::{ChangeSet, EnvFile};
use crate::flags::Flags;
use crate::Result;

/// Boolean hardware options that browsers omit when unchecked
pub const HW_CHECKBOXES: &[&str] = &["ZYNTHIAN_DISABLE_OTG", "ZYNTHIAN_LIMIT_USB_SPEED"];

/// Env vars carrying device-tree overlay selections
pub const OVERLAY_VARS: &[&str] = &["DISPLAY_CONFIG", "SOUNDCARD_CONFIG"];

/// Apply `updates` to the env file at `env_path`
pub fn save_config(env_path: &Path, updates: &BTreeMap<String, String>, flags: &Flags) -> Result<ChangeSet> {
    let mut env = EnvFile::load(env_path)?;
    let changes = env.apply(updates.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    if changes.is_empty() {
        debug!("No configuration changes for {:?}", env_path);
        return Ok(changes);
    }

    env.save(env_path)?;
    info!(
        "Configuration updated: {} changed, {} added",
        changes.changed.len(),
        changes.added.len()
    );
    flags.request_system_update()?;
    Ok(changes)
}

/// Fill in `"0"` for checkbox options missing from a posted form
pub fn apply_checkbox_defaults(form: &mut BTreeMap<String, String>, checkboxes: &[&str]) {
    for name in checkboxes {
        form.entry((*name).to_string()).or_insert_with(|| "0".to_string());
    }
}

/// Active `dtoverlay=` entries of an overlay selection
pub fn overlay_lines(value: &str) -> Vec<&str> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix("dtoverlay="))
        .filter(|overlay| !overlay.is_empty())
        .collect()
}

/// Overlays currently selected in the env file, keyed by variable
pub fn current_overlays(env: &EnvFile) -> BTreeMap<String, Vec<String>> {
    OVERLAY_VARS
        .iter()
        .filter_map(|var| {
            env.get(var).map(|value| {
                let overlays = overlay_lines(value).into_iter().map(String::from).collect();
                ((*var).to_string(), overlays)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_config_sets_update_flag_on_change() {
        let tmp = TempDir::new().unwrap();
        let env_path = tmp.path().join("config.sh");
        std::fs::write(&env_path, "# header\nexport ZYNTHIAN_OVERCLOCKING=\"None\"\n").unwrap();
        let flags = Flags::new(tmp.path().join("reboot"), tmp.path().join("update"));

        let mut updates = BTreeMap::new();
        updates.insert("ZYNTHIAN_OVERCLOCKING".to_string(), "None".to_string());
        let changes = save_config(&env_path, &updates, &flags).unwrap();
        assert!(changes.is_empty());
        assert!(!flags.status().update_sys_pending);

        updates.insert("ZYNTHIAN_OVERCLOCKING".to_string(), "Maximum".to_string());
        let changes = save_config(&env_path, &updates, &flags).unwrap();
        assert_eq!(changes.changed, vec!["ZYNTHIAN_OVERCLOCKING"]);
        assert!(flags.status().update_sys_pending);
        assert_eq!(
            std::fs::read_to_string(&env_path).unwrap(),
            "# header\nexport ZYNTHIAN_OVERCLOCKING=\"Maximum\"\n"
        );
    }

    #[test]
    fn test_checkbox_defaults() {
        let mut form = BTreeMap::new();
        form.insert("ZYNTHIAN_DISABLE_OTG".to_string(), "1".to_string());
        apply_checkbox_defaults(&mut form, HW_CHECKBOXES);

        assert_eq!(form["ZYNTHIAN_DISABLE_OTG"], "1");
        assert_eq!(form["ZYNTHIAN_LIMIT_USB_SPEED"], "0");
    }

    #[test]
    fn test_overlay_lines_skip_comments() {
        let value = "dtoverlay=waveshare35a:rotate=270,swapxy=1\n#dtoverlay=ads7846,cs=1\nforce_eeprom_read=0\n";
        assert_eq!(overlay_lines(value), vec!["waveshare35a:rotate=270,swapxy=1"]);
    }

    #[test]
    fn test_current_overlays() {
        let env = EnvFile::parse(
            "export SOUNDCARD_CONFIG=\"dtoverlay=hifiberry-dac\\ndtoverlay=i2c-rtc,ds130\"\n",
        );
        let overlays = current_overlays(&env);
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays["SOUNDCARD_CONFIG"], vec!["hifiberry-dac", "i2c-rtc,ds130"]);
    }
}
