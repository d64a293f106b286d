//! MIDI profile scripts
//!
//! A MIDI profile is an env-vars script of `ZYNTHIAN_MIDI_*` exports kept in
//! the profiles directory. The main env file names the active one in
//! `ZYNTHIAN_SCRIPT_MIDI_PROFILE`.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::envfile::{write_atomic, ChangeSet, EnvFile};
use crate::library::{sorted_entries, validate_file_name};
use crate::{Error, Result};

/// Main env var naming the active profile script
pub const PROFILE_VAR: &str = "ZYNTHIAN_SCRIPT_MIDI_PROFILE";

/// Prefix of the vars stored in a profile script
pub const MIDI_PREFIX: &str = "ZYNTHIAN_MIDI";

/// Fallback profile left after a delete
pub const DEFAULT_PROFILE: &str = "default.sh";

pub const FINE_TUNING_VAR: &str = "ZYNTHIAN_MIDI_FINE_TUNING";

/// Lowest and highest accepted A4 tuning in Hz
pub const FINE_TUNING_RANGE: (f64, f64) = (392.0, 493.88);

/// MIDI form options that browsers omit when unchecked or empty
pub const MIDI_FORM_DEFAULTS: &[&str] = &[
    "ZYNTHIAN_MIDI_FILTER_OUTPUT",
    "ZYNTHIAN_MIDI_SYS_ENABLED",
    "ZYNTHIAN_MIDI_CC_AUTOMODE",
    "ZYNTHIAN_MIDI_PRESET_PRELOAD_NOTEON",
    "ZYNTHIAN_MIDI_PROG_CHANGE_ZS3",
    "ZYNTHIAN_MIDI_BANK_CHANGE",
    "ZYNTHIAN_MIDI_RTPMIDI_ENABLED",
    "ZYNTHIAN_MIDI_NETWORK_ENABLED",
    "ZYNTHIAN_MIDI_TOUCHOSC_ENABLED",
    "ZYNTHIAN_MIDI_AUBIONOTES_ENABLED",
    "ZYNTHIAN_MIDI_MASTER_CHANNEL",
    "ZYNTHIAN_MIDI_PORTS",
];

/// Check the fine tuning frequency of a posted MIDI form
pub fn validate_form(form: &BTreeMap<String, String>) -> Result<()> {
    let Some(value) = form.get(FINE_TUNING_VAR) else {
        return Ok(());
    };
    let freq: f64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput("Frequency must be a number!".to_string()))?;
    let (low, high) = FINE_TUNING_RANGE;
    if !(low..=high).contains(&freq) {
        return Err(Error::InvalidInput(format!(
            "Frequency must be in the range {:.2} - {:.2} Hz!",
            low, high
        )));
    }
    Ok(())
}

/// Profile scripts directory plus the env file that selects one
pub struct MidiProfiles {
    dir: PathBuf,
    env_path: PathBuf,
}

impl MidiProfiles {
    pub fn new(dir: impl Into<PathBuf>, env_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env_path: env_path.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Profile scripts sorted by name
    pub fn scripts(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(sorted_entries(&self.dir)?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect())
    }

    /// Active profile: the configured one when it exists, else the first script
    pub fn current(&self) -> Result<PathBuf> {
        let scripts = self.scripts()?;
        let env = EnvFile::load(&self.env_path)?;
        if let Some(configured) = env.get(PROFILE_VAR).map(PathBuf::from) {
            if scripts.contains(&configured) {
                return Ok(configured);
            }
            debug!("Configured MIDI profile {:?} not found", configured);
        }
        Ok(scripts
            .into_iter()
            .next()
            .unwrap_or_else(|| self.dir.join(DEFAULT_PROFILE)))
    }

    /// Store the form as a new profile `<name>.sh` and make it active
    ///
    /// A missing script starts as a copy of the default profile.
    pub fn save_as(&self, name: &str, form: &BTreeMap<String, String>) -> Result<PathBuf> {
        validate_form(form)?;
        validate_file_name(name)?;
        let script = self.dir.join(format!("{}.sh", name));

        if !script.exists() {
            let template = self.dir.join(DEFAULT_PROFILE);
            if template.is_file() {
                std::fs::copy(&template, &script)?;
            } else {
                write_atomic(&script, b"")?;
            }
            info!("Created MIDI profile {:?}", script);
        }

        patch_profile(&script, form)?;
        make_executable(&script)?;
        self.select(&script)?;
        Ok(script)
    }

    /// Write the form into the active profile and the main env file
    ///
    /// Only `ZYNTHIAN_*` fields are kept; the profile gets the MIDI ones.
    pub fn update(&self, form: &BTreeMap<String, String>) -> Result<(PathBuf, ChangeSet)> {
        validate_form(form)?;
        let script = self.current()?;
        if !script.is_file() {
            return Err(Error::not_found("MIDI profile", script.display()));
        }

        patch_profile(&script, form)?;

        let mut env = EnvFile::load(&self.env_path)?;
        let changes = env.apply(
            form.iter()
                .filter(|(k, _)| k.starts_with("ZYNTHIAN_"))
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )?;
        if !changes.is_empty() {
            env.save(&self.env_path)?;
        }
        Ok((script, changes))
    }

    /// Delete a user profile and fall back to the default one
    pub fn delete(&self, script: &Path) -> Result<PathBuf> {
        let in_dir = script.parent() == Some(self.dir.as_path())
            && script.file_name().is_some_and(|n| validate_file_name(&n.to_string_lossy()).is_ok());
        if !in_dir {
            return Err(Error::InvalidInput(
                "You are allowed to delete user profiles only!".to_string(),
            ));
        }
        if !script.is_file() {
            return Err(Error::not_found("MIDI profile", script.display()));
        }

        std::fs::remove_file(script)?;
        info!("Deleted MIDI profile {:?}", script);

        let fallback = self.dir.join(DEFAULT_PROFILE);
        self.select(&fallback)?;
        Ok(fallback)
    }

    fn select(&self, script: &Path) -> Result<()> {
        let mut env = EnvFile::load(&self.env_path)?;
        if env.set(PROFILE_VAR, &script.to_string_lossy())? {
            env.save(&self.env_path)?;
        }
        Ok(())
    }
}

// Patch the `ZYNTHIAN_MIDI*` fields of `form` into a profile script
fn patch_profile(script: &Path, form: &BTreeMap<String, String>) -> Result<()> {
    let mut profile = EnvFile::load(script)?;
    let changes = profile.apply(
        form.iter()
            .filter(|(k, _)| k.starts_with(MIDI_PREFIX))
            .map(|(k, v)| (k.as_str(), v.as_str())),
    )?;
    if changes.is_empty() {
        debug!("MIDI profile {:?} unchanged", script);
        return Ok(());
    }
    profile.save(script)
}

// Copy the read bits to the execute bits
fn make_executable(script: &Path) -> Result<()> {
    let mut perms = std::fs::metadata(script)?.permissions();
    let mode = perms.mode();
    perms.set_mode(mode | ((mode & 0o444) >> 2));
    std::fs::set_permissions(script, perms)?;
    Ok(())
}
