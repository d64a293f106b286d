//! Hostname and hosts file management

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::envfile::write_atomic;
use crate::{Error, Result};

static LOOPBACK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^127\.0\.1\.1.*$").expect("valid hosts regex"));

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Read the current hostname; a missing file reads as empty
pub fn read_hostname(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().next().unwrap_or_default().trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Check RFC 1123 label rules
pub fn validate_hostname(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid hostname: {:?}", name)))
    }
}

/// Point the `127.0.1.1` entry at `hostname`, appending one if missing
pub fn patch_hosts(contents: &str, hostname: &str) -> String {
    let entry = format!("127.0.1.1\t{}", hostname);
    if LOOPBACK_LINE.is_match(contents) {
        LOOPBACK_LINE
            .replace_all(contents, regex::NoExpand(&entry))
            .into_owned()
    } else {
        let mut out = contents.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&entry);
        out.push('\n');
        out
    }
}

/// Change the hostname, returning whether anything was written
pub fn set_hostname(hostname_file: &Path, hosts_file: &Path, new: &str) -> Result<bool> {
    let new = new.trim();
    validate_hostname(new)?;

    let previous = read_hostname(hostname_file)?;
    if previous == new {
        return Ok(false);
    }

    write_atomic(hostname_file, format!("{}\n", new).as_bytes())?;

    let hosts = match std::fs::read_to_string(hosts_file) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    write_atomic(hosts_file, patch_hosts(&hosts, new).as_bytes())?;

    info!("Hostname changed from {:?} to {:?}", previous, new);
    Ok(true)
}

/// Validate a password change, returning form errors keyed by field
pub fn validate_password_change(password: &str, repeat: &str) -> BTreeMap<&'static str, String> {
    let mut errors = BTreeMap::new();
    if password.is_empty() {
        return errors;
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            "PASSWORD",
            format!("Password must have at least {} characters", MIN_PASSWORD_LEN),
        );
    } else if password != repeat {
        errors.insert("REPEAT_PASSWORD", "Passwords do not match!".to_string());
    }
    errors
}
