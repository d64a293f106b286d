//! Env-vars file store
//!
//! The appliance persists its configuration as a shell script of
//! `export NAME="value"` lines. Updates rewrite matching export lines in
//! place and append unknown names at the end; every other line (comments,
//! conditionals, blank lines) is written back untouched.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

static EXPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*export\s+([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("valid export regex")
});

static VAR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name regex"));

/// One line of an env-vars file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Export {
        name: String,
        value: String,
        raw: String,
    },
    Other(String),
}

impl Line {
    fn raw(&self) -> &str {
        match self {
            Line::Export { raw, .. } => raw,
            Line::Other(raw) => raw,
        }
    }
}

/// Names touched by a batch update
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChangeSet {
    /// Existing variables whose value changed
    pub changed: Vec<String>,
    /// Variables appended to the file
    pub added: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty()
    }
}

/// Parsed env-vars file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<Line>,
}

impl EnvFile {
    /// Parse file contents
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = body.split('\n').map(parse_line).collect();
        Self { lines }
    }

    /// Load from disk; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Env file {:?} not found, starting empty", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write atomically next to the target
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())?;
        info!("Saved env file {:?}", path);
        Ok(())
    }

    /// Render back to text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line.raw());
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Value of the last export of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Export { name: n, value, .. } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// All variables in first-appearance order, last definition wins
    pub fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = Vec::new();
        for line in &self.lines {
            if let Line::Export { name, value, .. } = line {
                match vars.iter_mut().find(|(n, _)| n == name) {
                    Some(entry) => entry.1 = value.clone(),
                    None => vars.push((name.clone(), value.clone())),
                }
            }
        }
        vars
    }

    /// Variables starting with `prefix`, with the prefix stripped
    pub fn prefixed(&self, prefix: &str) -> Vec<(String, String)> {
        self.vars()
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(prefix)
                    .map(|short| (short.to_string(), value))
            })
            .collect()
    }

    /// Set a variable, returning whether its stored value changed
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        validate_name(name)?;
        let value = value.replace('\r', "");
        let raw = format!("export {}=\"{}\"", name, encode_value(&value));

        let mut found = false;
        let mut changed = false;
        for line in &mut self.lines {
            if let Line::Export { name: n, value: v, raw: r } = line {
                if n == name {
                    found = true;
                    if *v != value {
                        changed = true;
                        *v = value.clone();
                        *r = raw.clone();
                    }
                }
            }
        }

        if !found {
            self.lines.push(Line::Export {
                name: name.to_string(),
                value,
                raw,
            });
            return Ok(true);
        }
        Ok(changed)
    }

    /// Apply a batch of updates
    pub fn apply<'a, I>(&mut self, updates: I) -> Result<ChangeSet>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut changes = ChangeSet::default();
        for (name, value) in updates {
            let existed = self.get(name).is_some();
            if self.set(name, value)? {
                if existed {
                    changes.changed.push(name.to_string());
                } else {
                    changes.added.push(name.to_string());
                }
            }
        }
        Ok(changes)
    }

    /// Remove every export of `name`, returning whether any existed
    pub fn unset(&mut self, name: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Export { name: n, .. } if n == name));
        before != self.lines.len()
    }
}

fn parse_line(raw: &str) -> Line {
    let Some(caps) = EXPORT_LINE.captures(raw) else {
        return Line::Other(raw.to_string());
    };
    Line::Export {
        name: caps[1].to_string(),
        value: parse_value(&caps[2]),
        raw: raw.to_string(),
    }
}

fn parse_value(rest: &str) -> String {
    if let Some(quoted) = rest.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = quoted.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return out,
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(e @ ('"' | '\\' | '$' | '`')) => out.push(e),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                },
                c => out.push(c),
            }
        }
        // Unterminated quote: keep what we have
        out
    } else if let Some(quoted) = rest.strip_prefix('\'') {
        quoted.split('\'').next().unwrap_or_default().to_string()
    } else {
        rest.split_whitespace().next().unwrap_or_default().to_string()
    }
}

fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn validate_name(name: &str) -> Result<()> {
    if VAR_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid variable name: {:?}", name)))
    }
}

/// Replace `path` with `data` via a sibling temp file
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    // Keep the mode of the file being replaced (profile scripts are executable)
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
