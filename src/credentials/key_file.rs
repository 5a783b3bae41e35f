//! Key file loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Credential;
use crate::error::ConfigError;

/// Parse key-file contents.
///
/// Returns one result per entry line; blank lines and `#` comments are
/// skipped. Errors carry the 1-based line number they came from.
pub fn parse_keys(content: &str) -> Vec<Result<Credential, ConfigError>> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            Some(Credential::from_fields(&fields).map_err(|e| e.at_line(idx + 1)))
        })
        .collect()
}

/// A loaded key file.
#[derive(Debug)]
pub struct KeyFile {
    path: PathBuf,
    entries: Vec<Result<Credential, ConfigError>>,
}

impl KeyFile {
    /// Read and parse a key file.
    ///
    /// Only an unreadable file is an error; malformed lines are kept as
    /// per-entry errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            entries: parse_keys(&content),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[Result<Credential, ConfigError>] {
        &self.entries
    }

    /// Split into parsed credentials and rejected lines, keeping file order.
    pub fn into_parts(self) -> (Vec<Credential>, Vec<ConfigError>) {
        let mut credentials = Vec::new();
        let mut rejected = Vec::new();
        for entry in self.entries {
            match entry {
                Ok(credential) => credentials.push(credential),
                Err(err) => rejected.push(err),
            }
        }
        (credentials, rejected)
    }
}
