//! The persisted config file behind `kci config get/set`.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::error::Result;

/// File name looked up in the home directory when no path is given.
pub const DEFAULT_FILE_NAME: &str = ".kci.toml";

/// Keys whose values are stored as integers.
const NUMERIC_KEYS: &[&str] = &[
    "http_timeout",
    "workers",
    "max_attempts",
    "renewal_debounce_ms",
    "renewal_timeout_ms",
];

/// `$HOME/.kci.toml`, or `./.kci.toml` without a home directory.
pub fn default_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FILE_NAME)
}

/// Flat key/value TOML document.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    table: Table,
}

impl ConfigFile {
    /// Read `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self {
                table: toml::from_str(&content)?,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Value of `key` rendered as a string.
    pub fn get(&self, key: &str) -> Option<String> {
        self.table.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let value = match value.parse::<i64>() {
            Ok(n) if NUMERIC_KEYS.contains(&key) => Value::Integer(n),
            _ => Value::String(value.to_string()),
        };
        self.table.insert(key.to_string(), value);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string(&self.table)?)?;
        Ok(())
    }
}
