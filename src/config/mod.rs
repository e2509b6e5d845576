//! Typed configuration.
//!
//! Values come from the config file, overridden by `KCI_*` environment
//! variables. Loads once at startup and fails fast listing every missing
//! required key. The password stays wrapped in `SecretString`.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::engine::DispatcherConfig;
use crate::error::{Error, Result};
use crate::identity::Credentials;

pub use file::ConfigFile;

/// Prefix of environment overrides: `realm` is read from `KCI_REALM`.
pub const ENV_PREFIX: &str = "KCI_";

const REQUIRED_KEYS: &[&str] = &["realm", "login", "password", "keycloak_url"];

#[derive(Debug)]
pub struct Config {
    /// Base URL of the Keycloak server.
    pub keycloak_url: String,
    /// Realm of the admin account.
    pub realm: String,
    pub login: String,
    pub password: SecretString,
    pub http_timeout: Duration,
    pub workers: usize,
    pub max_attempts: u32,
    pub renewal_debounce: Duration,
    pub renewal_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load `path` (if it exists) and apply environment overrides.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn load(path: &Path) -> Result<Self> {
        let file = ConfigFile::load(path)?;
        Self::resolve(&file, |name| std::env::var(name).ok())
    }

    /// Merge `file` with the overrides returned by `env`.
    pub fn resolve(file: &ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| {
            env(format!("{ENV_PREFIX}{}", key.to_uppercase()).as_str())
                .or_else(|| file.get(key))
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|&key| lookup(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing configuration keys: {}. Use 'kci config set' to provide them",
                missing.join(", ")
            )));
        }
        let required = |key: &str| lookup(key).unwrap_or_default();
        let number = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(v) => v
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid value for {key}: {v}"))),
                None => Ok(default),
            }
        };

        let out_of_range = |key: &str| Error::Config(format!("value for {key} is out of range"));
        let workers =
            usize::try_from(number("workers", 5)?).map_err(|_| out_of_range("workers"))?;
        let max_attempts =
            u32::try_from(number("max_attempts", 3)?).map_err(|_| out_of_range("max_attempts"))?;
        if workers == 0 || max_attempts == 0 {
            return Err(Error::Config(
                "workers and max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            keycloak_url: required("keycloak_url"),
            realm: required("realm"),
            login: required("login"),
            password: SecretString::from(required("password")),
            http_timeout: Duration::from_secs(number("http_timeout", 30)?),
            workers,
            max_attempts,
            renewal_debounce: Duration::from_millis(number("renewal_debounce_ms", 5_000)?),
            renewal_timeout: Duration::from_millis(number("renewal_timeout_ms", 30_000)?),
            otel_endpoint: lookup("otel_endpoint"),
            log_level: lookup("log_level").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            realm: self.realm.clone(),
            login: self.login.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            max_attempts: self.max_attempts,
            renewal_debounce: self.renewal_debounce,
            renewal_timeout: self.renewal_timeout,
        }
    }
}
