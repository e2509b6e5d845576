//! Error types for realm-import.
//!
//! [`Error`] is the crate-level error returned by configuration, startup and
//! submission calls. [`ClassifiedError`] is the only shape a failed identity
//! service call takes once it reaches the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot log in to the identity service: {0}")]
    Login(ClassifiedError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("dispatcher is stopped")]
    Stopped,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot parse config file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("cannot write config file: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How the engine reacts to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401: the shared credential expired, renew and retry.
    AuthExpired,
    /// 409: the object exists, resolved by find-then-update.
    Conflict,
    Other,
}

/// A backend failure normalized to a status code and a message.
///
/// `status_code` is 0 when the failure did not come with an HTTP status
/// (transport errors, validation errors, unexpected payloads).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status_code}: {message}")]
pub struct ClassifiedError {
    pub status_code: u16,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// A failure without an HTTP status.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    pub fn class(&self) -> ErrorClass {
        match self.status_code {
            401 => ErrorClass::AuthExpired,
            409 => ErrorClass::Conflict,
            _ => ErrorClass::Other,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.class() == ErrorClass::AuthExpired
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}
