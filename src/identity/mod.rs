//! Identity service access.
//!
//! [`IdentityApi`] is the seam between the engine and the server: it performs
//! single calls and reports raw failures as [`BackendError`]. The create-or-update
//! policy built on top of it lives in [`upsert`], and [`keycloak`] provides the
//! REST implementation.

pub mod keycloak;
pub mod upsert;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::error::ClassifiedError;
use crate::model::{ClientRepresentation, RealmRepresentation, UserRepresentation};

pub use keycloak::KeycloakClient;

/// Login material for the admin account.
#[derive(Debug)]
pub struct Credentials {
    /// Realm the admin account lives in (usually "master").
    pub realm: String,
    pub login: String,
    pub password: SecretString,
}

/// A raw failure from an identity service call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<BackendError> for ClassifiedError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Http { status, message } => ClassifiedError::new(status, message),
            other => ClassifiedError::unclassified(other.to_string()),
        }
    }
}

/// Calls the importer needs from the identity service.
///
/// Tokens are passed per call so one client can serve several holders.
#[async_trait]
pub trait IdentityApi: Send + Sync + 'static {
    async fn login(&self, credentials: &Credentials) -> Result<SecretString, BackendError>;

    async fn create_realm(
        &self,
        token: &str,
        realm: &RealmRepresentation,
    ) -> Result<(), BackendError>;

    async fn update_realm(
        &self,
        token: &str,
        realm_id: &str,
        realm: &RealmRepresentation,
    ) -> Result<(), BackendError>;

    async fn create_client(
        &self,
        token: &str,
        realm_id: &str,
        client: &ClientRepresentation,
    ) -> Result<(), BackendError>;

    async fn find_clients(
        &self,
        token: &str,
        realm_id: &str,
        client_id: &str,
    ) -> Result<Vec<ClientRepresentation>, BackendError>;

    async fn update_client(
        &self,
        token: &str,
        realm_id: &str,
        internal_id: &str,
        client: &ClientRepresentation,
    ) -> Result<(), BackendError>;

    async fn create_user(
        &self,
        token: &str,
        realm_id: &str,
        user: &UserRepresentation,
    ) -> Result<(), BackendError>;

    async fn find_users(
        &self,
        token: &str,
        realm_id: &str,
        username: &str,
    ) -> Result<Vec<UserRepresentation>, BackendError>;

    async fn update_user(
        &self,
        token: &str,
        realm_id: &str,
        internal_id: &str,
        user: &UserRepresentation,
    ) -> Result<(), BackendError>;
}
