//! Keycloak admin REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{BackendError, Credentials, IdentityApi};
use crate::error::Result;
use crate::model::{ClientRepresentation, RealmRepresentation, UserRepresentation};

/// Client id used for the password grant against the admin realm.
const ADMIN_CLIENT_ID: &str = "admin-cli";

/// [`IdentityApi`] over the Keycloak admin REST API.
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Error body shapes Keycloak uses across endpoints.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl KeycloakClient {
    /// Build a client for the server at `base_url` (e.g. "https://sso.example.com").
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Http {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            }),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, BackendError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .error_message
            .or(parsed.error_description)
            .or(parsed.error)
            .or_else(|| Some(body.to_string())),
        Err(_) => Some(body.to_string()),
    }
}

#[async_trait]
impl IdentityApi for KeycloakClient {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<SecretString, BackendError> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, credentials.realm
        );
        debug!(realm = %credentials.realm, login = %credentials.login, "requesting token");

        let form = [
            ("grant_type", "password"),
            ("client_id", ADMIN_CLIENT_ID),
            ("username", credentials.login.as_str()),
            ("password", credentials.password.expose_secret()),
        ];
        let token: TokenResponse = self.send_json(self.http.post(url).form(&form)).await?;
        Ok(SecretString::from(token.access_token))
    }

    async fn create_realm(
        &self,
        token: &str,
        realm: &RealmRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self.http.post(self.admin_url("")).bearer_auth(token).json(realm);
        self.send(request).await.map(drop)
    }

    async fn update_realm(
        &self,
        token: &str,
        realm_id: &str,
        realm: &RealmRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self
            .http
            .put(self.admin_url(&format!("/{realm_id}")))
            .bearer_auth(token)
            .json(realm);
        self.send(request).await.map(drop)
    }

    async fn create_client(
        &self,
        token: &str,
        realm_id: &str,
        client: &ClientRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self
            .http
            .post(self.admin_url(&format!("/{realm_id}/clients")))
            .bearer_auth(token)
            .json(client);
        self.send(request).await.map(drop)
    }

    async fn find_clients(
        &self,
        token: &str,
        realm_id: &str,
        client_id: &str,
    ) -> std::result::Result<Vec<ClientRepresentation>, BackendError> {
        let request = self
            .http
            .get(self.admin_url(&format!("/{realm_id}/clients")))
            .bearer_auth(token)
            .query(&[("clientId", client_id)]);
        self.send_json(request).await
    }

    async fn update_client(
        &self,
        token: &str,
        realm_id: &str,
        internal_id: &str,
        client: &ClientRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self
            .http
            .put(self.admin_url(&format!("/{realm_id}/clients/{internal_id}")))
            .bearer_auth(token)
            .json(client);
        self.send(request).await.map(drop)
    }

    async fn create_user(
        &self,
        token: &str,
        realm_id: &str,
        user: &UserRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self
            .http
            .post(self.admin_url(&format!("/{realm_id}/users")))
            .bearer_auth(token)
            .json(user);
        self.send(request).await.map(drop)
    }

    async fn find_users(
        &self,
        token: &str,
        realm_id: &str,
        username: &str,
    ) -> std::result::Result<Vec<UserRepresentation>, BackendError> {
        let request = self
            .http
            .get(self.admin_url(&format!("/{realm_id}/users")))
            .bearer_auth(token)
            .query(&[("username", username), ("exact", "true")]);
        self.send_json(request).await
    }

    async fn update_user(
        &self,
        token: &str,
        realm_id: &str,
        internal_id: &str,
        user: &UserRepresentation,
    ) -> std::result::Result<(), BackendError> {
        let request = self
            .http
            .put(self.admin_url(&format!("/{realm_id}/users/{internal_id}")))
            .bearer_auth(token)
            .json(user);
        self.send(request).await.map(drop)
    }
}
