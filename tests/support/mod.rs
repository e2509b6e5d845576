//! Scripted in-memory identity service for engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use realm_import::engine::DispatcherConfig;
use realm_import::identity::{BackendError, Credentials, IdentityApi};
use realm_import::model::{
    ClientRepresentation, Outcome, RealmRepresentation, UserRepresentation,
};
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Login,
    CreateRealm,
    UpdateRealm,
    CreateClient,
    FindClients,
    UpdateClient,
    CreateUser,
    FindUsers,
    UpdateUser,
}

#[derive(Default)]
struct State {
    realms: HashSet<String>,
    clients: HashMap<(String, String), String>,
    users: HashMap<(String, String), String>,
    failures: HashMap<Op, VecDeque<u16>>,
    calls: HashMap<Op, usize>,
    logins: u64,
    /// Tokens issued by an earlier login are rejected with 401.
    min_valid: u64,
    reject_logins: bool,
}

/// Tokens are "token-<n>" where n counts successful logins.
#[derive(Default)]
pub struct MockIdentity {
    state: Mutex<State>,
    latency: Duration,
}

impl MockIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call except login sleeps for `latency` after being recorded.
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Default::default()
        })
    }

    /// The next `times` calls to `op` fail with `status`.
    pub fn fail_next(&self, op: Op, status: u16, times: usize) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        queue.extend(std::iter::repeat_n(status, times));
    }

    /// Invalidate every token issued so far.
    pub fn expire_tokens(&self) {
        let mut state = self.state.lock().unwrap();
        state.min_valid = state.logins + 1;
    }

    pub fn reject_logins(&self, reject: bool) {
        self.state.lock().unwrap().reject_logins = reject;
    }

    pub fn seed_realm(&self, realm: &str) {
        self.state.lock().unwrap().realms.insert(realm.to_string());
    }

    pub fn seed_client(&self, realm: &str, client_id: &str) {
        self.state.lock().unwrap().clients.insert(
            (realm.to_string(), client_id.to_string()),
            format!("internal-{client_id}"),
        );
    }

    pub fn seed_user(&self, realm: &str, username: &str) {
        self.state.lock().unwrap().users.insert(
            (realm.to_string(), username.to_string()),
            format!("internal-{username}"),
        );
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn logins(&self) -> usize {
        self.calls(Op::Login)
    }

    /// Record the call, then apply scripted failures and token checks.
    fn enter(&self, op: Op, token: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;

        let issued: u64 = token
            .strip_prefix("token-")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if issued == 0 || issued < state.min_valid {
            return Err(http(401, "HTTP 401 Unauthorized"));
        }
        if let Some(status) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(http(status, "injected failure"));
        }
        Ok(())
    }

    async fn latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn http(status: u16, message: &str) -> BackendError {
    BackendError::Http {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl IdentityApi for MockIdentity {
    async fn login(&self, _credentials: &Credentials) -> Result<SecretString, BackendError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(Op::Login).or_default() += 1;
        if state.reject_logins {
            return Err(http(401, "Invalid user credentials"));
        }
        state.logins += 1;
        Ok(SecretString::from(format!("token-{}", state.logins)))
    }

    async fn create_realm(
        &self,
        token: &str,
        realm: &RealmRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::CreateRealm, token)?;
        self.latency().await;
        let id = realm.id.clone().unwrap_or_default();
        if !self.state.lock().unwrap().realms.insert(id.clone()) {
            return Err(http(409, &format!("Conflict detected. See logs for details: {id}")));
        }
        Ok(())
    }

    async fn update_realm(
        &self,
        token: &str,
        realm_id: &str,
        _realm: &RealmRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::UpdateRealm, token)?;
        self.latency().await;
        if self.state.lock().unwrap().realms.contains(realm_id) {
            Ok(())
        } else {
            Err(http(404, "Realm not found."))
        }
    }

    async fn create_client(
        &self,
        token: &str,
        realm_id: &str,
        client: &ClientRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::CreateClient, token)?;
        self.latency().await;
        let client_id = client.client_id.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        let key = (realm_id.to_string(), client_id.clone());
        if state.clients.contains_key(&key) {
            return Err(http(409, &format!("Client {client_id} already exists")));
        }
        state.clients.insert(key, format!("internal-{client_id}"));
        Ok(())
    }

    async fn find_clients(
        &self,
        token: &str,
        realm_id: &str,
        client_id: &str,
    ) -> Result<Vec<ClientRepresentation>, BackendError> {
        self.enter(Op::FindClients, token)?;
        self.latency().await;
        let state = self.state.lock().unwrap();
        let key = (realm_id.to_string(), client_id.to_string());
        Ok(state
            .clients
            .get(&key)
            .map(|internal| ClientRepresentation {
                id: Some(internal.clone()),
                client_id: Some(client_id.to_string()),
                ..Default::default()
            })
            .into_iter()
            .collect())
    }

    async fn update_client(
        &self,
        token: &str,
        _realm_id: &str,
        _internal_id: &str,
        _client: &ClientRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::UpdateClient, token)?;
        self.latency().await;
        Ok(())
    }

    async fn create_user(
        &self,
        token: &str,
        realm_id: &str,
        user: &UserRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::CreateUser, token)?;
        self.latency().await;
        let username = user.username.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        let key = (realm_id.to_string(), username.clone());
        if state.users.contains_key(&key) {
            return Err(http(409, "User exists with same username"));
        }
        state.users.insert(key, format!("internal-{username}"));
        Ok(())
    }

    async fn find_users(
        &self,
        token: &str,
        realm_id: &str,
        username: &str,
    ) -> Result<Vec<UserRepresentation>, BackendError> {
        self.enter(Op::FindUsers, token)?;
        self.latency().await;
        let state = self.state.lock().unwrap();
        let key = (realm_id.to_string(), username.to_string());
        Ok(state
            .users
            .get(&key)
            .map(|internal| UserRepresentation {
                id: Some(internal.clone()),
                username: Some(username.to_string()),
                ..Default::default()
            })
            .into_iter()
            .collect())
    }

    async fn update_user(
        &self,
        token: &str,
        _realm_id: &str,
        _internal_id: &str,
        _user: &UserRepresentation,
    ) -> Result<(), BackendError> {
        self.enter(Op::UpdateUser, token)?;
        self.latency().await;
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        realm: "master".to_string(),
        login: "admin".to_string(),
        password: SecretString::from("admin".to_string()),
    }
}

/// Small pool with a short debounce so tests can step past it.
pub fn pool(workers: usize) -> DispatcherConfig {
    DispatcherConfig {
        workers,
        max_attempts: 3,
        renewal_debounce: Duration::from_millis(200),
        renewal_timeout: Duration::from_secs(5),
    }
}

/// Drain a result stream in the background until it closes.
pub fn collect(mut results: mpsc::Receiver<Outcome>) -> JoinHandle<Vec<Outcome>> {
    tokio::spawn(async move {
        let mut outcomes = Vec::new();
        while let Some(outcome) = results.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    })
}

pub fn user(name: &str) -> UserRepresentation {
    UserRepresentation {
        username: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn client(client_id: &str) -> ClientRepresentation {
    ClientRepresentation {
        client_id: Some(client_id.to_string()),
        ..Default::default()
    }
}
